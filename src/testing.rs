//! Fakes shared by the unit tests.

use crate::error::{FaultlineError, Result};
use crate::failure::Failure;
use crate::render::views::{ErrorPageSearchPath, ViewEngine, interpolate};
use crate::report::{Identity, IdentityProvider, LogContext, ReportSink};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;

/// One call to [`RecordingSink::record`].
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub kind: &'static str,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<Record>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl ReportSink for RecordingSink {
    fn record(&self, level: Level, message: &str, context: &LogContext) {
        self.records.lock().unwrap().push(Record {
            level,
            message: message.to_string(),
            kind: context.exception().kind().name(),
            fields: context.fields().clone(),
        });
    }
}

pub enum FixedIdentity {
    Guest,
    User(Identity),
    Broken,
    Panicking,
}

impl FixedIdentity {
    pub fn user(id: &str, email: &str) -> Self {
        FixedIdentity::User(Identity {
            id: id.to_string(),
            email: Some(email.to_string()),
        })
    }
}

impl IdentityProvider for FixedIdentity {
    fn current(&self) -> Result<Option<Identity>> {
        match self {
            FixedIdentity::Guest => Ok(None),
            FixedIdentity::User(identity) => Ok(Some(identity.clone())),
            FixedIdentity::Broken => Err(FaultlineError::Identity("session store down".into())),
            FixedIdentity::Panicking => panic!("session not started"),
        }
    }
}

/// Error pages held in memory, keyed by page name. Knows no built-in pages.
#[derive(Debug, Default)]
pub struct MemoryViews {
    pages: HashMap<String, String>,
}

impl MemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, name: &str, template: &str) -> Self {
        self.pages.insert(name.to_string(), template.to_string());
        self
    }
}

impl ViewEngine for MemoryViews {
    fn paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    fn exists(&self, _: &ErrorPageSearchPath, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    fn render(&self, _: &ErrorPageSearchPath, name: &str, context: &Value) -> Result<String> {
        let template = self
            .pages
            .get(name)
            .ok_or_else(|| FaultlineError::view(name, "not registered"))?;
        interpolate(template, context).map_err(|message| FaultlineError::view(name, message))
    }
}

/// A generic failure whose origin lies in this file.
///
/// Debug pages quote the source around a failure's origin, so tests that
/// assert on what a page leaves out raise their failure here.
pub fn raised_elsewhere(message: &str) -> Failure {
    Failure::generic(message)
}
