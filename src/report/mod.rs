//! Reporting: turning failures into log records.

use crate::error::Result;
use crate::failure::Failure;
use serde_json::{Map, Value, json};
use tracing::Level;

mod pipeline;

pub use pipeline::ReportingPipeline;

/// Where reported failures end up.
pub trait ReportSink: Send + Sync + 'static {
    fn record(&self, level: Level, message: &str, context: &LogContext);
}

/// The user a failure happened for, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

/// Looks up the current user for log context.
pub trait IdentityProvider: Send + Sync + 'static {
    /// `Ok(None)` for a guest. Errors (no session, store down) are tolerated
    /// by the caller and only mean the context stays empty.
    fn current(&self) -> Result<Option<Identity>>;
}

/// Context handed to the sink with every record.
///
/// Holds caller-defined fields plus the failure itself under the reserved
/// `exception` key.
#[derive(Debug, Clone)]
pub struct LogContext {
    fields: Map<String, Value>,
    exception: Failure,
}

impl LogContext {
    pub const EXCEPTION_KEY: &'static str = "exception";
    pub const USER_ID_KEY: &'static str = "userId";
    pub const EMAIL_KEY: &'static str = "email";

    /// Later layers override earlier ones. An `exception` entry in any layer
    /// is dropped in favour of the failure.
    pub fn merged(layers: impl IntoIterator<Item = Map<String, Value>>, exception: Failure) -> Self {
        let mut fields = Map::new();
        for layer in layers {
            fields.extend(layer);
        }
        fields.remove(Self::EXCEPTION_KEY);
        Self { fields, exception }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn exception(&self) -> &Failure {
        &self.exception
    }

    /// Fields plus a summary of the failure, for sinks that write JSON.
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(
            Self::EXCEPTION_KEY.to_string(),
            json!({
                "kind": self.exception.kind().name(),
                "message": self.exception.message(),
                "location": self.exception.location().to_string(),
            }),
        );
        Value::Object(object)
    }
}

/// Sink that emits each record as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn record(&self, level: Level, message: &str, context: &LogContext) {
        let failure = context.exception();
        let kind = failure.kind().name();
        let location = failure.location();
        let fields = Value::Object(context.fields().clone());

        match level {
            Level::ERROR => tracing::error!(exception = kind, %location, context = %fields, "{}", message),
            Level::WARN => tracing::warn!(exception = kind, %location, context = %fields, "{}", message),
            Level::INFO => tracing::info!(exception = kind, %location, context = %fields, "{}", message),
            Level::DEBUG => tracing::debug!(exception = kind, %location, context = %fields, "{}", message),
            _ => tracing::trace!(exception = kind, %location, context = %fields, "{}", message),
        }
    }
}
