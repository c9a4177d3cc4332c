//! Call-stack frames extracted from a captured backtrace.
//!
//! Frames only ever hold a symbol name and a source position. Argument values
//! are not part of a Rust backtrace and there is no field to put them in, so
//! nothing captured here can leak request data into a rendered page.

use serde::Serialize;
use std::backtrace::{Backtrace, BacktraceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub index: usize,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Frame {
    /// False for frames inside the standard library or a registry dependency.
    pub fn is_application(&self) -> bool {
        match &self.file {
            Some(file) => {
                !(file.starts_with("/rustc/")
                    || file.contains("/rustlib/")
                    || file.contains("/.cargo/registry/")
                    || file.contains("/.cargo/git/"))
            }
            None => false,
        }
    }
}

/// Frames of a captured backtrace, outermost call last.
///
/// Returns an empty list when capture was disabled or unsupported.
pub fn frames(backtrace: &Backtrace) -> Vec<Frame> {
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    parse(&backtrace.to_string())
}

fn parse(rendered: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();

    for line in rendered.lines().map(str::trim) {
        if let Some(position) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line) = split_position(position);
                frame.file = Some(file);
                frame.line = line;
            }
            continue;
        }

        if let Some((index, function)) = line.split_once(": ") {
            if let Ok(index) = index.parse::<usize>() {
                frames.push(Frame {
                    index,
                    function: function.to_string(),
                    file: None,
                    line: None,
                });
            }
        }
    }

    frames
}

/// Splits `path/to/file.rs:12:5` into the path and line number.
fn split_position(position: &str) -> (String, Option<u32>) {
    let mut parts = position.rsplitn(3, ':');
    let column = parts.next();
    let line = parts.next();
    match (parts.next(), line, column) {
        (Some(file), Some(line), Some(_)) => (file.to_string(), line.parse().ok()),
        _ => (position.to_string(), None),
    }
}
