use crate::classify::is_http;
use crate::common::RenderedResponse;
use crate::failure::Failure;
use axum::http::StatusCode;
use serde_json::{Value, json};

/// Message shown for failures that must not reveal their own.
pub const SERVER_ERROR_MESSAGE: &str = "Server Error";

/// Builds structured error bodies for API requests.
#[derive(Debug, Clone, Copy)]
pub struct JsonRenderer {
    debug: bool,
}

impl JsonRenderer {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn render(&self, failure: &Failure) -> RenderedResponse {
        let http = is_http(failure);
        let status = if http {
            failure.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let response = RenderedResponse::json(status, self.body(failure, http));
        if http {
            response.with_headers(failure.headers())
        } else {
            response
        }
    }

    fn body(&self, failure: &Failure, http: bool) -> Value {
        if !self.debug {
            let message = if http {
                failure.message()
            } else {
                SERVER_ERROR_MESSAGE
            };
            return json!({ "message": message });
        }

        let location = failure.location();
        // Frames are rebuilt field by field so nothing but position data is
        // ever serialized.
        let trace: Vec<Value> = failure
            .frames()
            .into_iter()
            .map(|frame| {
                json!({
                    "function": frame.function,
                    "file": frame.file,
                    "line": frame.line,
                })
            })
            .collect();

        json!({
            "message": failure.message(),
            "exception": failure.kind().name(),
            "file": location.file(),
            "line": location.line(),
            "trace": trace,
        })
    }
}
