use axum::{
    body::Body as AxumBody,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Response produced by the rendering pipeline.
///
/// This is the only thing the renderers hand back; turning it into bytes on
/// the wire is left to the transport (see the [`IntoResponse`] impl).
///
/// # Example
/// ```
/// use faultline::common::RenderedResponse;
/// use axum::http::StatusCode;
/// use serde_json::json;
///
/// let response = RenderedResponse::json(StatusCode::NOT_FOUND, json!({ "message": "Gone" }))
///     .with_header("X-Trace", "abc");
///
/// assert_eq!(response.header("x-trace"), Some("abc"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub status: StatusCode,
    headers: BTreeMap<String, String>,
    pub body: Body,
    pub flash: Option<Flash>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// Structured data, serialized by the transport.
    Json(Value),
    Html(String),
    Text(String),
}

/// Data handed to the next request through the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Flash {
    /// Submitted input, minus the fields that must never be flashed.
    pub input: Map<String, Value>,
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_bag: Option<String>,
    /// Where to send the user once they have logged in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intended: Option<String>,
}

impl RenderedResponse {
    pub fn new(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
            flash: None,
        }
    }

    pub fn json(status: StatusCode, value: Value) -> Self {
        Self::new(status, Body::Json(value)).with_header("content-type", "application/json")
    }

    pub fn html(status: StatusCode, markup: impl Into<String>) -> Self {
        Self::new(status, Body::Html(markup.into()))
            .with_header("content-type", "text/html; charset=UTF-8")
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status, Body::Text(text.into()))
            .with_header("content-type", "text/plain; charset=UTF-8")
    }

    /// A `302 Found` pointing at `target`.
    pub fn redirect(target: impl Into<String>) -> Self {
        Self::new(StatusCode::FOUND, Body::Empty).with_header("location", target)
    }

    /// Header names are case-insensitive and stored lower-cased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self = self.with_header(name, value);
        }
        self
    }

    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection() && self.headers.contains_key("location")
    }

    pub fn redirect_target(&self) -> Option<&str> {
        self.header("location")
    }

    /// The JSON body, if this response carries one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Fills in a content type matching the body when none was set.
    pub fn normalized(self) -> Self {
        if self.headers.contains_key("content-type") {
            return self;
        }
        let content_type = match &self.body {
            Body::Empty => return self,
            Body::Json(_) => "application/json",
            Body::Html(_) => "text/html; charset=UTF-8",
            Body::Text(_) => "text/plain; charset=UTF-8",
        };
        self.with_header("content-type", content_type)
    }

    fn into_bytes(body: Body) -> Result<Vec<u8>, serde_json::Error> {
        Ok(match body {
            Body::Empty => Vec::new(),
            Body::Json(value) => serde_json::to_vec_pretty(&value)?,
            Body::Html(markup) => markup.into_bytes(),
            Body::Text(text) => text.into_bytes(),
        })
    }
}

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        let bytes = match Self::into_bytes(self.body) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to serialize error response body: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Server Error").into_response();
            }
        };

        let mut response = Response::new(AxumBody::from(bytes));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("Dropping invalid response header: {}", name),
            }
        }

        if let Some(flash) = self.flash {
            response.extensions_mut().insert(flash);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_are_case_insensitive_and_unique() {
        let response = RenderedResponse::text(StatusCode::OK, "hi")
            .with_header("X-Custom", "one")
            .with_header("x-custom", "two");

        assert_eq!(response.header("X-CUSTOM"), Some("two"));
        assert_eq!(
            response.headers().keys().filter(|k| *k == "x-custom").count(),
            1
        );
    }

    #[test]
    fn test_redirect() {
        let response = RenderedResponse::redirect("/login");
        assert!(response.is_redirect());
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.redirect_target(), Some("/login"));
    }

    #[test]
    fn test_normalized_sets_content_type() {
        let response =
            RenderedResponse::new(StatusCode::OK, Body::Json(json!({ "message": "ok" }))).normalized();
        assert_eq!(response.header("content-type"), Some("application/json"));

        let empty = RenderedResponse::new(StatusCode::NO_CONTENT, Body::Empty).normalized();
        assert_eq!(empty.header("content-type"), None);
    }

    #[test]
    fn test_into_response_carries_status_headers_and_flash() {
        let flash = Flash {
            intended: Some("/account".into()),
            ..Flash::default()
        };
        let response = RenderedResponse::redirect("/login")
            .with_flash(flash.clone())
            .into_response();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/login");
        assert_eq!(response.extensions().get::<Flash>(), Some(&flash));
    }
}
