use axum::{
    extract::Query,
    http::{HeaderMap, header, request::Parts},
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The parts of an incoming request the exception pipeline looks at.
///
/// Read-only to the pipeline. Build one by hand in tests or with
/// [`RequestContext::from_parts`] inside axum.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    expects_json: bool,
    url: Option<String>,
    previous: Option<String>,
    redirect_target: Option<String>,
    input: Map<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expecting_json(mut self, expects_json: bool) -> Self {
        self.expects_json = expects_json;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    pub fn with_redirect_target(mut self, target: impl Into<String>) -> Self {
        self.redirect_target = Some(target.into());
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    /// Whether the caller wants a structured (API) response rather than a page.
    pub fn expects_json(&self) -> bool {
        self.expects_json
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect_target.as_deref()
    }

    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }

    /// Reads the request head.
    ///
    /// JSON is expected when the first `Accept` entry names a JSON type, or
    /// when the request is a non-PJAX XHR that accepts any content type.
    /// Input is taken from the query string.
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        let accept = first_media_range(headers);

        let wants_json = accept
            .as_deref()
            .is_some_and(|range| range.contains("/json") || range.contains("+json"));
        let accepts_any = accept
            .as_deref()
            .is_none_or(|range| range == "*/*" || range == "*");
        let ajax = header_str(headers, "x-requested-with")
            .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"));
        let pjax = headers.contains_key("x-pjax");

        let input = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(query)| {
                query
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            expects_json: (ajax && !pjax && accepts_any) || wants_json,
            url: Some(parts.uri.to_string()),
            previous: header_str(headers, header::REFERER.as_str()).map(str::to_string),
            redirect_target: None,
            input,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn first_media_range(headers: &HeaderMap) -> Option<String> {
    let accept = header_str(headers, header::ACCEPT.as_str())?;
    let range = accept.split(',').next()?.split(';').next()?.trim();
    (!range.is_empty()).then(|| range.to_ascii_lowercase())
}
