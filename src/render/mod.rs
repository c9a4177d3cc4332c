//! Turning failures into responses.

use crate::classify::{Shape, is_http};
use crate::common::{Flash, RenderedResponse, RequestContext};
use crate::di::Services;
use crate::failure::kind;
use crate::failure::{Failure, Payload};
use crate::handler::HandlerConfig;
use axum::http::StatusCode;
use serde_json::json;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

pub mod builtin;
pub mod console;
pub mod html;
pub mod json;
pub mod page;
pub mod views;

pub use console::ConsoleRenderer;
pub use html::HtmlRenderer;
pub use json::JsonRenderer;
pub use page::{DiagnosticRenderer, PrettyPageRenderer};
pub use views::{ErrorPageSearchPath, FileViewEngine, ViewEngine, ViewRoot};

/// Status used for a session token mismatch ("Page Expired").
const PAGE_EXPIRED: u16 = 419;

/// Chooses and builds the response for a failure.
///
/// Holds only borrowed configuration, so one can be built per call.
pub struct RenderingPipeline<'a> {
    config: &'a HandlerConfig,
    services: &'a Services,
}

impl<'a> RenderingPipeline<'a> {
    pub fn new(config: &'a HandlerConfig, services: &'a Services) -> Self {
        Self { config, services }
    }

    /// Render a failure for a request.
    ///
    /// Always produces a response: a panic anywhere below turns into a bare
    /// 500, as JSON when the request expects it and the minimal page otherwise.
    pub fn render(&self, request: &RequestContext, failure: Failure) -> RenderedResponse {
        let original = failure.clone();
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(request, failure))) {
            Ok(response) => response.normalized(),
            Err(_) => {
                tracing::warn!(
                    "Rendering {} panicked, sending the minimal error page",
                    original.kind()
                );
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                if request.expects_json() {
                    return RenderedResponse::json(
                        status,
                        json!({ "message": json::SERVER_ERROR_MESSAGE }),
                    );
                }
                RenderedResponse::html(
                    status,
                    page::basic_page(&original, status, self.config.settings().debug),
                )
            }
        }
    }

    fn dispatch(&self, request: &RequestContext, failure: Failure) -> RenderedResponse {
        if let Some(renderer) = failure.renderer() {
            if let Some(response) = renderer.render(&failure, request) {
                return response;
            }
        }
        if let Some(responder) = failure.responder() {
            return responder.to_response(&failure, request);
        }

        let failure = special_remap(self.config.remapper().apply(failure));

        for callback in self.config.render_callbacks() {
            if callback.handles(&failure) {
                if let Some(response) = callback.call(&failure, request) {
                    tracing::debug!("{} rendered by callback", failure.kind());
                    return response;
                }
            }
        }

        if let Payload::Response(response) = failure.payload() {
            return response.as_ref().clone();
        }

        match Shape::of_kind(failure.kind()) {
            Shape::Unauthenticated => self.unauthenticated(request, &failure),
            Shape::Validation => self.validation(request, &failure),
            _ => self.negotiate(request, &failure),
        }
    }

    fn unauthenticated(&self, request: &RequestContext, failure: &Failure) -> RenderedResponse {
        if request.expects_json() {
            return RenderedResponse::json(
                StatusCode::UNAUTHORIZED,
                json!({ "message": failure.message() }),
            );
        }

        let target = failure
            .redirect_to()
            .unwrap_or(self.config.settings().login_url.as_str());
        RenderedResponse::redirect(target).with_flash(Flash {
            intended: request.url().map(str::to_string),
            ..Flash::default()
        })
    }

    fn validation(&self, request: &RequestContext, failure: &Failure) -> RenderedResponse {
        let Some(details) = failure.validation_details() else {
            return self.negotiate(request, failure);
        };

        if let Some(response) = &details.response {
            return response.as_ref().clone();
        }

        if request.expects_json() {
            return RenderedResponse::json(
                details.status,
                json!({
                    "message": failure.message(),
                    "errors": details.errors,
                }),
            );
        }

        let settings = self.config.settings();
        let target = details
            .redirect_to
            .as_deref()
            .or(request.redirect_target())
            .or(request.previous())
            .unwrap_or("/");
        let input = request
            .input()
            .iter()
            .filter(|(key, _)| !settings.is_dont_flash(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        RenderedResponse::redirect(target).with_flash(Flash {
            input,
            errors: details.errors.clone(),
            error_bag: Some(details.error_bag.clone()),
            intended: None,
        })
    }

    fn negotiate(&self, request: &RequestContext, failure: &Failure) -> RenderedResponse {
        let settings = self.config.settings();
        if request.expects_json() {
            return JsonRenderer::new(settings.debug).render(failure);
        }

        let views: Arc<dyn ViewEngine> = self
            .services
            .resolve::<dyn ViewEngine>()
            .unwrap_or_else(|_| Arc::new(FileViewEngine::builtin()));
        HtmlRenderer::new(settings, views.as_ref(), self.config.diagnostics()).render(request, failure)
    }
}

/// Narrows the framework's own kinds to HTTP failures with a fixed status.
///
/// Failures that already carry a status are left alone.
pub fn special_remap(failure: Failure) -> Failure {
    if is_http(&failure) {
        return failure;
    }

    let (target, status) = match Shape::of_kind(failure.kind()) {
        Shape::NotFound => (&kind::NOT_FOUND_HTTP, StatusCode::NOT_FOUND),
        Shape::Unauthorized => (&kind::ACCESS_DENIED_HTTP, StatusCode::FORBIDDEN),
        Shape::SessionMismatch => (
            &kind::HTTP,
            StatusCode::from_u16(PAGE_EXPIRED).unwrap_or(StatusCode::FORBIDDEN),
        ),
        _ => return failure,
    };

    let message = failure.message().to_string();
    failure.succeeded_by(target, message).with_status(status)
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
