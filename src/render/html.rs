use crate::classify::is_http;
use crate::common::{RenderedResponse, RequestContext};
use crate::config::HandlerSettings;
use crate::failure::Failure;
use crate::render::json::SERVER_ERROR_MESSAGE;
use crate::render::page::{DiagnosticRenderer, basic_page};
use crate::render::views::{ErrorPageSearchPath, ViewEngine};
use axum::http::StatusCode;
use serde_json::{Value, json};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Renders failures as HTML pages.
///
/// Themed pages are looked up by status code. In debug mode an unclassified
/// failure skips the themes and goes straight to the diagnostic page.
pub struct HtmlRenderer<'a> {
    settings: &'a HandlerSettings,
    views: &'a dyn ViewEngine,
    diagnostics: Option<&'a dyn DiagnosticRenderer>,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new(
        settings: &'a HandlerSettings,
        views: &'a dyn ViewEngine,
        diagnostics: Option<&'a dyn DiagnosticRenderer>,
    ) -> Self {
        Self {
            settings,
            views,
            diagnostics,
        }
    }

    pub fn render(&self, request: &RequestContext, failure: &Failure) -> RenderedResponse {
        let http = is_http(failure);
        if self.settings.debug && !http {
            return self.render_generic(request, failure, StatusCode::INTERNAL_SERVER_ERROR);
        }

        let status = if http {
            failure.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let response = match self.themed_page(failure, status, http) {
            Some(markup) => RenderedResponse::html(status, markup),
            None => self.render_generic(request, failure, status),
        };
        response.with_headers(failure.headers())
    }

    /// The diagnostic page in debug mode, otherwise the minimal page.
    ///
    /// Never fails: a diagnostic renderer that errors or panics is replaced by
    /// the minimal page.
    pub fn render_generic(
        &self,
        request: &RequestContext,
        failure: &Failure,
        status: StatusCode,
    ) -> RenderedResponse {
        let markup = if self.settings.debug {
            self.diagnostic_page(request, failure)
                .unwrap_or_else(|| basic_page(failure, status, true))
        } else {
            basic_page(failure, status, false)
        };
        RenderedResponse::html(status, markup)
    }

    fn themed_page(&self, failure: &Failure, status: StatusCode, http: bool) -> Option<String> {
        let search_path = ErrorPageSearchPath::build(&self.views.paths());
        let name = status.as_u16().to_string();
        if !self.views.exists(&search_path, &name) {
            return None;
        }

        match self
            .views
            .render(&search_path, &name, &page_context(failure, status, http))
        {
            Ok(markup) => Some(markup),
            Err(e) => {
                tracing::warn!("Error page {} failed to render: {}", name, e);
                None
            }
        }
    }

    fn diagnostic_page(&self, request: &RequestContext, failure: &Failure) -> Option<String> {
        let renderer = self.diagnostics?;
        match catch_unwind(AssertUnwindSafe(|| {
            renderer.render(failure, request, self.settings)
        })) {
            Ok(Ok(markup)) => Some(markup),
            Ok(Err(e)) => {
                tracing::warn!("Diagnostic page failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("Diagnostic page panicked");
                None
            }
        }
    }
}

/// Values bound into a themed page. Unclassified failures only reach this
/// outside debug mode, so their message is replaced.
fn page_context(failure: &Failure, status: StatusCode, http: bool) -> Value {
    let message = if http {
        failure.message()
    } else {
        SERVER_ERROR_MESSAGE
    };
    json!({
        "exception": {
            "message": message,
            "kind": failure.kind().name(),
            "status": status.as_u16(),
        },
        "status": status.as_u16(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Body;
    use crate::error::{FaultlineError, Result};
    use crate::render::page::PrettyPageRenderer;
    use crate::render::views::FileViewEngine;
    use crate::testing::{MemoryViews, raised_elsewhere};

    struct BrokenDiagnostics;

    impl DiagnosticRenderer for BrokenDiagnostics {
        fn render(&self, _: &Failure, _: &RequestContext, _: &HandlerSettings) -> Result<String> {
            Err(FaultlineError::Diagnostics("template exploded".into()))
        }
    }

    struct PanickingDiagnostics;

    impl DiagnosticRenderer for PanickingDiagnostics {
        fn render(&self, _: &Failure, _: &RequestContext, _: &HandlerSettings) -> Result<String> {
            panic!("diagnostics blew up")
        }
    }

    fn markup(response: &RenderedResponse) -> &str {
        match &response.body {
            Body::Html(markup) => markup,
            other => panic!("expected html, got {:?}", other),
        }
    }

    #[test]
    fn test_themed_page_by_status() {
        let settings = HandlerSettings::default();
        let views = MemoryViews::new().with_page("404", "missing: {{ exception.message }}");
        let renderer = HtmlRenderer::new(&settings, &views, None);

        let response = renderer.render(&RequestContext::new(), &Failure::not_found("No such post"));

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(markup(&response), "missing: No such post");
    }

    #[test]
    fn test_unclassified_message_is_hidden_from_themes() {
        let settings = HandlerSettings::default();
        let views = MemoryViews::new().with_page("500", "{{ exception.message }}");
        let renderer = HtmlRenderer::new(&settings, &views, None);

        let response = renderer.render(&RequestContext::new(), &Failure::generic("secret dsn"));

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(markup(&response), "Server Error");
    }

    #[test]
    fn test_missing_page_falls_back_to_minimal_document() {
        let settings = HandlerSettings::default();
        let views = MemoryViews::new();
        let renderer = HtmlRenderer::new(&settings, &views, None);
        let failure = Failure::http(StatusCode::from_u16(419).unwrap(), "CSRF token mismatch.");

        let response = renderer.render(&RequestContext::new(), &failure);

        assert_eq!(response.status.as_u16(), 419);
        assert!(markup(&response).contains("<title>419"));
        assert!(!markup(&response).contains("CSRF"));
    }

    #[test]
    fn test_headers_follow_http_failure() {
        let settings = HandlerSettings::default();
        let views = FileViewEngine::builtin();
        let renderer = HtmlRenderer::new(&settings, &views, None);
        let failure = Failure::http(StatusCode::SERVICE_UNAVAILABLE, "Down for maintenance")
            .with_header("Retry-After", "120");

        let response = renderer.render(&RequestContext::new(), &failure);

        assert_eq!(response.header("retry-after"), Some("120"));
        assert!(markup(&response).contains("Down for maintenance"));
    }

    #[test]
    fn test_debug_skips_themes_for_unclassified() {
        let settings = HandlerSettings {
            debug: true,
            ..HandlerSettings::default()
        };
        let views = MemoryViews::new().with_page("500", "themed");
        let renderer = HtmlRenderer::new(&settings, &views, Some(&PrettyPageRenderer));

        let response = renderer.render(&RequestContext::new(), &raised_elsewhere("kaboom"));

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(markup(&response).contains("kaboom"));
        assert!(!markup(&response).contains("themed"));
    }

    #[test]
    fn test_broken_diagnostics_degrade_to_minimal_page() {
        let settings = HandlerSettings {
            debug: true,
            ..HandlerSettings::default()
        };
        let views = MemoryViews::new();
        let failure = Failure::generic("kaboom");

        for diagnostics in [
            &BrokenDiagnostics as &dyn DiagnosticRenderer,
            &PanickingDiagnostics,
        ] {
            let renderer = HtmlRenderer::new(&settings, &views, Some(diagnostics));
            let response = renderer.render(&RequestContext::new(), &failure);

            assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(markup(&response).contains("<h1>kaboom</h1>"));
        }
    }
}
