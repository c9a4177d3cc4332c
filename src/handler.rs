//! The exception handler: registration at startup, then report and render.

use crate::classify::SuppressionSet;
use crate::common::{RenderedResponse, RequestContext};
use crate::config::{ConfigService, HandlerSettings};
use crate::di::{Services, ServicesBuilder};
use crate::error::Result;
use crate::failure::{Failure, FailureKind, Propagation};
use crate::interceptor::{RenderCallback, ReportCallback};
use crate::remap::{ExceptionRemapper, FailureMapper};
use crate::render::{ConsoleRenderer, DiagnosticRenderer, PrettyPageRenderer, RenderingPipeline};
use crate::report::{ReportingPipeline, TracingSink};
use std::io::{self, Write};
use std::sync::Arc;

/// The tables both pipelines read. Frozen once the handler is built.
pub struct HandlerConfig {
    remapper: ExceptionRemapper,
    suppression: SuppressionSet,
    report_callbacks: Vec<ReportCallback>,
    render_callbacks: Vec<RenderCallback>,
    settings: HandlerSettings,
    diagnostics: Option<Arc<dyn DiagnosticRenderer>>,
}

impl HandlerConfig {
    pub fn remapper(&self) -> &ExceptionRemapper {
        &self.remapper
    }

    pub fn suppression(&self) -> &SuppressionSet {
        &self.suppression
    }

    pub fn report_callbacks(&self) -> &[ReportCallback] {
        &self.report_callbacks
    }

    pub fn render_callbacks(&self) -> &[RenderCallback] {
        &self.render_callbacks
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    pub fn diagnostics(&self) -> Option<&dyn DiagnosticRenderer> {
        self.diagnostics.as_deref()
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            remapper: ExceptionRemapper::new(),
            suppression: SuppressionSet::new(),
            report_callbacks: Vec::new(),
            render_callbacks: Vec::new(),
            settings: HandlerSettings::default(),
            diagnostics: Some(Arc::new(PrettyPageRenderer)),
        }
    }
}

impl std::fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("remapper", &self.remapper)
            .field("suppression", &self.suppression)
            .field("report_callbacks", &self.report_callbacks)
            .field("render_callbacks", &self.render_callbacks)
            .field("settings", &self.settings)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

/// Collects rules and callbacks during startup.
///
/// # Example
/// ```
/// use faultline::{Failure, HandlerBuilder, RequestContext};
/// use faultline::failure::kind::FailureKind;
/// use axum::http::StatusCode;
///
/// static PAYMENT: FailureKind = FailureKind::new("PaymentFailure");
///
/// let mut builder = HandlerBuilder::new();
/// builder
///     .map(&PAYMENT, |failure: Failure| {
///         Failure::http(StatusCode::PAYMENT_REQUIRED, "Payment required").with_cause(failure)
///     })
///     .dont_flash("card_number");
/// builder.reportable(&PAYMENT, |_: &Failure| false);
///
/// let handler = builder.build();
/// let response = handler.render(
///     &RequestContext::new().expecting_json(true),
///     Failure::new(&PAYMENT, "card declined"),
/// );
/// assert_eq!(response.status, StatusCode::PAYMENT_REQUIRED);
/// ```
#[derive(Default)]
pub struct HandlerBuilder {
    config: HandlerConfig,
    services: Option<Services>,
}

impl HandlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder whose settings are read from configuration.
    pub fn from_config(config: &ConfigService) -> Self {
        let mut builder = Self::new();
        builder.settings(HandlerSettings::from_config(config));
        builder
    }

    /// Remap failures of `kind` (or a descendant) with `transform`.
    pub fn map<F>(&mut self, kind: &'static FailureKind, transform: F) -> &mut Self
    where
        F: Fn(Failure) -> Failure + Send + Sync + 'static,
    {
        self.config.remapper.register(kind, transform);
        self
    }

    /// Remap failures of `from` into an empty-message failure of `to`.
    pub fn map_into(&mut self, from: &'static FailureKind, to: &'static FailureKind) -> &mut Self {
        self.config.remapper.register_into(from, to);
        self
    }

    /// Remap with a mapper that names its own source kind.
    pub fn map_with<M: FailureMapper>(&mut self, mapper: M) -> Result<&mut Self> {
        self.config.remapper.register_mapper(mapper)?;
        Ok(self)
    }

    /// Run `callback` when a failure of `kind` is reported.
    ///
    /// The callback may return `()`, a `bool` or a [`Propagation`]; `false`
    /// stops reporting. Call [`ReportCallback::stop`] on the returned handle
    /// to always stop after it.
    pub fn reportable<F, R>(&mut self, kind: &'static FailureKind, callback: F) -> &mut ReportCallback
    where
        F: Fn(&Failure) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        let index = self.config.report_callbacks.len();
        self.config
            .report_callbacks
            .push(ReportCallback::new(kind, callback));
        &mut self.config.report_callbacks[index]
    }

    /// Run `callback` before the default rendering of a failure of `kind`.
    pub fn renderable<F>(&mut self, kind: &'static FailureKind, callback: F) -> &mut Self
    where
        F: Fn(&Failure, &RequestContext) -> Option<RenderedResponse> + Send + Sync + 'static,
    {
        self.config
            .render_callbacks
            .push(RenderCallback::new(kind, callback));
        self
    }

    /// Never report failures of `kind` or its descendants.
    pub fn ignore(&mut self, kind: &'static FailureKind) -> &mut Self {
        self.config.suppression.insert(kind);
        self
    }

    /// Never flash `field` back to the session on validation redirects.
    pub fn dont_flash(&mut self, field: impl Into<String>) -> &mut Self {
        self.config.settings.add_dont_flash(field);
        self
    }

    pub fn login_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.settings.login_url = url.into();
        self
    }

    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.config.settings.debug = debug;
        self
    }

    /// Replace all settings at once. Fields added with
    /// [`dont_flash`](Self::dont_flash) before this call are discarded.
    pub fn settings(&mut self, settings: HandlerSettings) -> &mut Self {
        self.config.settings = settings;
        self
    }

    /// Collaborators used while handling failures. Without this call the
    /// handler logs through [`TracingSink`] and serves only built-in pages.
    pub fn services(&mut self, services: Services) -> &mut Self {
        self.services = Some(services);
        self
    }

    pub fn diagnostics(&mut self, renderer: impl DiagnosticRenderer) -> &mut Self {
        self.config.diagnostics = Some(Arc::new(renderer));
        self
    }

    /// Use the minimal page even in debug mode.
    pub fn without_diagnostics(&mut self) -> &mut Self {
        self.config.diagnostics = None;
        self
    }

    pub fn build(self) -> ExceptionHandler {
        let services = self
            .services
            .unwrap_or_else(|| ServicesBuilder::new().sink(Arc::new(TracingSink)).build());

        tracing::debug!(
            "Exception handler built with {} remap rules, {} report callbacks, {} render callbacks",
            self.config.remapper.len(),
            self.config.report_callbacks.len(),
            self.config.render_callbacks.len()
        );

        ExceptionHandler {
            config: self.config,
            services,
        }
    }
}

/// Reports and renders failures.
///
/// Immutable once built; share it behind an [`Arc`] across requests.
#[derive(Debug)]
pub struct ExceptionHandler {
    config: HandlerConfig,
    services: Services,
}

impl ExceptionHandler {
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder::new()
    }

    /// Log a failure.
    ///
    /// Returns the failure as the error when no report sink is available; the
    /// caller must write it somewhere itself.
    pub fn report(&self, failure: Failure) -> std::result::Result<(), Failure> {
        ReportingPipeline::new(&self.config, &self.services).report(failure)
    }

    pub fn render(&self, request: &RequestContext, failure: Failure) -> RenderedResponse {
        RenderingPipeline::new(&self.config, &self.services).render(request, failure)
    }

    /// Write a failure to a terminal. Frames are listed in debug mode.
    pub fn render_for_console(&self, out: &mut dyn Write, failure: &Failure) -> io::Result<()> {
        ConsoleRenderer::new(self.config.settings().debug).render(out, failure)
    }

    pub fn should_report(&self, failure: &Failure) -> bool {
        !self.config.suppression().suppresses(failure)
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}
