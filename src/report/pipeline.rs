use crate::di::Services;
use crate::failure::Failure;
use crate::handler::HandlerConfig;
use crate::report::{IdentityProvider, LogContext, ReportSink};
use serde_json::{Map, Value};
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::Level;

/// Remap, filter, hand to callbacks, then log.
///
/// Holds only borrowed configuration, so one can be built per call.
pub struct ReportingPipeline<'a> {
    config: &'a HandlerConfig,
    services: &'a Services,
}

impl<'a> ReportingPipeline<'a> {
    pub fn new(config: &'a HandlerConfig, services: &'a Services) -> Self {
        Self { config, services }
    }

    /// Report a failure.
    ///
    /// Writes at most one record. When no [`ReportSink`] can be resolved the
    /// (remapped) failure is handed back as the error so the caller can fall
    /// back to something like standard error.
    pub fn report(&self, failure: Failure) -> Result<(), Failure> {
        let failure = self.config.remapper().apply(failure);

        if self.config.suppression().suppresses(&failure) {
            tracing::debug!("Not reporting suppressed {}", failure.kind());
            return Ok(());
        }

        if let Some(reporter) = failure.reporter() {
            if reporter.report(&failure).is_stop() {
                tracing::debug!("{} reported itself", failure.kind());
                return Ok(());
            }
        }

        for callback in self.config.report_callbacks() {
            if callback.handles(&failure) && callback.call(&failure).is_stop() {
                tracing::debug!("Reporting of {} stopped by callback", failure.kind());
                return Ok(());
            }
        }

        let sink = match self.services.resolve::<dyn ReportSink>() {
            Ok(sink) => sink,
            Err(e) => {
                tracing::debug!("No report sink available: {}", e);
                return Err(failure);
            }
        };

        let context = LogContext::merged(
            [failure.context().clone(), self.identity_context()],
            failure.clone(),
        );
        sink.record(Level::ERROR, failure.message(), &context);
        Ok(())
    }

    /// Best effort: any problem finding the user yields an empty map.
    fn identity_context(&self) -> Map<String, Value> {
        let Ok(provider) = self.services.resolve::<dyn IdentityProvider>() else {
            return Map::new();
        };

        match catch_unwind(AssertUnwindSafe(|| provider.current())) {
            Ok(Ok(identity)) => {
                let (id, email) = match identity {
                    Some(identity) => (Value::String(identity.id), identity.email.map(Value::String)),
                    None => (Value::Null, None),
                };
                let mut context = Map::new();
                context.insert(LogContext::USER_ID_KEY.to_string(), id);
                context.insert(LogContext::EMAIL_KEY.to_string(), email.unwrap_or(Value::Null));
                context
            }
            Ok(Err(e)) => {
                tracing::debug!("Identity lookup failed while reporting: {}", e);
                Map::new()
            }
            Err(_) => {
                tracing::debug!("Identity lookup panicked while reporting");
                Map::new()
            }
        }
    }
}
