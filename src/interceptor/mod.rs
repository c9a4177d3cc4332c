//! Callbacks registered against a failure kind.
//!
//! Report callbacks run before the logger; render callbacks run before the
//! built-in response construction. Both are invoked in registration order and
//! only for failures of their kind (or a descendant of it).

use crate::common::{RenderedResponse, RequestContext};
use crate::failure::{Failure, FailureKind, Propagation};
use std::sync::Arc;

type ReportFn = Arc<dyn Fn(&Failure) -> Propagation + Send + Sync>;
type RenderFn = Arc<dyn Fn(&Failure, &RequestContext) -> Option<RenderedResponse> + Send + Sync>;

/// A report-side callback.
#[derive(Clone)]
pub struct ReportCallback {
    kind: &'static FailureKind,
    callback: ReportFn,
    stop: bool,
}

impl ReportCallback {
    /// The callback may return `()`, a `bool` (`false` stops), or a
    /// [`Propagation`].
    pub fn new<F, R>(kind: &'static FailureKind, callback: F) -> Self
    where
        F: Fn(&Failure) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        Self {
            kind,
            callback: Arc::new(move |failure: &Failure| callback(failure).into()),
            stop: false,
        }
    }

    /// Halt reporting after this callback runs, whatever it returns.
    pub fn stop(&mut self) -> &mut Self {
        self.stop = true;
        self
    }

    pub fn kind(&self) -> &'static FailureKind {
        self.kind
    }

    pub fn handles(&self, failure: &Failure) -> bool {
        failure.is_a(self.kind)
    }

    pub fn call(&self, failure: &Failure) -> Propagation {
        let outcome = (self.callback)(failure);
        if self.stop { Propagation::Stop } else { outcome }
    }
}

impl std::fmt::Debug for ReportCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportCallback")
            .field("kind", &self.kind.name())
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

/// A render-side callback. Returning a response stops rendering.
#[derive(Clone)]
pub struct RenderCallback {
    kind: &'static FailureKind,
    callback: RenderFn,
}

impl RenderCallback {
    pub fn new<F>(kind: &'static FailureKind, callback: F) -> Self
    where
        F: Fn(&Failure, &RequestContext) -> Option<RenderedResponse> + Send + Sync + 'static,
    {
        Self {
            kind,
            callback: Arc::new(callback),
        }
    }

    pub fn kind(&self) -> &'static FailureKind {
        self.kind
    }

    pub fn handles(&self, failure: &Failure) -> bool {
        failure.is_a(self.kind)
    }

    pub fn call(&self, failure: &Failure, request: &RequestContext) -> Option<RenderedResponse> {
        (self.callback)(failure, request)
    }
}

impl std::fmt::Debug for RenderCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCallback")
            .field("kind", &self.kind.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::kind::GENERIC;
    use axum::http::StatusCode;

    static QUEUE: FailureKind = FailureKind::child_of("QueueFailure", &GENERIC);

    #[test]
    fn test_return_values_become_propagation() {
        let unit = ReportCallback::new(&GENERIC, |_| ());
        let halt = ReportCallback::new(&GENERIC, |_| false);
        let proceed = ReportCallback::new(&GENERIC, |_| true);

        let failure = Failure::generic("boom");
        assert_eq!(unit.call(&failure), Propagation::Continue);
        assert_eq!(halt.call(&failure), Propagation::Stop);
        assert_eq!(proceed.call(&failure), Propagation::Continue);
    }

    #[test]
    fn test_stop_overrides_result() {
        let mut callback = ReportCallback::new(&GENERIC, |_| ());
        callback.stop();
        assert!(callback.call(&Failure::generic("boom")).is_stop());
    }

    #[test]
    fn test_handles_descendants_only() {
        let callback = ReportCallback::new(&QUEUE, |_| ());
        assert!(callback.handles(&Failure::new(&QUEUE, "stuck")));
        assert!(!callback.handles(&Failure::generic("boom")));
    }

    #[test]
    fn test_render_callback() {
        let callback = RenderCallback::new(&QUEUE, |failure, _| {
            Some(RenderedResponse::text(
                StatusCode::SERVICE_UNAVAILABLE,
                failure.message().to_string(),
            ))
        });

        let response = callback
            .call(&Failure::new(&QUEUE, "stuck"), &RequestContext::new())
            .unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
