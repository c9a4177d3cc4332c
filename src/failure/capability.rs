//! Optional behaviours a failure can carry to take over its own handling.
//!
//! A failure without these simply falls through to the default pipelines.

use crate::common::{RenderedResponse, RequestContext};
use crate::failure::Failure;

/// Whether a pipeline should keep going after a step ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

impl Propagation {
    pub fn is_stop(self) -> bool {
        self == Propagation::Stop
    }
}

impl From<()> for Propagation {
    fn from(_: ()) -> Self {
        Propagation::Continue
    }
}

/// `false` halts, anything else lets the pipeline continue.
impl From<bool> for Propagation {
    fn from(proceed: bool) -> Self {
        if proceed {
            Propagation::Continue
        } else {
            Propagation::Stop
        }
    }
}

/// A failure that knows how to report itself.
pub trait Reportable: Send + Sync + 'static {
    /// Return [`Propagation::Stop`] once the failure has been fully reported.
    fn report(&self, failure: &Failure) -> Propagation;
}

/// A failure that may build its own response.
pub trait Renderable: Send + Sync + 'static {
    /// `None` hands the failure back to the default rendering.
    fn render(&self, failure: &Failure, request: &RequestContext) -> Option<RenderedResponse>;
}

/// A failure that already is a response.
pub trait Responder: Send + Sync + 'static {
    fn to_response(&self, failure: &Failure, request: &RequestContext) -> RenderedResponse;
}

impl<F> Reportable for F
where
    F: Fn(&Failure) -> Propagation + Send + Sync + 'static,
{
    fn report(&self, failure: &Failure) -> Propagation {
        self(failure)
    }
}

impl<F> Renderable for F
where
    F: Fn(&Failure, &RequestContext) -> Option<RenderedResponse> + Send + Sync + 'static,
{
    fn render(&self, failure: &Failure, request: &RequestContext) -> Option<RenderedResponse> {
        self(failure, request)
    }
}

impl<F> Responder for F
where
    F: Fn(&Failure, &RequestContext) -> RenderedResponse + Send + Sync + 'static,
{
    fn to_response(&self, failure: &Failure, request: &RequestContext) -> RenderedResponse {
        self(failure, request)
    }
}
