//! # Faultline
//!
//! Exception reporting and response rendering for axum applications.
//!
//! Handlers return a [`Failure`]; the [`ExceptionHandler`] decides whether it
//! gets logged and turns it into a response suited to the request.
//!
//! ## Features
//!
//! - **Remapping**: rewrite one failure kind into another before anything else happens
//! - **Suppression**: keep expected failures (validation, not found, ...) out of the logs
//! - **Callbacks**: per-kind report and render hooks, run in registration order
//! - **Content negotiation**: JSON bodies for API clients, themed HTML pages for browsers
//! - **Debug pages**: rich diagnostics in development, nothing sensitive in production
//! - **Tower integration**: [`ExceptionLayer`] reports and renders whatever a route returns
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use faultline::prelude::*;
//!
//! static PAYMENT: FailureKind = FailureKind::new("PaymentFailure");
//!
//! async fn checkout() -> Result<String, Failure> {
//!     Err(Failure::new(&PAYMENT, "card declined"))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut builder = HandlerBuilder::from_config(&ConfigService::new());
//!     builder.map(&PAYMENT, |failure: Failure| {
//!         Failure::http(StatusCode::PAYMENT_REQUIRED, "Payment required").with_cause(failure)
//!     });
//!     builder.reportable(&PAYMENT, |failure: &Failure| {
//!         tracing::warn!("payment failed: {}", failure);
//!     });
//!
//!     let app: Router = Router::new()
//!         .route("/checkout", axum::routing::post(checkout))
//!         .layer(ExceptionLayer::new(Arc::new(builder.build())));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

extern crate self as faultline;

pub mod classify;
pub mod common;
pub mod config;
pub mod di;
pub mod error;
pub mod failure;
pub mod handler;
pub mod interceptor;
pub mod layer;
pub mod remap;
pub mod render;
pub mod report;

#[cfg(test)]
mod testing;

// Re-export core types
pub use common::{RenderedResponse, RequestContext};
pub use error::{FaultlineError, Result};
pub use failure::{Failure, FailureKind, Propagation};
pub use handler::{ExceptionHandler, HandlerBuilder};
pub use layer::ExceptionLayer;

// Re-export macros
pub use faultline_macro::IntoFailure;

// Re-export commonly used types from dependencies
pub use axum;
pub use axum::http::StatusCode;

/// Prelude module for convenient imports
///
/// ```
/// use faultline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::IntoFailure;
    pub use crate::common::{Body, Flash, RenderedResponse, RequestContext};
    pub use crate::config::{ConfigService, HandlerSettings};
    pub use crate::di::{Services, ServicesBuilder};
    pub use crate::error::FaultlineError;
    pub use crate::failure::{Failure, FailureKind, Propagation, Renderable, Reportable, Responder};
    pub use crate::handler::{ExceptionHandler, HandlerBuilder};
    pub use crate::layer::ExceptionLayer;
    pub use crate::report::{Identity, IdentityProvider, ReportSink, TracingSink};
    pub use crate::render::{DiagnosticRenderer, FileViewEngine, ViewEngine};
    pub use axum::{
        Router,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    pub use std::sync::Arc;
}
