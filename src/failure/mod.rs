//! The failure value that flows through reporting and rendering.

use crate::common::RenderedResponse;
use axum::http::StatusCode;
use serde_json::{Map, Value};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub mod capability;
pub mod kind;
pub mod trace;

pub use capability::{Propagation, Renderable, Reportable, Responder};
pub use kind::FailureKind;
pub use trace::Frame;

/// Maximum number of causes kept below a failure. Deeper links are dropped.
pub const MAX_CAUSE_DEPTH: usize = 16;

static NO_HEADERS: BTreeMap<String, String> = BTreeMap::new();

/// Kind-specific data attached to a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Http {
        status: StatusCode,
        headers: BTreeMap<String, String>,
    },
    Validation(ValidationDetails),
    Unauthenticated {
        guards: Vec<String>,
        redirect_to: Option<String>,
    },
    /// A response built before the failure was raised.
    Response(Box<RenderedResponse>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationDetails {
    /// Field name to the messages for that field.
    pub errors: BTreeMap<String, Vec<String>>,
    pub status: StatusCode,
    pub redirect_to: Option<String>,
    pub error_bag: String,
    /// Used verbatim instead of the default validation response.
    pub response: Option<Box<RenderedResponse>>,
}

/// A failure raised somewhere in the application.
///
/// Failures are immutable once built: the `with_*` methods consume the value
/// and return a new one, and remapping always produces a fresh failure.
///
/// # Example
/// ```
/// use faultline::Failure;
/// use faultline::failure::kind::{FailureKind, HTTP};
///
/// static DATABASE: FailureKind = FailureKind::new("DatabaseFailure");
///
/// let failure = Failure::new(&DATABASE, "connection refused")
///     .with_context("pool", "primary");
///
/// assert!(failure.is_a(&DATABASE));
/// assert!(!failure.is_a(&HTTP));
/// assert_eq!(failure.message(), "connection refused");
/// ```
#[derive(Clone)]
pub struct Failure {
    kind: &'static FailureKind,
    message: String,
    cause: Option<Box<Failure>>,
    payload: Payload,
    context: Map<String, Value>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
    source: Option<Arc<dyn Error + Send + Sync>>,
    reporter: Option<Arc<dyn Reportable>>,
    renderer: Option<Arc<dyn Renderable>>,
    responder: Option<Arc<dyn Responder>>,
}

impl Failure {
    #[track_caller]
    pub fn new(kind: &'static FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            payload: Payload::None,
            context: Map::new(),
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::force_capture()),
            source: None,
            reporter: None,
            renderer: None,
            responder: None,
        }
    }

    #[track_caller]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(&kind::GENERIC, message)
    }

    /// An HTTP failure with its own status code.
    #[track_caller]
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(&kind::HTTP, message).with_status(status)
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(&kind::NOT_FOUND_HTTP, message).with_status(StatusCode::NOT_FOUND)
    }

    #[track_caller]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(&kind::ACCESS_DENIED_HTTP, message).with_status(StatusCode::FORBIDDEN)
    }

    #[track_caller]
    pub fn model_not_found(model: &str) -> Self {
        Self::new(
            &kind::MODEL_NOT_FOUND,
            format!("No query results for model [{}].", model),
        )
    }

    #[track_caller]
    pub fn unauthenticated() -> Self {
        Self::new(&kind::AUTHENTICATION, "Unauthenticated.").with_payload(
            Payload::Unauthenticated {
                guards: Vec::new(),
                redirect_to: None,
            },
        )
    }

    #[track_caller]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(&kind::AUTHORIZATION, message)
    }

    #[track_caller]
    pub fn token_mismatch() -> Self {
        Self::new(&kind::TOKEN_MISMATCH, "CSRF token mismatch.")
    }

    /// A validation failure from field name to messages.
    #[track_caller]
    pub fn validation<K, M>(errors: impl IntoIterator<Item = (K, Vec<M>)>) -> Self
    where
        K: Into<String>,
        M: Into<String>,
    {
        let errors = errors
            .into_iter()
            .map(|(field, messages)| {
                (field.into(), messages.into_iter().map(Into::into).collect())
            })
            .collect();

        Self::new(&kind::VALIDATION, "The given data was invalid.").with_payload(
            Payload::Validation(ValidationDetails {
                errors,
                status: StatusCode::UNPROCESSABLE_ENTITY,
                redirect_to: None,
                error_bag: "default".to_string(),
                response: None,
            }),
        )
    }

    /// Wraps a response that should be sent as-is.
    #[track_caller]
    pub fn responding(response: RenderedResponse) -> Self {
        Self::new(&kind::HTTP_RESPONSE, "").with_payload(Payload::Response(Box::new(response)))
    }

    /// Absorbs a foreign error, keeping its `Display` text as the message.
    #[track_caller]
    pub fn from_error<E>(kind: &'static FailureKind, error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let mut failure = Self::new(kind, error.to_string());
        failure.source = Some(Arc::new(error));
        failure
    }

    /// Like [`Failure::from_error`], but first unwraps a boxed `Failure`.
    #[track_caller]
    pub fn from_boxed(kind: &'static FailureKind, error: Box<dyn Error + Send + Sync>) -> Self {
        match error.downcast::<Failure>() {
            Ok(failure) => *failure,
            Err(error) => {
                let mut failure = Self::new(kind, error.to_string());
                failure.source = Some(Arc::from(error));
                failure
            }
        }
    }

    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause.truncated(MAX_CAUSE_DEPTH - 1)));
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the status of an HTTP or validation payload, or adds an HTTP
    /// payload when the failure has none.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        match &mut self.payload {
            Payload::Http { status: current, .. } => *current = status,
            Payload::Validation(details) => details.status = status,
            Payload::None => {
                self.payload = Payload::Http {
                    status,
                    headers: BTreeMap::new(),
                }
            }
            Payload::Unauthenticated { .. } | Payload::Response(_) => {}
        }
        self
    }

    /// Adds a response header to an HTTP payload. Failures without one keep
    /// no headers.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        if let Payload::Http { headers, .. } = &mut self.payload {
            headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        }
        self
    }

    /// Where validation or authentication failures send the user.
    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        match &mut self.payload {
            Payload::Validation(details) => details.redirect_to = Some(target.into()),
            Payload::Unauthenticated { redirect_to, .. } => *redirect_to = Some(target.into()),
            _ => {}
        }
        self
    }

    pub fn with_error_bag(mut self, bag: impl Into<String>) -> Self {
        if let Payload::Validation(details) = &mut self.payload {
            details.error_bag = bag.into();
        }
        self
    }

    /// A ready response a validation failure should be answered with.
    pub fn with_prepared_response(mut self, response: RenderedResponse) -> Self {
        if let Payload::Validation(details) = &mut self.payload {
            details.response = Some(Box::new(response));
        }
        self
    }

    pub fn with_guards<G: Into<String>>(mut self, names: impl IntoIterator<Item = G>) -> Self {
        if let Payload::Unauthenticated { guards, .. } = &mut self.payload {
            guards.extend(names.into_iter().map(Into::into));
        }
        self
    }

    /// Adds an entry to the context logged alongside this failure.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_reporter(mut self, reporter: impl Reportable) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    pub fn with_renderer(mut self, renderer: impl Renderable) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn with_responder(mut self, responder: impl Responder) -> Self {
        self.responder = Some(Arc::new(responder));
        self
    }

    pub fn kind(&self) -> &'static FailureKind {
        self.kind
    }

    pub fn is_a(&self, kind: &FailureKind) -> bool {
        self.kind.is_a(kind)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    /// The cause chain, nearest first, not including `self`.
    pub fn causes(&self) -> impl Iterator<Item = &Failure> {
        std::iter::successors(self.cause(), |failure| failure.cause.as_deref())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn frames(&self) -> Vec<Frame> {
        trace::frames(&self.backtrace)
    }

    /// Status carried by an HTTP payload.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.payload {
            Payload::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        match &self.payload {
            Payload::Http { headers, .. } => headers,
            _ => &NO_HEADERS,
        }
    }

    pub fn validation_details(&self) -> Option<&ValidationDetails> {
        match &self.payload {
            Payload::Validation(details) => Some(details),
            _ => None,
        }
    }

    /// Redirect target declared by a validation or authentication failure.
    pub fn redirect_to(&self) -> Option<&str> {
        match &self.payload {
            Payload::Validation(details) => details.redirect_to.as_deref(),
            Payload::Unauthenticated { redirect_to, .. } => redirect_to.as_deref(),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Option<&dyn Reportable> {
        self.reporter.as_deref()
    }

    pub fn renderer(&self) -> Option<&dyn Renderable> {
        self.renderer.as_deref()
    }

    pub fn responder(&self) -> Option<&dyn Responder> {
        self.responder.as_deref()
    }

    /// A failure of another kind standing in for this one.
    ///
    /// It keeps this failure's origin and context and holds it as its cause,
    /// so remapping inside the crate never moves the reported location.
    pub(crate) fn succeeded_by(self, kind: &'static FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            payload: Payload::None,
            context: self.context.clone(),
            location: self.location,
            backtrace: Arc::clone(&self.backtrace),
            source: None,
            reporter: None,
            renderer: None,
            responder: None,
        }
        .with_cause(self)
    }

    fn truncated(mut self, remaining: usize) -> Self {
        self.cause = match self.cause.take() {
            Some(cause) if remaining > 0 => Some(Box::new(cause.truncated(remaining - 1))),
            _ => None,
        };
        self
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind.name())
            .field("message", &self.message)
            .field("payload", &self.payload)
            .field("location", &format_args!("{}", self.location))
            .field("cause", &self.cause)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(self.kind.name())
        } else {
            f.write_str(&self.message)
        }
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => self
                .source
                .as_deref()
                .map(|source| source as &(dyn Error + 'static)),
        }
    }
}

impl From<anyhow::Error> for Failure {
    #[track_caller]
    fn from(error: anyhow::Error) -> Self {
        let boxed: Box<dyn Error + Send + Sync> = error.into();
        Self::from_boxed(&kind::GENERIC, boxed)
    }
}

#[cfg(feature = "sea-orm-db")]
impl From<sea_orm::DbErr> for Failure {
    #[track_caller]
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(model) => Self::model_not_found(&model),
            other => Self::from_error(&kind::GENERIC, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_chain_is_bounded() {
        let mut failure = Failure::generic("level 0");
        for level in 1..40 {
            failure = Failure::generic(format!("level {}", level)).with_cause(failure);
        }

        assert_eq!(failure.causes().count(), MAX_CAUSE_DEPTH);
        assert_eq!(failure.cause().map(Failure::message), Some("level 38"));
    }

    #[test]
    fn test_location_points_at_caller() {
        let failure = Failure::generic("boom");
        assert!(failure.location().file().ends_with("mod.rs"));
    }

    #[test]
    fn test_with_status_creates_http_payload() {
        let failure = Failure::new(&kind::HTTP, "slow down")
            .with_status(StatusCode::TOO_MANY_REQUESTS)
            .with_header("Retry-After", "30");

        assert_eq!(failure.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(failure.headers()["retry-after"], "30");
    }

    #[test]
    fn test_header_alone_adds_no_status() {
        let failure = Failure::generic("boom").with_header("Retry-After", "30");

        assert_eq!(failure.status(), None);
        assert!(failure.headers().is_empty());
    }

    #[test]
    fn test_validation_defaults() {
        let failure = Failure::validation([("email", vec!["The email field is required."])]);
        let details = failure.validation_details().unwrap();

        assert_eq!(details.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(details.error_bag, "default");
        assert_eq!(details.errors["email"], vec!["The email field is required."]);
        assert!(failure.is_a(&kind::VALIDATION));
    }

    #[test]
    fn test_from_boxed_unwraps_failures() {
        let original = Failure::not_found("missing");
        let boxed: Box<dyn Error + Send + Sync> = Box::new(original);
        let failure = Failure::from_boxed(&kind::GENERIC, boxed);

        assert!(failure.is_a(&kind::NOT_FOUND_HTTP));
        assert_eq!(failure.message(), "missing");
    }

    #[test]
    fn test_from_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let failure = Failure::from_error(&kind::GENERIC, io);

        assert_eq!(failure.message(), "disk full");
        assert_eq!(failure.source().map(|s| s.to_string()).as_deref(), Some("disk full"));
    }

    #[test]
    fn test_succeeded_by_keeps_origin() {
        let original = Failure::model_not_found("User").with_context("id", 7);
        let location = original.location();
        let successor = original.succeeded_by(&kind::NOT_FOUND_HTTP, "gone");

        assert!(successor.is_a(&kind::NOT_FOUND_HTTP));
        assert_eq!(successor.location(), location);
        assert_eq!(successor.context()["id"], 7);
        assert!(successor.cause().unwrap().is_a(&kind::MODEL_NOT_FOUND));
    }

    static BILLING: FailureKind = FailureKind::new("BillingFailure");

    #[derive(Debug, thiserror::Error, crate::IntoFailure)]
    #[failure(kind = BILLING)]
    enum BillingError {
        #[error("card declined")]
        #[failure(status = 402)]
        Declined,
        #[error("gateway said {0}")]
        Gateway(String),
        #[error("not signed in")]
        #[failure(kind = kind::AUTHENTICATION)]
        SignedOut { user: Option<u64> },
    }

    #[derive(Debug, thiserror::Error, crate::IntoFailure)]
    #[error("cache offline")]
    struct CacheError;

    #[test]
    fn test_derived_conversion() {
        let failure = Failure::from(BillingError::Declined);
        assert!(failure.is_a(&BILLING));
        assert_eq!(failure.status(), Some(StatusCode::PAYMENT_REQUIRED));
        assert_eq!(failure.message(), "card declined");
        assert!(failure.location().file().ends_with("mod.rs"));

        let failure = Failure::from(BillingError::Gateway("503".into()));
        assert!(failure.is_a(&BILLING));
        assert_eq!(failure.status(), None);
        assert_eq!(failure.message(), "gateway said 503");

        let failure = Failure::from(BillingError::SignedOut { user: None });
        assert!(failure.is_a(&kind::AUTHENTICATION));

        let failure: Failure = CacheError.into();
        assert!(failure.is_a(&kind::GENERIC));
        assert!(failure.source().is_some());
    }

    #[test]
    fn test_display_falls_back_to_kind_name() {
        let failure = Failure::responding(RenderedResponse::redirect("/"));
        assert_eq!(failure.to_string(), "HttpResponseFailure");
    }
}
