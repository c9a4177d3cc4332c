use std::fmt;

/// A static type tag for failures.
///
/// Kinds form a single-parent hierarchy so that a check against a general
/// kind also accepts every more specific kind below it.
///
/// # Example
/// ```
/// use faultline::failure::kind::{FailureKind, HTTP};
///
/// static DATABASE: FailureKind = FailureKind::new("DatabaseFailure");
/// static QUERY: FailureKind = FailureKind::child_of("QueryFailure", &DATABASE);
///
/// assert!(QUERY.is_a(&DATABASE));
/// assert!(!DATABASE.is_a(&QUERY));
/// assert!(!QUERY.is_a(&HTTP));
/// ```
#[derive(Debug)]
pub struct FailureKind {
    name: &'static str,
    parent: Option<&'static FailureKind>,
}

impl FailureKind {
    pub const fn new(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    pub const fn child_of(name: &'static str, parent: &'static FailureKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static FailureKind> {
        self.parent
    }

    /// True when `self` is `other` or descends from it.
    pub fn is_a(&self, other: &FailureKind) -> bool {
        self.lineage().any(|kind| kind == other)
    }

    /// Iterates `self` followed by each ancestor, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &FailureKind> {
        std::iter::successors(Some(self), |kind| kind.parent)
    }
}

// Kind names are unique, so two statics with the same name are the same kind.
impl PartialEq for FailureKind {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FailureKind {}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Anything that has not been given a more specific kind.
pub static GENERIC: FailureKind = FailureKind::new("Failure");

/// Failures that carry an HTTP status code of their own.
pub static HTTP: FailureKind = FailureKind::new("HttpFailure");
pub static NOT_FOUND_HTTP: FailureKind = FailureKind::child_of("NotFoundHttpFailure", &HTTP);
pub static ACCESS_DENIED_HTTP: FailureKind =
    FailureKind::child_of("AccessDeniedHttpFailure", &HTTP);

/// Wraps a response that was already built by the code that failed.
pub static HTTP_RESPONSE: FailureKind = FailureKind::new("HttpResponseFailure");

pub static AUTHENTICATION: FailureKind = FailureKind::new("AuthenticationFailure");
pub static AUTHORIZATION: FailureKind = FailureKind::new("AuthorizationFailure");
pub static MODEL_NOT_FOUND: FailureKind = FailureKind::new("ModelNotFoundFailure");
pub static SUSPICIOUS_OPERATION: FailureKind = FailureKind::new("SuspiciousOperationFailure");
pub static TOKEN_MISMATCH: FailureKind = FailureKind::new("TokenMismatchFailure");
pub static VALIDATION: FailureKind = FailureKind::new("ValidationFailure");
