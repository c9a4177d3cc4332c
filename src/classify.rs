//! Coarse classification of failures and the "do not report" list.

use crate::failure::Failure;
use crate::failure::kind::{self, FailureKind};
use strum_macros::{AsRefStr, Display, EnumIter};

/// The handling category a failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Shape {
    Validation,
    NotFound,
    Unauthenticated,
    Unauthorized,
    SessionMismatch,
    SelfRendering,
    SelfResponding,
    Generic,
}

/// Decides the shape of a failure.
///
/// Capabilities take precedence over the kind: a failure that can render or
/// respond for itself is classified by that before its kind is looked at.
pub fn classify(failure: &Failure) -> Shape {
    if failure.renderer().is_some() {
        return Shape::SelfRendering;
    }
    if failure.responder().is_some() {
        return Shape::SelfResponding;
    }

    Shape::of_kind(failure.kind())
}

impl Shape {
    /// The shape implied by a kind alone, ignoring capabilities.
    pub fn of_kind(kind: &FailureKind) -> Shape {
        if kind.is_a(&kind::VALIDATION) {
            Shape::Validation
        } else if kind.is_a(&kind::MODEL_NOT_FOUND) || kind.is_a(&kind::NOT_FOUND_HTTP) {
            Shape::NotFound
        } else if kind.is_a(&kind::AUTHENTICATION) {
            Shape::Unauthenticated
        } else if kind.is_a(&kind::AUTHORIZATION) || kind.is_a(&kind::ACCESS_DENIED_HTTP) {
            Shape::Unauthorized
        } else if kind.is_a(&kind::TOKEN_MISMATCH) {
            Shape::SessionMismatch
        } else {
            Shape::Generic
        }
    }
}

/// Whether a failure carries its own HTTP status.
pub fn is_http(failure: &Failure) -> bool {
    failure.is_a(&kind::HTTP) || failure.status().is_some()
}

/// Kinds that are part of normal request flow rather than faults.
static BASELINE: [&FailureKind; 8] = [
    &kind::AUTHENTICATION,
    &kind::AUTHORIZATION,
    &kind::HTTP,
    &kind::HTTP_RESPONSE,
    &kind::MODEL_NOT_FOUND,
    &kind::SUSPICIOUS_OPERATION,
    &kind::TOKEN_MISMATCH,
    &kind::VALIDATION,
];

/// Kinds that are never handed to the logger.
///
/// Starts from the framework's internal list and only grows while the handler
/// is being built.
#[derive(Debug, Clone)]
pub struct SuppressionSet {
    kinds: Vec<&'static FailureKind>,
}

impl SuppressionSet {
    pub fn new() -> Self {
        Self {
            kinds: BASELINE.to_vec(),
        }
    }

    /// A set with none of the internal kinds.
    pub fn empty() -> Self {
        Self { kinds: Vec::new() }
    }

    pub fn insert(&mut self, kind: &'static FailureKind) {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
    }

    /// True when the failure's kind, or any kind it descends from, is listed.
    pub fn suppresses(&self, failure: &Failure) -> bool {
        self.kinds.iter().any(|kind| failure.is_a(kind))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for SuppressionSet {
    fn default() -> Self {
        Self::new()
    }
}
