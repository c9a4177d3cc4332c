//! Rewriting one failure into another before it is reported or rendered.

use crate::error::{FaultlineError, Result};
use crate::failure::{Failure, FailureKind};
use std::sync::Arc;

type Transform = Arc<dyn Fn(Failure) -> Failure + Send + Sync>;

/// A mapper that declares which kind it accepts.
///
/// This is the typed counterpart of registering a bare transform: the source
/// kind comes from the mapper itself instead of being passed alongside it.
///
/// # Example
/// ```
/// use faultline::Failure;
/// use faultline::failure::kind::{FailureKind, HTTP};
/// use faultline::remap::FailureMapper;
/// use axum::http::StatusCode;
///
/// static UPSTREAM: FailureKind = FailureKind::new("UpstreamFailure");
///
/// struct UpstreamToBadGateway;
///
/// impl FailureMapper for UpstreamToBadGateway {
///     fn source_kind(&self) -> Option<&'static FailureKind> {
///         Some(&UPSTREAM)
///     }
///
///     fn map(&self, failure: Failure) -> Failure {
///         Failure::http(StatusCode::BAD_GATEWAY, failure.message().to_string())
///             .with_cause(failure)
///     }
/// }
/// ```
pub trait FailureMapper: Send + Sync + 'static {
    /// The kind this mapper accepts, or `None` when it cannot say.
    fn source_kind(&self) -> Option<&'static FailureKind>;

    fn map(&self, failure: Failure) -> Failure;
}

/// One entry of the remap table.
#[derive(Clone)]
pub struct RemapRule {
    matcher: &'static FailureKind,
    transform: Transform,
}

impl RemapRule {
    pub fn matcher(&self) -> &'static FailureKind {
        self.matcher
    }

    pub fn matches(&self, failure: &Failure) -> bool {
        failure.is_a(self.matcher)
    }
}

impl std::fmt::Debug for RemapRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemapRule")
            .field("matcher", &self.matcher.name())
            .finish_non_exhaustive()
    }
}

/// Ordered table of remap rules. The first rule whose kind matches wins.
///
/// A transform must not produce a failure its own rule would match again;
/// rules are applied once per failure, so this is never detected at runtime.
#[derive(Debug, Clone, Default)]
pub struct ExceptionRemapper {
    rules: Vec<RemapRule>,
}

impl ExceptionRemapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, matcher: &'static FailureKind, transform: F)
    where
        F: Fn(Failure) -> Failure + Send + Sync + 'static,
    {
        self.rules.push(RemapRule {
            matcher,
            transform: Arc::new(transform),
        });
    }

    /// Registers a mapper whose source kind is taken from the mapper.
    ///
    /// Fails with [`FaultlineError::InvalidMapping`] when the mapper does not
    /// declare a kind.
    pub fn register_mapper<M: FailureMapper>(&mut self, mapper: M) -> Result<()> {
        let matcher = mapper.source_kind().ok_or_else(|| {
            FaultlineError::invalid_mapping(format!(
                "{} does not declare the failure kind it maps",
                std::any::type_name::<M>()
            ))
        })?;
        self.register(matcher, move |failure| mapper.map(failure));
        Ok(())
    }

    /// Maps `from` into a new failure of kind `to` with an empty message,
    /// keeping the original as its cause.
    pub fn register_into(&mut self, from: &'static FailureKind, to: &'static FailureKind) {
        self.register(from, move |failure: Failure| failure.succeeded_by(to, ""));
    }

    /// Applies the first matching rule, or hands the failure back untouched.
    pub fn apply(&self, failure: Failure) -> Failure {
        match self.rules.iter().find(|rule| rule.matches(&failure)) {
            Some(rule) => {
                tracing::debug!(
                    "Remapping {} via rule for {}",
                    failure.kind(),
                    rule.matcher
                );
                (rule.transform)(failure)
            }
            None => failure,
        }
    }

    pub fn rules(&self) -> &[RemapRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::kind::GENERIC;

    static STORAGE: FailureKind = FailureKind::new("StorageFailure");
    static DISK: FailureKind = FailureKind::child_of("DiskFailure", &STORAGE);
    static FRIENDLY: FailureKind = FailureKind::new("FriendlyFailure");

    struct Unannounced;

    impl FailureMapper for Unannounced {
        fn source_kind(&self) -> Option<&'static FailureKind> {
            None
        }

        fn map(&self, failure: Failure) -> Failure {
            failure
        }
    }

    struct DiskMapper;

    impl FailureMapper for DiskMapper {
        fn source_kind(&self) -> Option<&'static FailureKind> {
            Some(&DISK)
        }

        fn map(&self, failure: Failure) -> Failure {
            Failure::new(&FRIENDLY, format!("disk: {}", failure.message()))
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut remapper = ExceptionRemapper::new();
        remapper.register(&STORAGE, |f| Failure::generic(format!("first: {}", f.message())));
        remapper.register(&DISK, |f| Failure::generic(format!("second: {}", f.message())));

        let mapped = remapper.apply(Failure::new(&DISK, "full"));
        assert_eq!(mapped.message(), "first: full");
    }

    #[test]
    fn test_no_match_returns_input() {
        let mut remapper = ExceptionRemapper::new();
        remapper.register(&DISK, |_| Failure::generic("mapped"));

        let mapped = remapper.apply(Failure::new(&STORAGE, "untouched"));
        assert!(mapped.is_a(&STORAGE));
        assert_eq!(mapped.message(), "untouched");
    }

    #[test]
    fn test_register_mapper_infers_kind() {
        let mut remapper = ExceptionRemapper::new();
        remapper.register_mapper(DiskMapper).unwrap();

        assert_eq!(remapper.rules()[0].matcher(), &DISK);
        let mapped = remapper.apply(Failure::new(&DISK, "full"));
        assert!(mapped.is_a(&FRIENDLY));
        assert_eq!(mapped.message(), "disk: full");
    }

    #[test]
    fn test_register_mapper_without_kind_is_rejected() {
        let mut remapper = ExceptionRemapper::new();
        let err = remapper.register_mapper(Unannounced).unwrap_err();

        assert!(matches!(err, FaultlineError::InvalidMapping { .. }));
        assert!(remapper.is_empty());
    }

    #[test]
    fn test_register_into_wraps_original() {
        let mut remapper = ExceptionRemapper::new();
        remapper.register_into(&STORAGE, &GENERIC);

        let mapped = remapper.apply(Failure::new(&DISK, "full"));
        assert!(mapped.is_a(&GENERIC));
        assert_eq!(mapped.message(), "");
        assert_eq!(mapped.cause().map(Failure::message), Some("full"));
    }
}
