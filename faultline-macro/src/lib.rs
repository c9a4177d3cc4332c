use proc_macro::TokenStream;

mod into_failure;

/// Derive macro converting an error type into a `faultline::Failure`
///
/// The failure kind comes from `#[failure(kind = ...)]` on the variant, then on
/// the type, then defaults to the generic kind. `status = N` turns the failure
/// into an HTTP failure with that status. The error's `Display` output becomes
/// the message and the error itself is kept as the source.
///
/// # Example
/// ```ignore
/// use faultline::IntoFailure;
/// use faultline::failure::kind::FailureKind;
///
/// static BILLING: FailureKind = FailureKind::new("BillingFailure");
///
/// #[derive(Debug, thiserror::Error, IntoFailure)]
/// #[failure(kind = BILLING)]
/// pub enum BillingError {
///     #[error("card declined")]
///     #[failure(status = 402)]
///     Declined,
///
///     #[error("gateway timeout")]
///     Timeout,
/// }
/// ```
#[proc_macro_derive(IntoFailure, attributes(failure))]
pub fn derive_into_failure(input: TokenStream) -> TokenStream {
    into_failure::derive_into_failure(input)
}
