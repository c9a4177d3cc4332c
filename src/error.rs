use thiserror::Error;

pub type Result<T> = std::result::Result<T, FaultlineError>;

/// Faults raised by the handler's own machinery, as opposed to the
/// [`Failure`](crate::Failure) values flowing through it.
#[derive(Debug, Error)]
pub enum FaultlineError {
    /// A registration could not work out which failure kind it applies to.
    #[error("Invalid exception mapping: {message}")]
    InvalidMapping { message: String },

    #[error("Service not registered: {type_name}")]
    ServiceNotFound { type_name: String },

    #[error("Failed to downcast service: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("View [{name}] could not be rendered: {message}")]
    View { name: String, message: String },

    #[error("Diagnostic page failed: {0}")]
    Diagnostics(String),

    #[error("Identity lookup failed: {0}")]
    Identity(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl FaultlineError {
    pub fn invalid_mapping(message: impl Into<String>) -> Self {
        Self::InvalidMapping {
            message: message.into(),
        }
    }

    pub fn view(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::View {
            name: name.into(),
            message: message.into(),
        }
    }
}
