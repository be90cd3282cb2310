//! Failure taxonomy for the sync layer.
//!
//! Data sources report expected failures as [`AdapterError`] values. Controllers
//! normalise everything they see into [`ControllerError`]; the orchestrator
//! only ever keeps the message string.

use thiserror::Error;

/// Expected failure reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("{source_name} is unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },
    #[error("{0} is not implemented")]
    NotImplemented(String),
    #[error("invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },
    #[error("{0} not found")]
    NotFound(String),
}

impl AdapterError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Adapter,
    Unexpected,
}

/// Failure of a controller operation. `Display` yields the bare message so it
/// can be stored as-is in controller and orchestrator state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The operation's input state is missing (e.g. nothing loaded yet).
    #[error("{0}")]
    Precondition(String),
    #[error("{0}")]
    Adapter(#[from] AdapterError),
    /// A panic or cancelled task caught at the controller boundary.
    #[error("{0}")]
    Unexpected(String),
}

impl ControllerError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Programmer errors surface without detail.
    pub fn unknown() -> Self {
        Self::Unexpected("Unknown error".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ControllerError::Precondition(_) => ErrorKind::Precondition,
            ControllerError::Adapter(_) => ErrorKind::Adapter,
            ControllerError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}
