//! Error types for the Clonechat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for Clonechat operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<CycleError> for Error {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::Rejected(e) => Error::Validation(e),
            CycleError::Log(e) => Error::Log(e),
        }
    }
}

// --- Boundary errors ---

/// Failure of the generation endpoint round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Network failure, timeout, or a non-2xx status.
    #[error("transport failure: {message}")]
    TransportFailure {
        status: Option<u16>,
        message: String,
    },

    /// The endpoint answered 2xx but without a usable text part.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::TransportFailure {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn kind(&self) -> GenerationFailureKind {
        match self {
            Self::TransportFailure { .. } => GenerationFailureKind::TransportFailure,
            Self::MalformedResponse(_) => GenerationFailureKind::MalformedResponse,
        }
    }
}

/// Payload-free classification of a [`GenerationError`], safe to serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailureKind {
    TransportFailure,
    MalformedResponse,
}

/// Failure of the conversation log store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("log store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("corrupt log data: {0}")]
    Corrupt(String),
}

/// A submit that was refused before any side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("session is not ready")]
    SessionNotReady,

    #[error("a send cycle is already in flight")]
    CycleInFlight,
}

/// Why a send cycle was refused or aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("submit rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("log append failed: {0}")]
    Log(#[from] LogError),
}
