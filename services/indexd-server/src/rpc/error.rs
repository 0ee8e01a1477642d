//! Transport-level error types

use crate::core::error::IndexdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bad envelope: {0}")]
    BadEnvelope(String),

    #[error("Dispatcher is not running")]
    DispatcherGone,

    #[error("Dispatcher stopped on invariant violation: {0}")]
    Fatal(IndexdError),

    #[error(transparent)]
    Core(#[from] IndexdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Stable snake_case name used in error replies
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadEnvelope(_) => "bad_envelope",
            ServerError::DispatcherGone | ServerError::Fatal(_) => "unavailable",
            ServerError::Core(e) => e.kind(),
            ServerError::Io(_) => "io_error",
            ServerError::Json(_) => "serde_error",
        }
    }
}
