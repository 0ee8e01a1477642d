//! Error types and error handling for the indexd node.
//!
//! This module defines the error types used throughout the
//! core. Wire encoding of errors is handled by the rpc adapter,
//! which uses [`IndexdError::kind`] as the stable error name.

use thiserror::Error;

/// Result type alias for indexd operations
pub type Result<T> = std::result::Result<T, IndexdError>;

/// Main error type for the indexd core
#[derive(Error, Debug)]
pub enum IndexdError {
    #[error("Invalid analyzer config: {0}")]
    InvalidAnalyzerConfig(String),

    #[error("Unknown {family} backend kind: {name}")]
    UnknownBackendKind { family: &'static str, name: String },

    #[error("Failed to construct {kind} backend: {message}")]
    BackendConstructionError { kind: String, message: String },

    #[error("Failed to open index at {path}: {message}")]
    StorageOpenError { path: String, message: String },

    #[error("Session already registered: {0}")]
    DuplicateRegistration(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Indexing failed: {0}")]
    IndexingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl IndexdError {
    /// Get user-friendly error message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Stable snake_case name used in error replies
    pub fn kind(&self) -> &'static str {
        match self {
            IndexdError::InvalidAnalyzerConfig(_) => "invalid_analyzer_config",
            IndexdError::UnknownBackendKind { .. } => "unknown_backend_kind",
            IndexdError::BackendConstructionError { .. } => "backend_construction_error",
            IndexdError::StorageOpenError { .. } => "storage_open_error",
            IndexdError::DuplicateRegistration(_) => "duplicate_registration",
            IndexdError::InvalidPath(_) => "invalid_path",
            IndexdError::SessionNotFound(_) => "session_not_found",
            IndexdError::SessionClosed(_) => "session_closed",
            IndexdError::InvalidRequest(_) => "invalid_request",
            IndexdError::SearchFailed(_) => "search_failed",
            IndexdError::IndexingFailed(_) => "indexing_failed",
            IndexdError::ConfigError(_) => "config_error",
            IndexdError::IoError(_) => "io_error",
            IndexdError::SerdeError(_) => "serde_error",
            IndexdError::TomlError(_) => "toml_error",
        }
    }

    /// Invariant violations that must stop the owning actor
    pub fn is_fatal(&self) -> bool {
        matches!(self, IndexdError::DuplicateRegistration(_))
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IndexdError::SessionNotFound(_) | IndexdError::SessionClosed(_)
        )
    }
}
