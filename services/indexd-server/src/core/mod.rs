//! Core domain logic (protocol-agnostic)
//!
//! This module contains all session and storage logic that is
//! independent of the wire protocol.
//!
//! # Architecture
//!
//! - **config**: Configuration loading (TOML + environment)
//! - **error**: Error types and Result alias
//! - **types**: Session and peer identities
//! - **analysis**: Analyzer configuration and tokenizers
//! - **storage**: Backend kinds, locking, disk usage, Tantivy indexes
//! - **session**: Lifecycle manager, registry, session actors
//! - **liveness**: Peer termination notifications
//! - **metrics**: Latency timers
//! - **services**: Unified service container

pub mod analysis;
pub mod config;
pub mod error;
pub mod liveness;
pub mod metrics;
pub mod services;
pub mod session;
pub mod storage;
pub mod types;

// Re-export key types for convenience
pub use config::Config;
pub use error::{IndexdError, Result};
pub use services::Services;
