//! indexd - search index node
//!
//! Opens full-text search sessions on behalf of remote peers, keeps
//! each session alive only as long as the peer that opened it, and
//! reports disk usage for index paths. Indexes are Tantivy indexes
//! stored under a single configured root directory.
//!
//! # Architecture
//!
//! The codebase is organized into two main modules:
//!
//! - **core**: Domain logic (protocol-agnostic)
//!   - config, error, types, analysis
//!   - storage (backend kinds, locking, disk usage, Tantivy)
//!   - session (lifecycle manager, registry, session actors)
//!   - liveness (peer termination)
//!   - services (unified service container)
//!
//! - **rpc**: TCP adapter (depends on core)
//!   - dispatcher, router, server, wire protocol

// Core domain logic (protocol-agnostic)
pub mod core;

// Newline-delimited JSON over TCP
pub mod rpc;

// Re-export commonly used types for convenience
pub use core::config::Config;
pub use core::error::{IndexdError, Result};
pub use core::services::Services;
pub use core::session::{SessionHandle, SessionManager, SessionRegistry};
pub use core::types::{PeerId, SessionId};
