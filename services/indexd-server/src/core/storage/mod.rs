//! Storage layer for session indexes.
//!
//! # Architecture
//!
//! - **BackendResolver**: Maps configured lock/directory kind names to
//!   Tantivy directories
//! - **LockedDirectory**: Routes Tantivy's lock requests to a
//!   [`LockStrategy`]
//! - **RootDir**: Resolves session paths and reports disk usage
//! - **SessionIndex**: Wraps the Tantivy writer, reader and query parser
//!
//! # Layout
//!
//! ```text
//! {root_dir}/
//! └── {session path as sent by the client}/
//!     ├── meta.json
//!     ├── .managed.json
//!     └── [segment files]
//! ```

mod backend;
mod disk;
mod lock;
mod tantivy;

pub use backend::{BackendResolver, DirectoryFactory, FactoryError, LockFactory};
pub use disk::{directory_size, RootDir};
pub use lock::{LockStrategy, LockedDirectory, NativeLock, NoLock, SingleInstanceLock};
pub use tantivy::{create_schema, SearchHits, SessionIndex};
