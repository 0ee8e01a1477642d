//! Unified service container for the indexd node
//!
//! Provides shared access to all core services.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::liveness::PeerTable;
use crate::core::session::SessionRegistry;
use crate::core::storage::{BackendResolver, RootDir};
use std::sync::Arc;

/// Unified services container
///
/// The session manager and the rpc adapter use this same struct for
/// service access.
#[derive(Clone)]
pub struct Services {
    /// Application configuration
    pub config: Arc<Config>,

    /// Absolute root every session path is resolved against
    pub root: Arc<RootDir>,

    /// Named lock and directory kinds
    pub backends: Arc<BackendResolver>,

    /// Open sessions
    pub registry: Arc<SessionRegistry>,

    /// Live peers (one per rpc connection)
    pub peers: Arc<PeerTable>,
}

impl Services {
    /// Create services with the built-in backend kinds
    pub fn new(config: Config) -> Result<Self> {
        Self::with_backends(config, BackendResolver::with_builtin())
    }

    /// Create services with a custom backend registry
    pub fn with_backends(config: Config, backends: BackendResolver) -> Result<Self> {
        let root = RootDir::new(&config.storage.root_dir)?;

        if !backends
            .lock_kinds()
            .contains(&config.storage.lock_kind.as_str())
        {
            tracing::warn!(
                "Lock kind {} is not registered; opens will fail",
                config.storage.lock_kind
            );
        }
        if !backends
            .directory_kinds()
            .contains(&config.storage.directory_kind.as_str())
        {
            tracing::warn!(
                "Directory kind {} is not registered; opens will fail",
                config.storage.directory_kind
            );
        }

        Ok(Self {
            config: Arc::new(config),
            root: Arc::new(root),
            backends: Arc::new(backends),
            registry: Arc::new(SessionRegistry::new()),
            peers: PeerTable::new(),
        })
    }
}
