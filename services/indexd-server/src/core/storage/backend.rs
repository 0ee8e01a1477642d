//! Storage backend resolution.
//!
//! Backends are selected by two configured kind names: a directory
//! kind (storage medium) and a lock kind. Both are looked up in a
//! registry of named factories when a session opens, so embedders can
//! register additional kinds before the node starts serving.

use crate::core::error::{IndexdError, Result};
use crate::core::storage::lock::{
    LockStrategy, LockedDirectory, NativeLock, NoLock, SingleInstanceLock,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tantivy::directory::{Directory, MmapDirectory, RamDirectory};

/// Error type returned by backend factories
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Builds a directory rooted at a path
pub type DirectoryFactory =
    Arc<dyn Fn(&Path) -> std::result::Result<Box<dyn Directory>, FactoryError> + Send + Sync>;

/// Builds a lock strategy
pub type LockFactory =
    Arc<dyn Fn() -> std::result::Result<Arc<dyn LockStrategy>, FactoryError> + Send + Sync>;

/// Registry of named directory and lock kinds
pub struct BackendResolver {
    directory_kinds: BTreeMap<String, DirectoryFactory>,
    lock_kinds: BTreeMap<String, LockFactory>,
}

impl BackendResolver {
    /// Resolver with no kinds registered
    pub fn empty() -> Self {
        Self {
            directory_kinds: BTreeMap::new(),
            lock_kinds: BTreeMap::new(),
        }
    }

    /// Resolver with the built-in kinds
    ///
    /// - directories: `mmap`, `ram`
    /// - locks: `native`, `single_instance`, `none`
    pub fn with_builtin() -> Self {
        let mut resolver = Self::empty();

        resolver.register_directory_kind("mmap", |path| {
            fs::create_dir_all(path)?;
            Ok(Box::new(MmapDirectory::open(path)?))
        });
        resolver.register_directory_kind("ram", |_path| Ok(Box::new(RamDirectory::create())));

        resolver.register_lock_kind("native", || Ok(Arc::new(NativeLock)));
        resolver.register_lock_kind("single_instance", || Ok(Arc::new(SingleInstanceLock)));
        resolver.register_lock_kind("none", || Ok(Arc::new(NoLock)));

        resolver
    }

    /// Register (or replace) a directory kind
    pub fn register_directory_kind<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Path) -> std::result::Result<Box<dyn Directory>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        self.directory_kinds
            .insert(name.to_string(), Arc::new(factory));
        tracing::debug!("Registered directory kind: {}", name);
    }

    /// Register (or replace) a lock kind
    pub fn register_lock_kind<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> std::result::Result<Arc<dyn LockStrategy>, FactoryError>
            + Send
            + Sync
            + 'static,
    {
        self.lock_kinds.insert(name.to_string(), Arc::new(factory));
        tracing::debug!("Registered lock kind: {}", name);
    }

    pub fn directory_kinds(&self) -> Vec<&str> {
        self.directory_kinds.keys().map(String::as_str).collect()
    }

    pub fn lock_kinds(&self) -> Vec<&str> {
        self.lock_kinds.keys().map(String::as_str).collect()
    }

    /// Build a directory at `path` using the named kinds
    pub fn resolve(
        &self,
        lock_kind: &str,
        directory_kind: &str,
        path: &Path,
    ) -> Result<Box<dyn Directory>> {
        let lock_factory =
            self.lock_kinds
                .get(lock_kind)
                .ok_or_else(|| IndexdError::UnknownBackendKind {
                    family: "lock",
                    name: lock_kind.to_string(),
                })?;
        let directory_factory = self.directory_kinds.get(directory_kind).ok_or_else(|| {
            IndexdError::UnknownBackendKind {
                family: "directory",
                name: directory_kind.to_string(),
            }
        })?;

        let strategy = lock_factory().map_err(|e| IndexdError::BackendConstructionError {
            kind: lock_kind.to_string(),
            message: e.to_string(),
        })?;
        let directory =
            directory_factory(path).map_err(|e| IndexdError::BackendConstructionError {
                kind: directory_kind.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            "Resolved {}/{} backend at {}",
            directory_kind,
            lock_kind,
            path.display()
        );

        Ok(Box::new(LockedDirectory::new(
            directory,
            path.to_path_buf(),
            strategy,
        )))
    }
}

impl Default for BackendResolver {
    fn default() -> Self {
        Self::with_builtin()
    }
}
