//! Locking strategies for session directories.
//!
//! Tantivy takes its writer and meta locks through
//! [`Directory::acquire_lock`]. [`LockedDirectory`] wraps any directory
//! and routes those requests to a configurable [`LockStrategy`] while
//! delegating every other operation to the wrapped directory.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tantivy::directory::error::{DeleteError, LockError, OpenReadError, OpenWriteError};
use tantivy::directory::{
    Directory, DirectoryClone, DirectoryLock, FileHandle, FileSlice, Lock, WatchCallback,
    WatchHandle, WritePtr,
};

/// Attempts made for a blocking lock before giving up
const BLOCKING_LOCK_RETRIES: usize = 500;
const BLOCKING_LOCK_BACKOFF: Duration = Duration::from_millis(10);

/// Locks held through [`SingleInstanceLock`], keyed by directory root
/// and lock file
static HELD_LOCKS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Strategy deciding how a directory lock is obtained
pub trait LockStrategy: fmt::Debug + Send + Sync {
    fn acquire(
        &self,
        directory: &dyn Directory,
        root: &Path,
        lock: &Lock,
    ) -> Result<DirectoryLock, LockError>;
}

/// Defers to the wrapped directory's own locking (OS file locks for mmap)
#[derive(Debug, Default)]
pub struct NativeLock;

impl LockStrategy for NativeLock {
    fn acquire(
        &self,
        directory: &dyn Directory,
        _root: &Path,
        lock: &Lock,
    ) -> Result<DirectoryLock, LockError> {
        directory.acquire_lock(lock)
    }
}

/// Process-wide in-memory lock table
#[derive(Debug, Default)]
pub struct SingleInstanceLock;

struct HeldLock {
    key: PathBuf,
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        held_locks().remove(&self.key);
    }
}

fn held_locks() -> std::sync::MutexGuard<'static, HashSet<PathBuf>> {
    HELD_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LockStrategy for SingleInstanceLock {
    fn acquire(
        &self,
        _directory: &dyn Directory,
        root: &Path,
        lock: &Lock,
    ) -> Result<DirectoryLock, LockError> {
        let key = root.join(&lock.filepath);
        let attempts = if lock.is_blocking {
            BLOCKING_LOCK_RETRIES
        } else {
            1
        };

        for attempt in 0..attempts {
            if held_locks().insert(key.clone()) {
                return Ok(DirectoryLock::from(Box::new(HeldLock { key })));
            }
            if attempt + 1 < attempts {
                std::thread::sleep(BLOCKING_LOCK_BACKOFF);
            }
        }

        Err(LockError::LockBusy)
    }
}

/// Grants every lock request; exclusivity is the operator's problem
#[derive(Debug, Default)]
pub struct NoLock;

impl LockStrategy for NoLock {
    fn acquire(
        &self,
        _directory: &dyn Directory,
        _root: &Path,
        _lock: &Lock,
    ) -> Result<DirectoryLock, LockError> {
        Ok(DirectoryLock::from(Box::new(())))
    }
}

/// Directory whose locks come from a [`LockStrategy`]
#[derive(Debug)]
pub struct LockedDirectory {
    inner: Box<dyn Directory>,
    root: PathBuf,
    strategy: Arc<dyn LockStrategy>,
}

impl LockedDirectory {
    pub fn new(inner: Box<dyn Directory>, root: PathBuf, strategy: Arc<dyn LockStrategy>) -> Self {
        Self {
            inner,
            root,
            strategy,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Clone for LockedDirectory {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.box_clone(),
            root: self.root.clone(),
            strategy: Arc::clone(&self.strategy),
        }
    }
}

impl Directory for LockedDirectory {
    fn get_file_handle(&self, path: &Path) -> Result<Arc<dyn FileHandle>, OpenReadError> {
        self.inner.get_file_handle(path)
    }

    fn open_read(&self, path: &Path) -> Result<FileSlice, OpenReadError> {
        self.inner.open_read(path)
    }

    fn delete(&self, path: &Path) -> Result<(), DeleteError> {
        self.inner.delete(path)
    }

    fn exists(&self, path: &Path) -> Result<bool, OpenReadError> {
        self.inner.exists(path)
    }

    fn open_write(&self, path: &Path) -> Result<WritePtr, OpenWriteError> {
        self.inner.open_write(path)
    }

    fn atomic_read(&self, path: &Path) -> Result<Vec<u8>, OpenReadError> {
        self.inner.atomic_read(path)
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.inner.atomic_write(path, data)
    }

    fn acquire_lock(&self, lock: &Lock) -> Result<DirectoryLock, LockError> {
        self.strategy.acquire(self.inner.as_ref(), &self.root, lock)
    }

    fn watch(&self, watch_callback: WatchCallback) -> tantivy::Result<WatchHandle> {
        self.inner.watch(watch_callback)
    }

    fn sync_directory(&self) -> io::Result<()> {
        self.inner.sync_directory()
    }
}
