//! Registry of open sessions.

use crate::core::error::{IndexdError, Result};
use crate::core::session::handle::SessionHandle;
use crate::core::types::SessionId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Map of session identity to handle, shared by the manager and the
/// session actors
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session
    ///
    /// Fails with `DuplicateRegistration` if the identity is already
    /// present; the rejected handle is dropped.
    pub fn register(&self, id: SessionId, handle: SessionHandle) -> Result<()> {
        let mut sessions = self.lock();
        if sessions.contains_key(&id) {
            return Err(IndexdError::DuplicateRegistration(id.to_string()));
        }
        sessions.insert(id, handle);
        Ok(())
    }

    /// Remove a session; removing an absent identity is a no-op
    pub fn unregister(&self, id: &SessionId) -> Option<SessionHandle> {
        self.lock().remove(id)
    }

    pub fn lookup(&self, id: &SessionId) -> Result<SessionHandle> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| IndexdError::SessionNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.lock().contains_key(id)
    }

    /// Identities of every open session, sorted
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
