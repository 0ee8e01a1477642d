//! Session lifecycle management.
//!
//! The [`SessionManager`] opens sessions, links each one to the peer
//! that asked for it, and tears sessions down when their peer dies.
//! It is owned by a single actor (the rpc dispatcher), so its methods
//! take `&mut self` and never race with each other.

use crate::core::analysis::Analyzer;
use crate::core::config::{SearchConfig, StorageConfig, WriterConfig};
use crate::core::error::{IndexdError, Result};
use crate::core::liveness::LivenessMonitor;
use crate::core::metrics::{Timer, TimerSnapshot};
use crate::core::services::Services;
use crate::core::session::handle::{CloseReason, SessionActor};
use crate::core::session::registry::SessionRegistry;
use crate::core::storage::{BackendResolver, RootDir, SessionIndex};
use crate::core::types::{PeerId, SessionId};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Notifications the manager must act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A peer with linked sessions terminated
    PeerDown(PeerId),
    /// A session closed itself
    SessionClosed(SessionId),
}

/// Opens sessions and ties their lifetime to peers
pub struct SessionManager {
    root: Arc<RootDir>,
    backends: Arc<BackendResolver>,
    registry: Arc<SessionRegistry>,
    liveness: Arc<dyn LivenessMonitor>,
    storage: StorageConfig,
    writer: WriterConfig,
    search: SearchConfig,
    links: HashMap<PeerId, BTreeSet<SessionId>>,
    linked_peer: HashMap<SessionId, PeerId>,
    watchers: HashMap<PeerId, AbortHandle>,
    issue_id: fn() -> SessionId,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    open_timer: Timer,
}

impl SessionManager {
    /// Manager watching the in-process peer table
    pub fn new(services: &Services) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let liveness: Arc<dyn LivenessMonitor> = services.peers.clone();
        Self::with_liveness(services, liveness)
    }

    /// Manager watching an arbitrary liveness source
    ///
    /// The returned receiver carries the events that must be fed back
    /// through [`SessionManager::handle_event`].
    pub fn with_liveness(
        services: &Services,
        liveness: Arc<dyn LivenessMonitor>,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Self {
            root: Arc::clone(&services.root),
            backends: Arc::clone(&services.backends),
            registry: Arc::clone(&services.registry),
            liveness,
            storage: services.config.storage.clone(),
            writer: services.config.writer.clone(),
            search: services.config.search.clone(),
            links: HashMap::new(),
            linked_peer: HashMap::new(),
            watchers: HashMap::new(),
            issue_id: SessionId::next,
            events,
            open_timer: Timer::new("session_open"),
        };
        (manager, rx)
    }

    /// Replace the source of session identities
    #[cfg(test)]
    pub(crate) fn with_id_source(mut self, issue_id: fn() -> SessionId) -> Self {
        self.issue_id = issue_id;
        self
    }

    /// Open a session on `path` for `peer`
    ///
    /// On failure nothing is registered and any writer that was opened
    /// is released. `DuplicateRegistration` is an invariant violation
    /// the caller must treat as fatal.
    pub async fn open(&mut self, peer: PeerId, path: &str, analyzer: &Value) -> Result<SessionId> {
        let timer = self.open_timer.time();

        let analyzer = Analyzer::from_value(analyzer)?;
        let dir = self.root.resolve(path)?;

        let index = {
            let backends = Arc::clone(&self.backends);
            let lock_kind = self.storage.lock_kind.clone();
            let directory_kind = self.storage.directory_kind.clone();
            let writer = self.writer.clone();
            let dir = dir.clone();
            let label = path.to_string();

            tokio::task::spawn_blocking(move || {
                let directory = backends.resolve(&lock_kind, &directory_kind, &dir)?;
                SessionIndex::open(directory, &analyzer, &writer, &label)
            })
            .await
            .map_err(|e| IndexdError::StorageOpenError {
                path: path.to_string(),
                message: format!("open task failed: {e}"),
            })??
        };

        let id = (self.issue_id)();
        let handle = SessionActor::new(
            id,
            path,
            dir,
            index,
            &self.registry,
            self.events.clone(),
            self.search.clone(),
        )
        .spawn();

        // A rejected handle is dropped here, which stops the actor and
        // closes its writer.
        self.registry.register(id, handle)?;
        self.link(peer, id);

        let elapsed = timer.stop();
        tracing::info!(
            "Opened session {} at {} for {} in {}ms",
            id,
            path,
            peer,
            elapsed.as_millis()
        );

        Ok(id)
    }

    /// Act on a lifecycle event
    pub async fn handle_event(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::PeerDown(peer) => self.peer_down(peer).await,
            LifecycleEvent::SessionClosed(id) => self.unlink(&id),
        }
    }

    /// Bytes used directly under `path`
    pub fn disk_size(&self, path: &str) -> u64 {
        self.root.disk_size(path)
    }

    pub fn root_dir(&self) -> &Path {
        self.root.path()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Peer a session is linked to
    pub fn linked_peer(&self, id: &SessionId) -> Option<PeerId> {
        self.linked_peer.get(id).copied()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Latency figures for completed opens
    pub fn open_stats(&self) -> TimerSnapshot {
        self.open_timer.snapshot()
    }

    fn link(&mut self, peer: PeerId, id: SessionId) {
        let sessions = self.links.entry(peer).or_default();
        let first_link = sessions.is_empty();
        sessions.insert(id);
        self.linked_peer.insert(id, peer);

        if first_link {
            let watch = self.liveness.subscribe(&peer);
            let events = self.events.clone();
            let watcher = tokio::spawn(async move {
                watch.terminated().await;
                let _ = events.send(LifecycleEvent::PeerDown(peer));
            });
            self.watchers.insert(peer, watcher.abort_handle());
            tracing::debug!("Watching peer {}", peer);
        }
    }

    fn unlink(&mut self, id: &SessionId) {
        let Some(peer) = self.linked_peer.remove(id) else {
            return;
        };
        if let Some(sessions) = self.links.get_mut(&peer) {
            sessions.remove(id);
            if sessions.is_empty() {
                self.links.remove(&peer);
                self.stop_watching(&peer);
            }
        }
    }

    fn stop_watching(&mut self, peer: &PeerId) {
        if let Some(watcher) = self.watchers.remove(peer) {
            watcher.abort();
            tracing::debug!("Stopped watching peer {}", peer);
        }
    }

    async fn peer_down(&mut self, peer: PeerId) {
        self.watchers.remove(&peer);
        let Some(sessions) = self.links.remove(&peer) else {
            return;
        };
        tracing::info!(
            "Peer {} terminated, closing {} session(s)",
            peer,
            sessions.len()
        );

        for id in sessions {
            self.linked_peer.remove(&id);

            if let Ok(handle) = self.registry.lookup(&id) {
                if let Err(e) = handle.shutdown(CloseReason::PeerDown(peer)).await {
                    tracing::error!("Failed to close session {} after {} died: {}", id, peer, e);
                }
            }
            self.registry.unregister(&id);
        }
    }
}
