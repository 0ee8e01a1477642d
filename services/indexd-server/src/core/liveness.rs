//! Peer liveness monitoring.
//!
//! Sessions are linked to the peer that opened them. The lifecycle
//! manager subscribes to a peer through [`LivenessMonitor`] and tears
//! the linked sessions down once the returned [`PeerWatch`] resolves.
//!
//! [`PeerTable`] is the in-process monitor used by the rpc server:
//! every connection registers a peer and the peer terminates when the
//! registration is dropped.

use crate::core::types::PeerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Source of peer termination notifications
pub trait LivenessMonitor: Send + Sync {
    /// Watch `peer`; an unknown or already terminated peer yields a
    /// watch that resolves immediately.
    fn subscribe(&self, peer: &PeerId) -> PeerWatch;
}

/// Resolves once the watched peer has terminated
pub struct PeerWatch {
    rx: watch::Receiver<()>,
}

impl PeerWatch {
    pub async fn terminated(mut self) {
        // Nothing is ever sent; the channel only closes.
        while self.rx.changed().await.is_ok() {}
    }
}

/// In-process table of live peers
#[derive(Default)]
pub struct PeerTable {
    peers: Mutex<HashMap<PeerId, watch::Sender<()>>>,
}

impl PeerTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new live peer; it terminates when the registration drops
    pub fn register(self: &Arc<Self>) -> PeerRegistration {
        let id = PeerId::next();
        let (tx, _rx) = watch::channel(());
        self.lock().insert(id, tx);
        tracing::debug!("Peer {} registered", id);

        PeerRegistration {
            id,
            table: Arc::clone(self),
        }
    }

    /// Terminate a peer, notifying every watcher. Returns false if it was
    /// not alive.
    pub fn terminate(&self, peer: &PeerId) -> bool {
        let removed = self.lock().remove(peer).is_some();
        if removed {
            tracing::debug!("Peer {} terminated", peer);
        }
        removed
    }

    pub fn is_alive(&self, peer: &PeerId) -> bool {
        self.lock().contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PeerId, watch::Sender<()>>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LivenessMonitor for PeerTable {
    fn subscribe(&self, peer: &PeerId) -> PeerWatch {
        match self.lock().get(peer) {
            Some(tx) => PeerWatch { rx: tx.subscribe() },
            None => {
                let (_tx, rx) = watch::channel(());
                PeerWatch { rx }
            }
        }
    }
}

/// Keeps a peer alive for as long as it is held
pub struct PeerRegistration {
    id: PeerId,
    table: Arc<PeerTable>,
}

impl PeerRegistration {
    pub fn id(&self) -> PeerId {
        self.id
    }
}

impl Drop for PeerRegistration {
    fn drop(&mut self) {
        self.table.terminate(&self.id);
    }
}
