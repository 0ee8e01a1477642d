//! Session handles and the per-session actor.
//!
//! Each open session owns a [`SessionIndex`] on a dedicated blocking
//! thread. Everything else talks to it through a cloneable
//! [`SessionHandle`] whose requests are processed one at a time.

use crate::core::config::SearchConfig;
use crate::core::error::{IndexdError, Result};
use crate::core::session::manager::LifecycleEvent;
use crate::core::session::registry::SessionRegistry;
use crate::core::storage::{directory_size, SearchHits, SessionIndex};
use crate::core::types::{PeerId, SessionId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};

/// Queued requests per session before callers wait
const MAILBOX_CAPACITY: usize = 256;

/// Requests a session understands
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    UpdateDocument {
        id: String,
        fields: BTreeMap<String, String>,
    },
    DeleteDocument {
        id: String,
    },
    Commit,
    Search {
        query: String,
        limit: Option<usize>,
    },
    Info,
    DiskSize,
    Close,
}

/// Successful outcome of a [`SessionRequest`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionReply {
    Ok,
    Search(SearchHits),
    Info(SessionInfo),
    DiskSize(u64),
}

/// Snapshot returned by `info`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub path: String,
    pub doc_count: u64,
    pub disk_size: u64,
    pub opened_at: DateTime<Utc>,
}

/// Why a session is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Requested,
    PeerDown(PeerId),
}

pub(crate) enum SessionMessage {
    Call {
        request: SessionRequest,
        reply: oneshot::Sender<Result<SessionReply>>,
    },
    Shutdown {
        reason: CloseReason,
        done: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable address of a running session
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    path: Arc<str>,
    sender: mpsc::Sender<SessionMessage>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Storage path the session was opened on, relative to the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Send a request and wait for its reply
    ///
    /// Fails with `SessionClosed` once the actor has stopped.
    pub async fn call(&self, request: SessionRequest) -> Result<SessionReply> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Call { request, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Ask the actor to close its index and stop
    pub async fn shutdown(&self, reason: CloseReason) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Shutdown { reason, done })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn closed(&self) -> IndexdError {
        IndexdError::SessionClosed(self.id.to_string())
    }

    /// Handle with no actor behind it
    #[cfg(test)]
    pub(crate) fn detached(id: SessionId, path: &str) -> Self {
        let (sender, _rx) = mpsc::channel(1);
        Self {
            id,
            path: Arc::from(path),
            sender,
        }
    }
}

/// Owner of one session's index
pub(crate) struct SessionActor {
    id: SessionId,
    path: String,
    dir: PathBuf,
    index: SessionIndex,
    registry: Weak<SessionRegistry>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    search: SearchConfig,
    opened_at: DateTime<Utc>,
}

impl SessionActor {
    pub(crate) fn new(
        id: SessionId,
        path: &str,
        dir: PathBuf,
        index: SessionIndex,
        registry: &Arc<SessionRegistry>,
        events: mpsc::UnboundedSender<LifecycleEvent>,
        search: SearchConfig,
    ) -> Self {
        Self {
            id,
            path: path.to_string(),
            dir,
            index,
            registry: Arc::downgrade(registry),
            events,
            search,
            opened_at: Utc::now(),
        }
    }

    /// Start the actor on the blocking pool and return its handle
    pub(crate) fn spawn(self) -> SessionHandle {
        let (sender, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let handle = SessionHandle {
            id: self.id,
            path: Arc::from(self.path.as_str()),
            sender,
        };
        tokio::task::spawn_blocking(move || self.run(rx));
        handle
    }

    fn run(mut self, mut rx: mpsc::Receiver<SessionMessage>) {
        while let Some(message) = rx.blocking_recv() {
            match message {
                SessionMessage::Call {
                    request: SessionRequest::Close,
                    reply,
                } => {
                    let result = self.teardown(CloseReason::Requested);
                    let _ = reply.send(result.map(|_| SessionReply::Ok));
                    return;
                }
                SessionMessage::Call { request, reply } => {
                    let _ = reply.send(self.handle(request));
                }
                SessionMessage::Shutdown { reason, done } => {
                    let _ = done.send(self.teardown(reason));
                    return;
                }
            }
        }

        // Every handle is gone: either registration was rejected or the
        // registry itself was dropped on shutdown.
        let id = self.id;
        match self.index.close() {
            Ok(()) => tracing::debug!("Released session {}", id),
            Err(e) => tracing::warn!("Released session {} failed to close: {}", id, e),
        }
    }

    fn handle(&mut self, request: SessionRequest) -> Result<SessionReply> {
        match request {
            SessionRequest::UpdateDocument { id, fields } => {
                self.index.update_document(&id, &fields)?;
                Ok(SessionReply::Ok)
            }
            SessionRequest::DeleteDocument { id } => {
                self.index.delete_document(&id);
                Ok(SessionReply::Ok)
            }
            SessionRequest::Commit => {
                self.index.commit()?;
                Ok(SessionReply::Ok)
            }
            SessionRequest::Search { query, limit } => {
                let limit = limit
                    .unwrap_or(self.search.default_limit)
                    .min(self.search.max_limit)
                    .max(1);
                Ok(SessionReply::Search(self.index.search(&query, limit)?))
            }
            SessionRequest::Info => Ok(SessionReply::Info(SessionInfo {
                path: self.path.clone(),
                doc_count: self.index.doc_count(),
                disk_size: directory_size(&self.dir),
                opened_at: self.opened_at,
            })),
            SessionRequest::DiskSize => Ok(SessionReply::DiskSize(directory_size(&self.dir))),
            SessionRequest::Close => Err(IndexdError::InvalidRequest(
                "close is handled by the session loop".to_string(),
            )),
        }
    }

    /// Close the index, leave the registry and tell the manager
    fn teardown(self, reason: CloseReason) -> Result<()> {
        let SessionActor {
            id,
            path,
            index,
            registry,
            events,
            ..
        } = self;

        let result = index.close();
        match &result {
            Ok(()) => tracing::info!("Closed session {} at {} ({:?})", id, path, reason),
            Err(e) => tracing::error!("Session {} at {} failed to close: {}", id, path, e),
        }

        if let Some(registry) = registry.upgrade() {
            registry.unregister(&id);
        }
        let _ = events.send(LifecycleEvent::SessionClosed(id));

        result
    }
}
