//! The node's main actor.
//!
//! [`Dispatcher`] owns the [`SessionManager`] and serves the node-level
//! operations (`open`, `disk_size`, `get_root_dir`, `version`). Calls
//! arrive through a bounded mailbox and are handled one at a time,
//! interleaved with lifecycle events from the manager.

use crate::core::error::IndexdError;
use crate::core::services::Services;
use crate::core::session::{LifecycleEvent, SessionManager};
use crate::core::types::PeerId;
use crate::rpc::command::Command;
use crate::rpc::error::ServerError;
use crate::rpc::protocol::{self, MAIN_SERVICE};
use crate::rpc::service::{Dispatch, Service};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const MAILBOX_CAPACITY: usize = 1024;

struct Call {
    from: PeerId,
    request: Value,
    reply: oneshot::Sender<Dispatch>,
}

pub struct Dispatcher {
    manager: SessionManager,
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl Dispatcher {
    pub fn new(services: &Services) -> Self {
        let (manager, events) = SessionManager::new(services);
        Self { manager, events }
    }

    /// Dispatcher whose sessions take identities from `issue_id`
    #[cfg(test)]
    pub(crate) fn with_id_source(
        services: &Services,
        issue_id: fn() -> crate::core::types::SessionId,
    ) -> Self {
        let (manager, events) = SessionManager::new(services);
        Self {
            manager: manager.with_id_source(issue_id),
            events,
        }
    }

    /// Handle one request
    ///
    /// Unknown shapes are reported as [`Dispatch::Unhandled`]. A fatal
    /// error is returned as `Err` after its error reply has been built,
    /// and the caller must stop dispatching.
    pub async fn dispatch(
        &mut self,
        from: PeerId,
        request: &Value,
    ) -> Result<Dispatch, (Dispatch, ServerError)> {
        let command = match Command::decode(request) {
            Ok(Some(command)) => command,
            Ok(None) => {
                tracing::warn!("Unhandled request from {}: {}", from, request);
                return Ok(Dispatch::Unhandled);
            }
            Err(e) => return Ok(Dispatch::Reply(protocol::error_from(&e))),
        };

        match self.execute(command).await {
            Ok(reply) => Ok(Dispatch::Reply(reply)),
            Err(e) if e.is_fatal() => {
                tracing::error!("Invariant violated, stopping dispatcher: {}", e);
                Err((
                    Dispatch::Reply(protocol::error_from(&e)),
                    ServerError::Fatal(e),
                ))
            }
            Err(e) => {
                tracing::warn!("Request from {} failed: {}", from, e);
                Ok(Dispatch::Reply(protocol::error_from(&e)))
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Value, IndexdError> {
        match command {
            Command::Open {
                peer,
                path,
                analyzer,
            } => {
                let id = self.manager.open(peer, &path, &analyzer).await?;
                Ok(protocol::ok(json!(id.to_string())))
            }
            Command::DiskSize { path } => Ok(protocol::disk_size(self.manager.disk_size(&path))),
            Command::GetRootDir => Ok(protocol::ok(json!(self
                .manager
                .root_dir()
                .to_string_lossy()))),
            Command::Version => Ok(protocol::ok(json!(env!("CARGO_PKG_VERSION")))),
        }
    }

    /// Run as an actor until every handle is dropped or a fatal error
    pub fn spawn(self) -> (DispatcherHandle, JoinHandle<Result<(), ServerError>>) {
        let (sender, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        let task = tokio::spawn(self.run(mailbox));
        (DispatcherHandle { sender }, task)
    }

    async fn run(mut self, mut mailbox: mpsc::Receiver<Call>) -> Result<(), ServerError> {
        tracing::info!("Dispatcher started");

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.manager.handle_event(event).await;
                }
                call = mailbox.recv() => {
                    let Some(Call { from, request, reply }) = call else {
                        break;
                    };
                    match self.dispatch(from, &request).await {
                        Ok(outcome) => {
                            let _ = reply.send(outcome);
                        }
                        Err((outcome, e)) => {
                            let _ = reply.send(outcome);
                            return Err(e);
                        }
                    }
                }
            }
        }

        tracing::info!("Dispatcher stopped");
        Ok(())
    }
}

/// Mailbox address of a running [`Dispatcher`]
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<Call>,
}

#[async_trait]
impl Service for DispatcherHandle {
    fn name(&self) -> String {
        MAIN_SERVICE.to_string()
    }

    async fn call(&self, from: PeerId, request: Value) -> Result<Dispatch, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Call {
                from,
                request,
                reply,
            })
            .await
            .map_err(|_| ServerError::DispatcherGone)?;
        rx.await.map_err(|_| ServerError::DispatcherGone)
    }
}
