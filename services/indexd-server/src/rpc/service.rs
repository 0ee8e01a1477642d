//! Addressable services and envelope routing.

use crate::core::session::{SessionHandle, SessionRegistry, SessionReply};
use crate::core::types::{PeerId, SessionId};
use crate::rpc::command::decode_session_request;
use crate::rpc::dispatcher::DispatcherHandle;
use crate::rpc::error::ServerError;
use crate::rpc::protocol::{self, MAIN_SERVICE};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Outcome of delivering one request
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Send this value back to the caller
    Reply(Value),
    /// The request matched no operation; nothing is sent back
    Unhandled,
}

/// Something an envelope can be addressed to
#[async_trait]
pub trait Service: Send + Sync {
    /// Address used in the envelope's `to` field
    fn name(&self) -> String;

    async fn call(&self, from: PeerId, request: Value) -> Result<Dispatch, ServerError>;
}

/// Adapter exposing a session handle on the wire
pub struct SessionService {
    handle: SessionHandle,
}

impl SessionService {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Service for SessionService {
    fn name(&self) -> String {
        self.handle.id().to_string()
    }

    async fn call(&self, from: PeerId, request: Value) -> Result<Dispatch, ServerError> {
        let request = match decode_session_request(&request) {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::warn!(
                    "Unhandled request to {} from {}: {}",
                    self.name(),
                    from,
                    request
                );
                return Ok(Dispatch::Unhandled);
            }
            Err(e) => return Ok(Dispatch::Reply(protocol::error_from(&e))),
        };

        let reply = match self.handle.call(request).await {
            Ok(SessionReply::Ok) => protocol::ok_atom(),
            Ok(SessionReply::Search(hits)) => protocol::ok(json!(hits)),
            Ok(SessionReply::Info(info)) => protocol::ok(json!(info)),
            Ok(SessionReply::DiskSize(bytes)) => protocol::disk_size(bytes),
            Err(e) => protocol::error_from(&e),
        };
        Ok(Dispatch::Reply(reply))
    }
}

/// Delivers envelopes to the dispatcher or to a session
#[derive(Clone)]
pub struct Router {
    main: DispatcherHandle,
    registry: Arc<SessionRegistry>,
}

impl Router {
    pub fn new(main: DispatcherHandle, registry: Arc<SessionRegistry>) -> Self {
        Self { main, registry }
    }

    /// Find the service behind an address
    pub fn resolve(&self, to: &str) -> Option<Box<dyn Service>> {
        if to == MAIN_SERVICE {
            return Some(Box::new(self.main.clone()));
        }

        let id: SessionId = to.parse().ok()?;
        let handle = self.registry.lookup(&id).ok()?;
        Some(Box::new(SessionService::new(handle)))
    }

    pub async fn route(&self, from: PeerId, to: &str, request: Value) -> Result<Dispatch, ServerError> {
        match self.resolve(to) {
            Some(service) => service.call(from, request).await,
            None => Ok(Dispatch::Reply(protocol::error_reply(
                "session_not_found",
                to,
            ))),
        }
    }
}
