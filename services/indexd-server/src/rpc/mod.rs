//! RPC adapter
//!
//! Exposes the core over TCP as newline-delimited JSON. The node's
//! operations are served by the [`Dispatcher`] actor at the address
//! `"main"`; every open session is addressable by its identity.

pub mod command;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;
pub mod transport;

// Re-export main types
pub use command::Command;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::ServerError;
pub use server::RpcServer;
pub use service::{Dispatch, Router, Service, SessionService};
