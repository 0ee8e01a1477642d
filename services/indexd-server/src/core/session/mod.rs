//! Session lifecycle.
//!
//! - **SessionManager**: opens sessions and links them to peers
//! - **SessionRegistry**: identity → handle map
//! - **SessionHandle**: address of a running session actor

mod handle;
mod manager;
mod registry;

pub use handle::{CloseReason, SessionHandle, SessionInfo, SessionReply, SessionRequest};
pub use manager::{LifecycleEvent, SessionManager};
pub use registry::SessionRegistry;
