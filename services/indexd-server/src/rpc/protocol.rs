//! Wire format.
//!
//! One JSON value per line. The server greets every connection with
//! [`Greeting`], then answers each [`Envelope`] with a
//! [`ReplyEnvelope`] carrying the same id. An envelope without an id is
//! a cast and is never answered.

use crate::core::error::IndexdError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Address of the node's dispatcher
pub const MAIN_SERVICE: &str = "main";

/// First line sent on every connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    pub peer: String,
}

/// Request line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub to: String,
    pub request: Value,
}

/// Reply line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: Value,
    pub reply: Value,
}

/// `["ok", value]`
pub fn ok(value: Value) -> Value {
    json!(["ok", value])
}

/// Bare `"ok"`
pub fn ok_atom() -> Value {
    json!("ok")
}

/// `["ok", [["disk_size", bytes]]]`
pub fn disk_size(bytes: u64) -> Value {
    ok(json!([["disk_size", bytes]]))
}

/// `["error", [kind, message]]`
pub fn error_reply(kind: &str, message: &str) -> Value {
    json!(["error", [kind, message]])
}

/// Error reply for a core error
///
/// Missing sessions carry just the identity as their message.
pub fn error_from(err: &IndexdError) -> Value {
    match err {
        IndexdError::SessionNotFound(id) | IndexdError::SessionClosed(id) => {
            error_reply("session_not_found", id)
        }
        other => error_reply(other.kind(), &other.message()),
    }
}
