//! Request decoding.
//!
//! Requests are either a bare operation name (`"version"`) or an array
//! whose first element names the operation (`["disk_size", path]`).
//! Decoding yields `Ok(None)` when the shape matches no operation, and
//! `InvalidRequest` when it does but the arguments have the wrong types.

use crate::core::error::{IndexdError, Result};
use crate::core::session::SessionRequest;
use crate::core::types::PeerId;
use serde_json::Value;
use std::collections::BTreeMap;

/// Operations served by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open {
        peer: PeerId,
        path: String,
        analyzer: Value,
    },
    DiskSize {
        path: String,
    },
    GetRootDir,
    Version,
}

impl Command {
    pub fn decode(request: &Value) -> Result<Option<Self>> {
        match request {
            Value::String(op) => Ok(match op.as_str() {
                "get_root_dir" => Some(Command::GetRootDir),
                "version" => Some(Command::Version),
                _ => None,
            }),
            Value::Array(items) => match (operation(items), items.len()) {
                (Some("open"), 4) => Ok(Some(Command::Open {
                    peer: string_arg(items, 1, "peer")?
                        .parse()
                        .map_err(IndexdError::InvalidRequest)?,
                    path: string_arg(items, 2, "path")?.to_string(),
                    analyzer: items[3].clone(),
                })),
                (Some("disk_size"), 2) => Ok(Some(Command::DiskSize {
                    path: string_arg(items, 1, "path")?.to_string(),
                })),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

/// Decode a request addressed to a session
pub fn decode_session_request(request: &Value) -> Result<Option<SessionRequest>> {
    match request {
        Value::String(op) => Ok(match op.as_str() {
            "commit" => Some(SessionRequest::Commit),
            "info" => Some(SessionRequest::Info),
            "disk_size" => Some(SessionRequest::DiskSize),
            "close" => Some(SessionRequest::Close),
            _ => None,
        }),
        Value::Array(items) => match (operation(items), items.len()) {
            (Some("update_document"), 3) => Ok(Some(SessionRequest::UpdateDocument {
                id: string_arg(items, 1, "id")?.to_string(),
                fields: fields_arg(&items[2])?,
            })),
            (Some("delete_document"), 2) => Ok(Some(SessionRequest::DeleteDocument {
                id: string_arg(items, 1, "id")?.to_string(),
            })),
            (Some("search"), 2 | 3) => Ok(Some(SessionRequest::Search {
                query: string_arg(items, 1, "query")?.to_string(),
                limit: limit_arg(items.get(2))?,
            })),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

fn operation(items: &[Value]) -> Option<&str> {
    items.first().and_then(Value::as_str)
}

fn string_arg<'a>(items: &'a [Value], index: usize, name: &str) -> Result<&'a str> {
    items
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| IndexdError::InvalidRequest(format!("{name} must be a string")))
}

fn fields_arg(value: &Value) -> Result<BTreeMap<String, String>> {
    let Value::Object(map) = value else {
        return Err(IndexdError::InvalidRequest(
            "fields must be an object".to_string(),
        ));
    };

    map.iter()
        .map(|(name, value)| match value {
            Value::String(text) => Ok((name.clone(), text.clone())),
            Value::Number(n) => Ok((name.clone(), n.to_string())),
            Value::Bool(b) => Ok((name.clone(), b.to_string())),
            other => Err(IndexdError::InvalidRequest(format!(
                "field {name} must be text, got {other}"
            ))),
        })
        .collect()
}

fn limit_arg(value: Option<&Value>) -> Result<Option<usize>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| IndexdError::InvalidRequest(format!("limit must be a count, got {v}"))),
    }
}
