//! WebSocket frame types.
//!
//! One socket multiplexes every resource a client has joined, so each frame
//! names the resource it targets. Frames are JSON text, tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WeldError;

/// Frames sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Join a resource's channel group. The server answers with `ready`.
    Join { resource: String },
    /// Leave a resource's channel group.
    Leave { resource: String },
    /// Invoke a bound method. Fire-and-forget: success produces no reply,
    /// failure produces an `error` frame.
    Call {
        resource: String,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

/// Frames sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Sent once per join, before any dispatch, listing the callable
    /// (non-reserved) method names in declaration order.
    Ready { resource: String, methods: Vec<String> },
    /// A resource broadcast, or a targeted send from a method body.
    Event {
        resource: String,
        event: String,
        args: Vec<Value>,
    },
    /// A dispatch or protocol failure. `resource` is absent for failures
    /// that cannot be attributed to one (e.g. unparseable input).
    Error {
        resource: Option<String>,
        error: WeldError,
    },
}

impl ServerFrame {
    pub fn ready(resource: impl Into<String>, methods: Vec<String>) -> Self {
        Self::Ready {
            resource: resource.into(),
            methods,
        }
    }

    pub fn event(resource: impl Into<String>, event: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            resource: resource.into(),
            event: event.into(),
            args,
        }
    }

    pub fn error(resource: Option<String>, error: WeldError) -> Self {
        Self::Error { resource, error }
    }
}
