//! Spark — one long-lived client connection.

use std::collections::HashMap;

use parking_lot::RwLock;
use weld_protocol::ServerFrame;
use weld_session::SessionCell;
use weld_transport::SparkSender;

use crate::definition::MethodHandler;

/// Opaque connection id, assigned by the transport layer.
pub type SparkId = String;

/// Methods installed on a spark for one joined resource.
pub(crate) struct BoundMethods {
    /// Bound names in declaration order, as announced in `ready`.
    pub names: Vec<String>,
    pub handlers: HashMap<String, MethodHandler>,
}

pub(crate) enum MethodLookup {
    NotJoined,
    NotFound,
    Found(MethodHandler),
}

/// One connected client. Created on transport connect, dropped on
/// disconnect. Holds the connect-time headers, the outbound send handle, the
/// session cell (resolved at most once, then immutable), and the method
/// tables installed per joined resource.
pub struct Spark {
    id: SparkId,
    headers: HashMap<String, String>,
    sender: SparkSender,
    session: SessionCell,
    bindings: RwLock<HashMap<String, BoundMethods>>,
}

impl Spark {
    pub fn new(id: SparkId, headers: HashMap<String, String>, sender: SparkSender) -> Self {
        Self {
            id,
            headers,
            sender,
            session: SessionCell::new(),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn session_cell(&self) -> &SessionCell {
        &self.session
    }

    /// Queue a frame for this connection. Best-effort: a closing connection
    /// swallows the frame.
    pub fn send(&self, frame: ServerFrame) {
        self.sender.send(frame);
    }

    /// Resources this spark currently has method tables for.
    pub fn joined_resources(&self) -> Vec<String> {
        self.bindings.read().keys().cloned().collect()
    }

    pub(crate) fn install_bindings(&self, resource: String, bound: BoundMethods) {
        self.bindings.write().insert(resource, bound);
    }

    pub(crate) fn uninstall_bindings(&self, resource: &str) {
        self.bindings.write().remove(resource);
    }

    pub(crate) fn lookup_method(&self, resource: &str, method: &str) -> MethodLookup {
        let bindings = self.bindings.read();
        match bindings.get(resource) {
            None => MethodLookup::NotJoined,
            Some(bound) => match bound.handlers.get(method) {
                Some(handler) => MethodLookup::Found(handler.clone()),
                None => MethodLookup::NotFound,
            },
        }
    }
}

impl std::fmt::Debug for Spark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spark")
            .field("id", &self.id)
            .field("joined", &self.joined_resources())
            .finish_non_exhaustive()
    }
}
