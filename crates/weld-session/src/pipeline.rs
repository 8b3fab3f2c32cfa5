//! Host request-pipeline boundary.

use std::collections::HashMap;

use tokio::sync::oneshot;
use weld_protocol::Session;

/// Synthetic request submitted to the host pipeline.
///
/// Carries the connection's connect-time headers under the configured
/// internal route, exactly as if a client had made an HTTP call to that
/// path. The host is expected to run its session middleware against it.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Always `"GET"`.
    pub method: &'static str,
    /// The internal route the host mounts its session middleware at.
    pub path: String,
    /// Headers captured when the connection was established.
    pub headers: HashMap<String, String>,
}

impl SessionRequest {
    pub fn new(path: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            method: "GET",
            path: path.into(),
            headers,
        }
    }
}

/// Completion hook paired with a [`SessionRequest`].
///
/// The host invokes [`write_session`](Self::write_session) exactly once with
/// the resolved session (an empty object if no session exists). Dropping the
/// writer without writing fails the resolution with
/// [`SessionError::PipelineClosed`](crate::SessionError::PipelineClosed).
pub struct SessionWriter {
    tx: oneshot::Sender<Session>,
}

impl SessionWriter {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Session>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Deliver the resolved session. Consumes the writer; a second write is
    /// unrepresentable.
    pub fn write_session(self, session: Session) {
        // The receiver is gone only if the resolution already timed out.
        let _ = self.tx.send(session);
    }
}

impl std::fmt::Debug for SessionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWriter").finish_non_exhaustive()
    }
}

/// The host request pipeline's entry point.
///
/// Submission is synchronous; the host may complete the writer inline or
/// from a spawned task. The bridge never submits more than one request per
/// connection at a time.
pub trait SessionPipeline: Send + Sync + 'static {
    fn submit(&self, request: SessionRequest, writer: SessionWriter);
}
