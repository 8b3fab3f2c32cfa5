//! The bridge itself: per-connection memoization and single-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use weld_protocol::{DEFAULT_SESSION_ROUTE, Session, WeldError};

use crate::pipeline::{SessionPipeline, SessionRequest, SessionWriter};

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct SessionBridgeConfig {
    /// Internal path carried by synthetic requests. The host must mount its
    /// session middleware at this route.
    pub route_path: String,
    /// Deadline for the host to invoke the completion hook. `None` waits
    /// forever, matching hosts that are trusted to always answer.
    pub timeout: Option<Duration>,
}

impl Default for SessionBridgeConfig {
    fn default() -> Self {
        Self {
            route_path: DEFAULT_SESSION_ROUTE.into(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session resolution timed out after {0:?}")]
    ResolutionTimeout(Duration),
    #[error("session pipeline dropped the request without writing a session")]
    PipelineClosed,
}

impl From<SessionError> for WeldError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ResolutionTimeout(_) => WeldError::session_timeout(err.to_string()),
            SessionError::PipelineClosed => WeldError::session_unavailable(err.to_string()),
        }
    }
}

/// Per-connection session state: Unresolved → Resolving → Resolved. A
/// successful resolution is final; a failed one returns to Unresolved so a
/// later caller may retry.
enum CellState {
    Unresolved,
    Resolving(Vec<oneshot::Sender<Result<Session, SessionError>>>),
    Resolved(Session),
}

/// One connection's session slot. Lives on the connection object and is
/// shared with any in-flight resolution, so a completion that arrives after
/// the connection is gone lands here harmlessly.
pub struct SessionCell {
    state: Mutex<CellState>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState::Unresolved),
        }
    }

    /// The memoized session, if resolution has completed.
    pub fn resolved(&self) -> Option<Session> {
        match &*self.state.lock() {
            CellState::Resolved(session) => Some(session.clone()),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.state.lock(), CellState::Resolved(_))
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets a cell stuck in Resolving if the leading caller is dropped before
/// completing. Waiters see their senders dropped and fail with
/// `PipelineClosed` instead of hanging on a cell nobody is driving.
struct ResolveGuard<'a> {
    cell: &'a SessionCell,
    armed: bool,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.cell.state.lock();
            if matches!(*state, CellState::Resolving(_)) {
                *state = CellState::Unresolved;
            }
        }
    }
}

/// Bridges connections to the host request pipeline.
pub struct SessionBridge {
    pipeline: Arc<dyn SessionPipeline>,
    config: SessionBridgeConfig,
}

impl SessionBridge {
    pub fn new(pipeline: Arc<dyn SessionPipeline>, config: SessionBridgeConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn config(&self) -> &SessionBridgeConfig {
        &self.config
    }

    /// Resolve the session for the connection owning `cell`.
    ///
    /// Memoized: a resolved cell completes immediately with no pipeline
    /// submission. Single-flight: while a resolution is in progress, callers
    /// join it rather than triggering a second replay, and every joined
    /// caller observes the same outcome.
    pub async fn get_session(
        &self,
        cell: &SessionCell,
        headers: &HashMap<String, String>,
    ) -> Result<Session, SessionError> {
        // Memoized / join-in-flight / become the leader, under one lock.
        let joined_rx = {
            let mut state = cell.state.lock();
            match &mut *state {
                CellState::Resolved(session) => {
                    debug!("Returning memoized session");
                    return Ok(session.clone());
                }
                CellState::Resolving(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                CellState::Unresolved => {
                    *state = CellState::Resolving(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = joined_rx {
            return rx.await.unwrap_or(Err(SessionError::PipelineClosed));
        }

        // Leader path: exactly one synthetic request per resolution.
        let mut guard = ResolveGuard { cell, armed: true };

        let request = SessionRequest::new(self.config.route_path.clone(), headers.clone());
        let (writer, rx) = SessionWriter::channel();
        debug!(path = %request.path, "Submitting synthetic session request");
        self.pipeline.submit(request, writer);

        let outcome = match self.config.timeout {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(session)) => Ok(session),
                Ok(Err(_)) => Err(SessionError::PipelineClosed),
                Err(_) => Err(SessionError::ResolutionTimeout(deadline)),
            },
            None => rx.await.map_err(|_| SessionError::PipelineClosed),
        };

        // Transition the cell and collect everyone who joined mid-flight.
        let waiters = {
            let mut state = cell.state.lock();
            let waiters = match std::mem::replace(&mut *state, CellState::Unresolved) {
                CellState::Resolving(waiters) => waiters,
                other => {
                    // Only the leader transitions out of Resolving.
                    *state = other;
                    Vec::new()
                }
            };
            if let Ok(session) = &outcome {
                debug!("Session resolved");
                *state = CellState::Resolved(session.clone());
            } else {
                warn!("Session resolution failed: {:?}", outcome.as_ref().err());
            }
            waiters
        };
        guard.armed = false;

        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        outcome
    }
}
