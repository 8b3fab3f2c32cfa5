//! Session bridge — resolves a connection's session through the host's
//! request pipeline.
//!
//! A long-lived connection has no session of its own; session state is only
//! computable by replaying the connection's handshake headers through
//! whatever session-establishing middleware the host runs for ordinary HTTP
//! requests. The bridge makes that replay look like a plain async lookup:
//! memoized per connection, single-flight while a resolution is in progress.

pub mod bridge;
pub mod pipeline;

pub use bridge::{SessionBridge, SessionBridgeConfig, SessionCell, SessionError};
pub use pipeline::{SessionPipeline, SessionRequest, SessionWriter};
