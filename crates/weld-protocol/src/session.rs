//! Session value type and the internal session route.

/// A connection's session, exactly as the host pipeline produced it. The
/// runtime relays it without imposing a schema; an empty object is the
/// conventional "no session" value.
pub type Session = serde_json::Value;

/// Default internal path carried by synthetic session-resolution requests.
/// Hosts mount their session-establishing middleware at this route.
/// Configurable at startup in case of a conflict.
pub const DEFAULT_SESSION_ROUTE: &str = "/welding/write-session";
