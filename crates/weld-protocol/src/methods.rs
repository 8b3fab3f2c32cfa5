//! Reserved method names.
//!
//! These names are lifecycle hooks or wire events, never remote calls. The
//! dispatch binder filters them out of every resource's method table, so a
//! definition that declares one is silently not exposing it.

/// Method names that are never dispatchable to clients.
pub const RESERVED_METHODS: [&str; 5] = [
    "constructor",
    "init",
    "ready",
    "connection",
    "disconnection",
];

/// Whether `name` is in the reserved set.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_METHODS.contains(&name)
}
