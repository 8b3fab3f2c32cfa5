//! Weld transport layer.
//!
//! WebSocket transport for the resource channel runtime. The transport
//! handles:
//! - Connection lifecycle (upgrade, message, close)
//! - Header capture at connect time (the session bridge replays these)
//! - Per-connection outbound queue for targeted sends and broadcasts
//! - Frame parsing; unparseable input is answered with an `error` frame
//!
//! The transport is decoupled from the runtime logic via the `SparkHandler`
//! trait.

pub mod server;

pub use server::{SparkHandler, SparkSender, TransportConfig, TransportServer};
