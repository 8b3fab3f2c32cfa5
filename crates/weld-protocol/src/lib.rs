//! Welding wire protocol types.
//!
//! Frame enums, error codes, and reserved method names for the resource
//! channel runtime. This crate is the single source of truth for everything
//! that crosses the WebSocket boundary or the session-pipeline boundary.

pub mod error;
pub mod frames;
pub mod methods;
pub mod session;

pub use error::{WeldError, WeldErrorCode};
pub use frames::{ClientFrame, ServerFrame};
pub use methods::{RESERVED_METHODS, is_reserved};
pub use session::{DEFAULT_SESSION_ROUTE, Session};
