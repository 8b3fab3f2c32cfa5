//! Weld resource channel runtime.
//!
//! Turns named server-side objects ("resources") into addressable groups of
//! connections: per-connection method dispatch, group broadcast, and a
//! session bridge that resolves each connection's session through the host's
//! request pipeline. The router at the top implements the transport's
//! `SparkHandler` trait; everything below it is transport-agnostic.

pub mod definition;
pub mod group;
pub mod registry;
pub mod resource;
pub mod router;
pub mod spark;

pub use definition::{MethodResult, MethodTable, ResourceDefinition};
pub use group::ChannelGroup;
pub use registry::ResourceRegistry;
pub use resource::{CallContext, Resource};
pub use router::WeldServer;
pub use spark::{Spark, SparkId};
