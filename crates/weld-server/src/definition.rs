//! Resource definitions — the application boundary.
//!
//! A definition declares its callable surface as an explicit method table
//! rather than being reflected over: name → async handler, in declaration
//! order. Handlers receive the calling connection as an explicit
//! [`CallContext`] first argument, so a method body can read the session or
//! broadcast without any implicit receiver.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use weld_protocol::WeldError;

use crate::resource::CallContext;

/// Outcome of a dispatched method. Success carries no payload — calls are
/// fire-and-forget; replies go out as events via the context.
pub type MethodResult = Result<(), WeldError>;

pub(crate) type MethodFuture = Pin<Box<dyn Future<Output = MethodResult> + Send>>;

/// A registered method handler.
pub(crate) type MethodHandler =
    Arc<dyn Fn(CallContext, Vec<Value>) -> MethodFuture + Send + Sync>;

/// Declaration-ordered table of a definition's methods.
#[derive(Default)]
pub struct MethodTable {
    entries: Vec<(String, MethodHandler)>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method. Reserved names are accepted here and filtered at
    /// bind time; duplicate names are rejected at bind time.
    pub fn method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |ctx, args| Box::pin(handler(ctx, args)));
        self.entries.push((name.into(), handler));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, MethodHandler)> {
        self.entries
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Trait implemented by application-supplied resource definitions.
///
/// `methods` is materialized on every connection join; a misdeclared table
/// (duplicate names) fails that join loudly instead of failing at first call.
pub trait ResourceDefinition: Send + Sync + 'static {
    fn methods(&self) -> MethodTable;
}
