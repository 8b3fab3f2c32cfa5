//! Resource — a named capability object bound 1:1 to a channel group.
//!
//! Includes the dispatch binder: on every join it materializes the
//! definition's method table, filters the reserved set, installs the bound
//! table on the spark, and announces the callable surface with `ready`
//! before the spark is admitted to the group.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use weld_protocol::{ServerFrame, Session, WeldError, is_reserved};
use weld_session::{SessionBridge, SessionError};

use crate::definition::ResourceDefinition;
use crate::group::ChannelGroup;
use crate::spark::{BoundMethods, Spark};

/// A named, remotely addressable object. Created once per name by the
/// registry and never destroyed; its channel group is created with it and
/// never re-bound.
pub struct Resource {
    name: String,
    definition: Arc<dyn ResourceDefinition>,
    group: Arc<ChannelGroup>,
    bridge: Arc<SessionBridge>,
}

impl Resource {
    pub(crate) fn new(
        name: String,
        definition: Arc<dyn ResourceDefinition>,
        bridge: Arc<SessionBridge>,
    ) -> Arc<Self> {
        let group = Arc::new(ChannelGroup::new(name.clone()));
        Arc::new(Self {
            name,
            definition,
            group,
            bridge,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &Arc<ChannelGroup> {
        &self.group
    }

    /// Broadcast `event` to every connection currently in the group.
    pub fn broadcast(&self, event: &str, args: Vec<Value>) {
        self.group.broadcast(event, args);
    }

    /// Dispatch binder. Builds the spark's callable-method table from the
    /// definition, excluding reserved names; duplicate names are a
    /// `BindingFailure`. Returns the bound names in declaration order.
    fn bind(&self, spark: &Arc<Spark>) -> Result<Vec<String>, WeldError> {
        let table = self.definition.methods();
        let mut names = Vec::with_capacity(table.len());
        let mut handlers = HashMap::with_capacity(table.len());

        for (name, handler) in table.into_entries() {
            if is_reserved(&name) {
                debug!("Skipping reserved method `{name}` on resource `{}`", self.name);
                continue;
            }
            if handlers.insert(name.clone(), handler).is_some() {
                return Err(WeldError::binding_failure(format!(
                    "duplicate method `{name}` on resource `{}`",
                    self.name
                )));
            }
            names.push(name);
        }

        spark.install_bindings(
            self.name.clone(),
            BoundMethods {
                names: names.clone(),
                handlers,
            },
        );
        Ok(names)
    }

    /// Admit a spark: bind, announce `ready`, then join the group. A binding
    /// failure aborts admission — the spark never enters the group. Joining
    /// while already a member rebinds and re-announces but does not duplicate
    /// membership.
    pub fn join(self: &Arc<Self>, spark: &Arc<Spark>) -> Result<(), WeldError> {
        let methods = self.bind(spark)?;
        debug!(
            "Spark {} joined resource `{}` ({} methods)",
            spark.id(),
            self.name,
            methods.len()
        );
        spark.send(ServerFrame::ready(self.name.clone(), methods));
        self.group.add(spark.clone());
        Ok(())
    }

    /// Remove a spark from the group and drop its bound table. Leaving a
    /// resource that was never joined is a no-op.
    pub fn leave(&self, spark: &Arc<Spark>) {
        self.group.remove(spark.id());
        spark.uninstall_bindings(&self.name);
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("members", &self.group.len())
            .finish_non_exhaustive()
    }
}

/// Per-call context handed to method handlers as their first argument.
/// Exposes the calling spark and the resource the method was invoked
/// through.
#[derive(Clone)]
pub struct CallContext {
    pub(crate) spark: Arc<Spark>,
    pub(crate) resource: Arc<Resource>,
}

impl CallContext {
    pub fn spark_id(&self) -> &str {
        self.spark.id()
    }

    pub fn resource_name(&self) -> &str {
        self.resource.name()
    }

    /// The calling connection's connect-time headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        self.spark.headers()
    }

    /// Send an event to the calling connection only.
    pub fn send(&self, event: &str, args: Vec<Value>) {
        self.spark.send(ServerFrame::event(
            self.resource.name().to_string(),
            event,
            args,
        ));
    }

    /// Broadcast an event to the resource's whole channel group.
    pub fn broadcast(&self, event: &str, args: Vec<Value>) {
        self.resource.broadcast(event, args);
    }

    /// Resolve the calling connection's session via the session bridge.
    /// Memoized after the first successful resolution.
    pub async fn session(&self) -> Result<Session, SessionError> {
        self.resource
            .bridge
            .get_session(self.spark.session_cell(), self.spark.headers())
            .await
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("spark", &self.spark.id())
            .field("resource", &self.resource.name())
            .finish()
    }
}
