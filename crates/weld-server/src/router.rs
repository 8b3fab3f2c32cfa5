//! Weld server router — connects the transport to the resource runtime.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};
use weld_protocol::{ClientFrame, ServerFrame, WeldError};
use weld_transport::{SparkHandler, SparkSender};

use crate::registry::ResourceRegistry;
use crate::resource::CallContext;
use crate::spark::{MethodLookup, Spark, SparkId};

/// The weld server — owns the live spark map and routes transport events to
/// resources. Implements the transport's `SparkHandler`.
pub struct WeldServer {
    registry: Arc<ResourceRegistry>,
    sparks: RwLock<HashMap<SparkId, Arc<Spark>>>,
}

impl WeldServer {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self {
            registry,
            sparks: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn spark_count(&self) -> usize {
        self.sparks.read().len()
    }

    pub fn spark(&self, id: &str) -> Option<Arc<Spark>> {
        self.sparks.read().get(id).cloned()
    }

    fn handle_join(&self, spark: &Arc<Spark>, resource_name: String) {
        match self.registry.get(&resource_name) {
            Some(resource) => {
                if let Err(err) = resource.join(spark) {
                    warn!(
                        "Binding failed for spark {} on resource `{resource_name}`: {err}",
                        spark.id()
                    );
                    spark.send(ServerFrame::error(Some(resource_name), err));
                }
            }
            None => {
                spark.send(ServerFrame::error(
                    Some(resource_name.clone()),
                    WeldError::unknown_resource(&resource_name),
                ));
            }
        }
    }

    fn handle_leave(&self, spark: &Arc<Spark>, resource_name: &str) {
        if let Some(resource) = self.registry.get(resource_name) {
            resource.leave(spark);
            debug!("Spark {} left resource `{resource_name}`", spark.id());
        }
    }

    /// Dispatch a call to the spark's bound table for the resource. The
    /// handler runs on its own task so a suspended session resolution never
    /// blocks this connection's inbound loop.
    fn handle_call(
        &self,
        spark: Arc<Spark>,
        resource_name: String,
        method: String,
        args: Vec<Value>,
    ) {
        let handler = match spark.lookup_method(&resource_name, &method) {
            MethodLookup::Found(handler) => handler,
            MethodLookup::NotJoined => {
                spark.send(ServerFrame::error(
                    Some(resource_name.clone()),
                    WeldError::not_joined(&resource_name),
                ));
                return;
            }
            MethodLookup::NotFound => {
                spark.send(ServerFrame::error(
                    Some(resource_name.clone()),
                    WeldError::method_not_found(&resource_name, &method),
                ));
                return;
            }
        };

        // The spark has bindings for this resource, so the registry holds it
        // (resources are never removed).
        let Some(resource) = self.registry.get(&resource_name) else {
            return;
        };

        let ctx = CallContext {
            spark: spark.clone(),
            resource,
        };
        tokio::spawn(async move {
            if let Err(err) = handler(ctx, args).await {
                warn!(
                    "Method `{method}` on resource `{resource_name}` failed for spark {}: {err}",
                    spark.id()
                );
                spark.send(ServerFrame::error(Some(resource_name), err));
            }
        });
    }
}

impl SparkHandler for WeldServer {
    async fn on_connect(
        &self,
        id: String,
        headers: HashMap<String, String>,
        sender: SparkSender,
    ) {
        let spark = Arc::new(Spark::new(id.clone(), headers, sender));
        self.sparks.write().insert(id, spark);
    }

    async fn on_frame(&self, id: &str, frame: ClientFrame) {
        let Some(spark) = self.spark(id) else {
            return;
        };

        match frame {
            ClientFrame::Join { resource } => self.handle_join(&spark, resource),
            ClientFrame::Leave { resource } => self.handle_leave(&spark, &resource),
            ClientFrame::Call {
                resource,
                method,
                args,
            } => self.handle_call(spark, resource, method, args),
        }
    }

    async fn on_disconnect(&self, id: &str) {
        let Some(spark) = self.sparks.write().remove(id) else {
            return;
        };
        // Sweep the spark out of every group. An in-flight session
        // resolution keeps its cell alive via the spark Arc and completes
        // without observable effect.
        for resource in self.registry.snapshot() {
            resource.leave(&spark);
        }
        debug!("Spark {} removed from all resources", spark.id());
    }
}
