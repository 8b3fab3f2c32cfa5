//! Resource registry — process-wide name → resource mapping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use weld_protocol::WeldError;
use weld_session::SessionBridge;

use crate::definition::ResourceDefinition;
use crate::resource::Resource;

/// Get-or-create registry of resources. Explicitly owned and injected
/// (`Arc<ResourceRegistry>`) rather than a language-level global; lives for
/// the server process's lifetime and is never cleared.
pub struct ResourceRegistry {
    resources: RwLock<HashMap<String, Arc<Resource>>>,
    bridge: Arc<SessionBridge>,
}

impl ResourceRegistry {
    pub fn new(bridge: Arc<SessionBridge>) -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            bridge,
        }
    }

    /// Get or create the resource named `name`.
    ///
    /// Idempotent per name: if the name is already registered the existing
    /// resource is returned unchanged and `definition` is ignored — this is
    /// get-or-create, not update, and the channel group is not re-bound.
    /// An empty name is an `InvalidArgument` error.
    pub fn get_or_create(
        &self,
        name: &str,
        definition: Arc<dyn ResourceDefinition>,
    ) -> Result<Arc<Resource>, WeldError> {
        if name.is_empty() {
            return Err(WeldError::invalid_argument(
                "Resource should be specified with a non-empty name",
            ));
        }

        let mut resources = self.resources.write();
        if let Some(existing) = resources.get(name) {
            return Ok(existing.clone());
        }

        let resource = Resource::new(name.to_string(), definition, self.bridge.clone());
        resources.insert(name.to_string(), resource.clone());
        info!("Resource registered: {name}");
        Ok(resource)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Resource>> {
        self.resources.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.resources.read().keys().cloned().collect()
    }

    /// Point-in-time snapshot of all resources (used by the disconnect
    /// sweep).
    pub fn snapshot(&self) -> Vec<Arc<Resource>> {
        self.resources.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}
