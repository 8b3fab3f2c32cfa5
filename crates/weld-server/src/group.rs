//! Channel group — the set of connections associated with one resource.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use weld_protocol::ServerFrame;

use crate::spark::{Spark, SparkId};

/// Membership set for one resource. Add and remove are idempotent;
/// iteration and broadcast operate on a point-in-time snapshot, so a
/// connection joining mid-broadcast does not receive that broadcast.
pub struct ChannelGroup {
    name: String,
    members: RwLock<HashMap<SparkId, Arc<Spark>>>,
}

impl ChannelGroup {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            members: RwLock::new(HashMap::new()),
        }
    }

    /// The owning resource's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a member. Re-adding a present member is a no-op.
    pub fn add(&self, spark: Arc<Spark>) {
        self.members
            .write()
            .entry(spark.id().to_string())
            .or_insert(spark);
    }

    /// Remove a member. Removing an absent member is a no-op.
    pub fn remove(&self, id: &str) {
        self.members.write().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Point-in-time membership snapshot.
    pub fn snapshot(&self) -> Vec<Arc<Spark>> {
        self.members.read().values().cloned().collect()
    }

    /// Stable iteration over a snapshot taken at call time.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Spark>)) {
        for spark in self.snapshot() {
            f(&spark);
        }
    }

    /// Send `event` with `args` to every current member. Best-effort fan-out:
    /// delivery failures to individual connections are not surfaced — a dead
    /// connection is removed by the transport's disconnect path, not here.
    pub fn broadcast(&self, event: &str, args: Vec<Value>) {
        self.for_each(|spark| {
            spark.send(ServerFrame::event(self.name.clone(), event, args.clone()));
        });
    }
}
