//! In-memory index of this node's initialized containers. The map is a
//! cache of host reality; the reconciler converges it via
//! `sync_initialized`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::container::Container;

/// Mutation surface of the tracker, injected into the store.
#[async_trait]
pub trait InitializedTracker: Send + Sync {
    /// Adds or updates the record for its guid.
    async fn initialize(&self, container: Container);

    /// Removes the record.
    async fn deinitialize(&self, guid: &str);

    /// Atomically replaces the tracked set with the given list. Idempotent.
    async fn sync_initialized(&self, containers: Vec<Container>);
}

/// Default tracker: guid → record, keys unique, mutators serialized.
#[derive(Default)]
pub struct Tracker {
    containers: Mutex<HashMap<String, Container>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A consistent snapshot of the tracked records.
    pub async fn snapshot(&self) -> Vec<Container> {
        self.containers.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl InitializedTracker for Tracker {
    async fn initialize(&self, container: Container) {
        let mut tracked = self.containers.lock().await;
        tracked.insert(container.guid.clone(), container);
    }

    async fn deinitialize(&self, guid: &str) {
        let mut tracked = self.containers.lock().await;
        tracked.remove(guid);
    }

    async fn sync_initialized(&self, containers: Vec<Container>) {
        let fresh: HashMap<String, Container> = containers
            .into_iter()
            .map(|c| (c.guid.clone(), c))
            .collect();

        let mut tracked = self.containers.lock().await;
        let added = fresh.keys().filter(|g| !tracked.contains_key(*g)).count();
        let removed = tracked.keys().filter(|g| !fresh.contains_key(*g)).count();
        if added > 0 || removed > 0 {
            tracing::debug!(added, removed, tracked = fresh.len(), "converged with host");
        }
        *tracked = fresh;
    }
}
