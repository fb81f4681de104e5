//! # Cache Partitions
//!
//! Named response caches keyed by full URL. Partitions are shared
//! mutably across all worker instances of the origin; the underlying
//! store provides atomic get/insert, so no further locking is needed
//! per entry.

use std::collections::HashMap;
use std::sync::Arc;

use moka::future::Cache as MokaCache;
use parking_lot::RwLock;
use tracing::debug;

use crate::types::AssetResponse;

/// A single named cache partition
pub struct Partition {
    name: String,
    entries: MokaCache<String, AssetResponse>,
}

impl Partition {
    fn new(name: String, max_entries: u64) -> Self {
        let entries = MokaCache::builder().max_capacity(max_entries).build();
        Self { name, entries }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a cached response by URL
    pub async fn get(&self, url: &str) -> Option<AssetResponse> {
        self.entries.get(url).await
    }

    /// Store a response under its URL. Last write wins on concurrent
    /// inserts for the same URL.
    pub async fn put(&self, url: impl Into<String>, response: AssetResponse) {
        self.entries.insert(url.into(), response).await;
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry of named cache partitions for one origin
pub struct PartitionStore {
    partitions: RwLock<HashMap<String, Arc<Partition>>>,
    max_entries: u64,
}

impl PartitionStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Open a partition, creating it if absent
    pub fn open(&self, name: &str) -> Arc<Partition> {
        if let Some(partition) = self.partitions.read().get(name) {
            return Arc::clone(partition);
        }

        let mut partitions = self.partitions.write();
        Arc::clone(
            partitions
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Partition::new(name.to_string(), self.max_entries))),
        )
    }

    /// Names of every existing partition
    pub fn names(&self) -> Vec<String> {
        self.partitions.read().keys().cloned().collect()
    }

    /// Delete a partition and all its entries
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.partitions.write().remove(name).is_some();
        if removed {
            debug!(partition = name, "Deleted cache partition");
        }
        removed
    }

    /// Delete every partition unconditionally
    pub fn delete_all(&self) {
        let mut partitions = self.partitions.write();
        let count = partitions.len();
        partitions.clear();
        debug!(count, "Cleared all cache partitions");
    }

    /// Search every partition for a cached response, like a global
    /// cache match
    pub async fn match_any(&self, url: &str) -> Option<AssetResponse> {
        let partitions: Vec<Arc<Partition>> =
            self.partitions.read().values().cloned().collect();
        for partition in partitions {
            if let Some(response) = partition.get(url).await {
                return Some(response);
            }
        }
        None
    }
}
