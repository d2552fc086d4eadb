use ahash::AHashMap;
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cluster::engine::ClusteringResult;
use crate::config::subsystems::clustering::ClusteringConfig;
use crate::types::SimilarityEdge;

pub const DEFAULT_CACHE_CAPACITY: usize = 64;
const EVICTION_FRACTION: f64 = 0.25;

/// Keyed store of finished clustering results, shared across pipeline
/// runs. Results are immutable once inserted, so readers hand out
/// `Arc` clones without copying members.
pub struct ClusterCache {
    entries: RwLock<AHashMap<u64, Arc<ClusteringResult>>>,
    capacity: usize,
}

impl ClusterCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn get(&self, key: u64) -> Option<Arc<ClusteringResult>> {
        let hit = self.entries.read().get(&key).cloned();
        if hit.is_some() {
            trace!("Cluster cache hit for job {:016x}", key);
        }
        hit
    }

    /// Inserts a result, evicting a quarter of the cache first when it
    /// is full. Eviction removes the numerically smallest keys so the
    /// surviving set is the same on every run.
    pub fn insert(&self, key: u64, result: Arc<ClusteringResult>) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let mut keys: Vec<u64> = entries.keys().copied().collect();
            keys.sort_unstable();
            let to_remove = ((self.capacity as f64 * EVICTION_FRACTION) as usize).max(1);
            for old in keys.iter().take(to_remove) {
                entries.remove(old);
            }
            debug!(
                "Cluster cache full, evicted {} oldest-keyed entries",
                to_remove
            );
        }
        entries.insert(key, result);
    }

    /// Drops one entry, e.g. after its underlying records changed.
    pub fn invalidate(&self, key: u64) -> bool {
        self.entries.write().remove(&key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for ClusterCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable fingerprint of a clustering job: the universe, every scored
/// edge, and the parts of the configuration that influence the result.
/// Equal inputs always hash equal; similarities are hashed through
/// their bit patterns so no float rounding sneaks in.
pub fn job_fingerprint(
    universe: &[String],
    edges: &[SimilarityEdge],
    config: &ClusteringConfig,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    universe.len().hash(&mut hasher);
    for id in universe {
        id.hash(&mut hasher);
    }
    edges.len().hash(&mut hasher);
    for edge in edges {
        edge.id_a.hash(&mut hasher);
        edge.id_b.hash(&mut hasher);
        edge.similarity.to_bits().hash(&mut hasher);
    }
    config.threshold.to_bits().hash(&mut hasher);
    config.policy.as_str().hash(&mut hasher);
    config.min_cluster_size.hash(&mut hasher);
    hasher.finish()
}
