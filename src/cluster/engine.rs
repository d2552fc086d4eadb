use ahash::AHashSet;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::cluster::cache::{job_fingerprint, ClusterCache};
use crate::cluster::graph::SimilarityGraph;
use crate::cluster::policy::{LinkageFactory, LinkageStrategy};
use crate::config::subsystems::clustering::{ClusteringConfig, LinkagePolicy};
use crate::error::{Error, Result};
use crate::types::SimilarityEdge;

/// One duplicate group. Members are sorted record ids and
/// `min_pairwise_sim` is the weakest scored similarity inside the
/// group, with unscored pairs counting as 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<String>,
    pub min_pairwise_sim: f64,
    pub size: usize,
}

/// Full clustering outcome. Every record of the input universe appears
/// in exactly one cluster or in `outliers`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    pub outliers: Vec<String>,
    pub policy: LinkagePolicy,
    pub threshold: f64,
}

impl ClusteringResult {
    pub fn clustered_records(&self) -> usize {
        self.clusters.iter().map(|c| c.size).sum()
    }

    pub fn total_records(&self) -> usize {
        self.clustered_records() + self.outliers.len()
    }
}

/// Drives a linkage strategy over the similarity graph and packages
/// the outcome with stable ids and sorted member lists.
pub struct ClusteringEngine {
    config: ClusteringConfig,
    strategy: Box<dyn LinkageStrategy>,
}

impl ClusteringEngine {
    pub fn new(config: &ClusteringConfig) -> Result<Self> {
        config.validate()?;
        let strategy = LinkageFactory::create(config)?;
        Ok(Self {
            config: config.clone(),
            strategy,
        })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Clusters the universe using the configured policy. Cluster ids
    /// are assigned sequentially from 0 in strategy emission order and
    /// member lists are sorted, so identical inputs yield an identical
    /// result regardless of how the edges were produced.
    pub fn cluster(
        &self,
        universe: &[String],
        edges: &[SimilarityEdge],
    ) -> Result<ClusteringResult> {
        let start = Instant::now();
        check_unique_universe(universe)?;

        let graph = SimilarityGraph::build(universe, edges, self.config.threshold);
        let raw = self.strategy.form_clusters(&graph);

        let mut assigned: AHashSet<String> = AHashSet::with_capacity(universe.len());
        let mut clusters = Vec::with_capacity(raw.len());
        for (id, mut members) in raw.into_iter().enumerate() {
            for member in &members {
                if !assigned.insert(member.clone()) {
                    return Err(Error::clustering(format!(
                        "record {} was placed in more than one cluster",
                        member
                    )));
                }
            }
            members.sort_unstable();
            let min_pairwise_sim = graph.min_pairwise(&members);
            let size = members.len();
            clusters.push(Cluster {
                id,
                members,
                min_pairwise_sim,
                size,
            });
        }

        let mut outliers: Vec<String> = universe
            .iter()
            .filter(|id| !assigned.contains(id.as_str()))
            .cloned()
            .collect();
        outliers.sort_unstable();

        info!(
            "Clustering ({}) produced {} cluster(s) and {} outlier(s) from {} record(s) in {:.2?}",
            self.strategy.policy().as_str(),
            clusters.len(),
            outliers.len(),
            universe.len(),
            start.elapsed()
        );

        Ok(ClusteringResult {
            clusters,
            outliers,
            policy: self.strategy.policy(),
            threshold: self.config.threshold,
        })
    }

    /// Cached variant keyed by a fingerprint of the universe, the
    /// edges, and the clustering configuration. A hit shares the
    /// stored result; a miss computes and stores it.
    pub fn cluster_cached(
        &self,
        universe: &[String],
        edges: &[SimilarityEdge],
        cache: &ClusterCache,
    ) -> Result<Arc<ClusteringResult>> {
        let key = job_fingerprint(universe, edges, &self.config);
        if let Some(hit) = cache.get(key) {
            return Ok(hit);
        }
        let result = Arc::new(self.cluster(universe, edges)?);
        cache.insert(key, Arc::clone(&result));
        Ok(result)
    }
}

fn check_unique_universe(universe: &[String]) -> Result<()> {
    let mut seen: AHashSet<&str> = AHashSet::with_capacity(universe.len());
    for id in universe {
        if !seen.insert(id.as_str()) {
            return Err(Error::clustering(format!(
                "duplicate record id in clustering universe: {}",
                id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn triangle_edges() -> Vec<SimilarityEdge> {
        vec![
            SimilarityEdge::new("A", "B", 0.95),
            SimilarityEdge::new("A", "C", 0.85),
            SimilarityEdge::new("B", "C", 0.70),
        ]
    }

    #[test]
    fn complete_linkage_splits_weak_triangle() {
        let config = ClusteringConfig {
            threshold: 0.8,
            policy: LinkagePolicy::Complete,
            min_cluster_size: 2,
        };
        let engine = ClusteringEngine::new(&config).unwrap();

        let result = engine.cluster(&ids(&["A", "B", "C"]), &triangle_edges()).unwrap();

        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].id, 0);
        assert_eq!(result.clusters[0].members, ids(&["A", "B"]));
        assert_eq!(result.clusters[0].min_pairwise_sim, 0.95);
        assert_eq!(result.clusters[0].size, 2);
        assert_eq!(result.outliers, ids(&["C"]));
        assert_eq!(result.policy, LinkagePolicy::Complete);
        assert_eq!(result.threshold, 0.8);
    }

    #[test]
    fn single_linkage_keeps_weak_triangle_whole() {
        let config = ClusteringConfig {
            threshold: 0.8,
            policy: LinkagePolicy::Single,
            min_cluster_size: 2,
        };
        let engine = ClusteringEngine::new(&config).unwrap();

        let result = engine.cluster(&ids(&["A", "B", "C"]), &triangle_edges()).unwrap();

        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].members, ids(&["A", "B", "C"]));
        // Cohesion reports the weakest scored pair even though that
        // pair never qualified as an edge.
        assert_eq!(result.clusters[0].min_pairwise_sim, 0.70);
        assert!(result.outliers.is_empty());
    }

    #[test]
    fn every_record_lands_in_exactly_one_place() {
        let config = ClusteringConfig::default();
        let engine = ClusteringEngine::new(&config).unwrap();
        let universe = ids(&["r1", "r2", "r3", "r4", "r5"]);
        let edges = vec![
            SimilarityEdge::new("r1", "r2", 0.9),
            SimilarityEdge::new("r4", "r5", 0.86),
            SimilarityEdge::new("r2", "r3", 0.5),
        ];

        let result = engine.cluster(&universe, &edges).unwrap();

        assert_eq!(result.total_records(), universe.len());
        let mut seen: Vec<&String> = result
            .clusters
            .iter()
            .flat_map(|c| c.members.iter())
            .chain(result.outliers.iter())
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&String> = universe.iter().collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn duplicate_universe_id_is_rejected() {
        let engine = ClusteringEngine::new(&ClusteringConfig::default()).unwrap();
        let err = engine
            .cluster(&ids(&["A", "B", "A"]), &[])
            .unwrap_err();
        assert!(err.to_string().contains("duplicate record id"));
    }

    #[test]
    fn empty_universe_yields_empty_result() {
        let engine = ClusteringEngine::new(&ClusteringConfig::default()).unwrap();
        let result = engine.cluster(&[], &[]).unwrap();
        assert!(result.clusters.is_empty());
        assert!(result.outliers.is_empty());
        assert_eq!(result.total_records(), 0);
    }

    #[test]
    fn cached_run_shares_stored_result() {
        let engine = ClusteringEngine::new(&ClusteringConfig::default()).unwrap();
        let cache = ClusterCache::new();
        let universe = ids(&["A", "B"]);
        let edges = vec![SimilarityEdge::new("A", "B", 0.9)];

        let first = engine.cluster_cached(&universe, &edges, &cache).unwrap();
        let second = engine.cluster_cached(&universe, &edges, &cache).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other_edges = vec![SimilarityEdge::new("A", "B", 0.5)];
        let third = engine.cluster_cached(&universe, &other_edges, &cache).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);
    }
}
