use ahash::AHashMap;
use log::{debug, trace};
use std::collections::BTreeSet;

use crate::cluster::graph::SimilarityGraph;
use crate::cluster::union_find::DisjointSet;
use crate::config::subsystems::clustering::{ClusteringConfig, LinkagePolicy};
use crate::error::Result;

/// Strategy interface for turning a similarity graph into clusters.
///
/// Implementations return member lists only; ids not placed in any
/// returned cluster are the caller's outliers. Member order within a
/// returned cluster is formation order and callers normalize it.
pub trait LinkageStrategy: Send + Sync {
    fn policy(&self) -> LinkagePolicy;

    fn form_clusters(&self, graph: &SimilarityGraph) -> Vec<Vec<String>>;
}

/// Complete linkage: every pair inside a cluster must have been scored
/// at or above the threshold. Connected components are refined greedily
/// because exact complete-linkage partitioning is NP-hard.
pub struct CompleteLinkage {
    threshold: f64,
    min_cluster_size: usize,
}

impl CompleteLinkage {
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_cluster_size: config.min_cluster_size,
        }
    }

    /// Greedy refinement of one component. The lexicographically
    /// smallest unassigned member seeds a cluster; remaining members
    /// are scanned in ascending order and absorbed only when they
    /// qualify against every current member, including ones absorbed
    /// earlier in the same pass. Scanning repeats until a full pass
    /// absorbs nothing.
    fn refine_component(&self, component: &[String], graph: &SimilarityGraph) -> Vec<Vec<String>> {
        let mut unassigned: BTreeSet<String> = component.iter().cloned().collect();
        let mut clusters = Vec::new();

        while let Some(seed) = unassigned.iter().next().cloned() {
            unassigned.remove(&seed);
            let mut members = vec![seed];

            loop {
                let mut absorbed_any = false;
                let candidates: Vec<String> = unassigned.iter().cloned().collect();
                for candidate in candidates {
                    let qualifies = members.iter().all(|member| {
                        graph
                            .similarity(member, &candidate)
                            .map_or(false, |sim| sim >= self.threshold)
                    });
                    if qualifies {
                        unassigned.remove(&candidate);
                        members.push(candidate);
                        absorbed_any = true;
                    }
                }
                if !absorbed_any {
                    break;
                }
            }

            if members.len() >= self.min_cluster_size {
                trace!(
                    "Complete linkage formed cluster of {} around seed {}",
                    members.len(),
                    members[0]
                );
                clusters.push(members);
            } else {
                // Too small to keep. Members become outliers rather
                // than re-entering the pool, which also guarantees
                // the refinement terminates.
                trace!(
                    "Complete linkage released {} member(s) around seed {}",
                    members.len(),
                    members[0]
                );
            }
        }

        clusters
    }
}

impl LinkageStrategy for CompleteLinkage {
    fn policy(&self) -> LinkagePolicy {
        LinkagePolicy::Complete
    }

    fn form_clusters(&self, graph: &SimilarityGraph) -> Vec<Vec<String>> {
        let components = graph.components();
        debug!(
            "Refining {} component(s) under complete linkage at threshold {:.2}",
            components.len(),
            self.threshold
        );

        let mut clusters = Vec::new();
        for component in components {
            clusters.extend(self.refine_component(&component, graph));
        }
        clusters
    }
}

/// Single linkage: a connecting path of qualifying edges is enough, so
/// clusters are exactly the connected components. The partition is
/// computed with a disjoint-set forest and enumerated in universe
/// first-seen order to match the component emission order.
pub struct SingleLinkage {
    min_cluster_size: usize,
}

impl SingleLinkage {
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size,
        }
    }
}

impl LinkageStrategy for SingleLinkage {
    fn policy(&self) -> LinkagePolicy {
        LinkagePolicy::Single
    }

    fn form_clusters(&self, graph: &SimilarityGraph) -> Vec<Vec<String>> {
        let mut sets = DisjointSet::new();
        for id in graph.universe() {
            sets.insert(id);
        }
        for id in graph.universe() {
            for neighbor in graph.neighbors(id) {
                sets.union(id, neighbor);
            }
        }

        let mut order: Vec<String> = Vec::new();
        let mut groups: AHashMap<String, Vec<String>> = AHashMap::new();
        for id in graph.universe() {
            if let Some(root) = sets.find(id) {
                let members = groups.entry(root.clone()).or_default();
                if members.is_empty() {
                    order.push(root);
                }
                members.push(id.clone());
            }
        }

        debug!(
            "Single linkage found {} component(s) across {} record(s)",
            order.len(),
            graph.universe().len()
        );

        order
            .into_iter()
            .filter_map(|root| groups.remove(&root))
            .filter(|members| members.len() >= self.min_cluster_size)
            .collect()
    }
}

pub struct LinkageFactory;

impl LinkageFactory {
    pub fn create(config: &ClusteringConfig) -> Result<Box<dyn LinkageStrategy>> {
        config.validate()?;
        match config.policy {
            LinkagePolicy::Complete => Ok(Box::new(CompleteLinkage::new(config))),
            LinkagePolicy::Single => Ok(Box::new(SingleLinkage::new(config))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SimilarityEdge;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn config(policy: LinkagePolicy, threshold: f64, min_cluster_size: usize) -> ClusteringConfig {
        ClusteringConfig {
            threshold,
            policy,
            min_cluster_size,
        }
    }

    #[test]
    fn complete_linkage_rejects_partially_connected_member() {
        // a-b and a-c qualify but b-c does not, so c cannot join {a, b}.
        let universe = ids(&["a", "b", "c"]);
        let edges = vec![
            SimilarityEdge::new("a", "b", 0.95),
            SimilarityEdge::new("a", "c", 0.85),
            SimilarityEdge::new("b", "c", 0.70),
        ];
        let graph = SimilarityGraph::build(&universe, &edges, 0.8);
        let strategy = CompleteLinkage::new(&config(LinkagePolicy::Complete, 0.8, 2));

        let clusters = strategy.form_clusters(&graph);
        assert_eq!(clusters, vec![ids(&["a", "b"])]);
    }

    #[test]
    fn single_linkage_keeps_chained_component_whole() {
        let universe = ids(&["a", "b", "c"]);
        let edges = vec![
            SimilarityEdge::new("a", "b", 0.95),
            SimilarityEdge::new("a", "c", 0.85),
            SimilarityEdge::new("b", "c", 0.70),
        ];
        let graph = SimilarityGraph::build(&universe, &edges, 0.8);
        let strategy = SingleLinkage::new(&config(LinkagePolicy::Single, 0.8, 2));

        let clusters = strategy.form_clusters(&graph);
        assert_eq!(clusters, vec![ids(&["a", "b", "c"])]);
    }

    #[test]
    fn smallest_member_seeds_first() {
        // b-c is the strongest pairing, but a seeds first and takes c,
        // leaving b alone and ultimately an outlier.
        let universe = ids(&["a", "b", "c"]);
        let edges = vec![
            SimilarityEdge::new("b", "c", 0.95),
            SimilarityEdge::new("a", "c", 0.90),
            SimilarityEdge::new("a", "b", 0.70),
        ];
        let graph = SimilarityGraph::build(&universe, &edges, 0.8);
        let strategy = CompleteLinkage::new(&config(LinkagePolicy::Complete, 0.8, 2));

        let clusters = strategy.form_clusters(&graph);
        assert_eq!(clusters, vec![ids(&["a", "c"])]);
    }

    #[test]
    fn undersized_groups_are_released_not_emitted() {
        let universe = ids(&["a", "b", "x"]);
        let edges = vec![SimilarityEdge::new("a", "b", 0.9)];
        let graph = SimilarityGraph::build(&universe, &edges, 0.8);

        let complete = CompleteLinkage::new(&config(LinkagePolicy::Complete, 0.8, 2));
        assert_eq!(complete.form_clusters(&graph), vec![ids(&["a", "b"])]);

        let single = SingleLinkage::new(&config(LinkagePolicy::Single, 0.8, 3));
        assert!(single.form_clusters(&graph).is_empty());
    }

    #[test]
    fn min_cluster_size_one_keeps_singletons() {
        let universe = ids(&["a", "b"]);
        let graph = SimilarityGraph::build(&universe, &[], 0.8);
        let strategy = SingleLinkage::new(&config(LinkagePolicy::Single, 0.8, 1));

        let clusters = strategy.form_clusters(&graph);
        assert_eq!(clusters, vec![ids(&["a"]), ids(&["b"])]);
    }

    #[test]
    fn factory_dispatches_on_policy() {
        let complete = LinkageFactory::create(&config(LinkagePolicy::Complete, 0.8, 2)).unwrap();
        assert_eq!(complete.policy(), LinkagePolicy::Complete);

        let single = LinkageFactory::create(&config(LinkagePolicy::Single, 0.8, 2)).unwrap();
        assert_eq!(single.policy(), LinkagePolicy::Single);

        assert!(LinkageFactory::create(&config(LinkagePolicy::Complete, 1.5, 2)).is_err());
    }
}
