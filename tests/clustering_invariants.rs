use std::collections::{HashMap, HashSet};

use orgdedupe::config::subsystems::{ClusteringConfig, LinkagePolicy};
use orgdedupe::{ClusteringEngine, ClusteringResult, SimilarityEdge};

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn edge(a: &str, b: &str, sim: f64) -> SimilarityEdge {
    SimilarityEdge::new(a, b, sim)
}

/// Two tight sub-groups joined by a single bridge edge, one
/// below-threshold pair, and one isolated record.
fn universe() -> Vec<String> {
    ids(&["a1", "a2", "a3", "b1", "b2", "b3", "c1", "c2", "d1"])
}

fn edges() -> Vec<SimilarityEdge> {
    vec![
        edge("a1", "a2", 0.95),
        edge("a1", "a3", 0.90),
        edge("a2", "a3", 0.92),
        edge("a3", "b1", 0.85),
        edge("b1", "b2", 0.90),
        edge("b2", "b3", 0.88),
        edge("b1", "b3", 0.30),
        edge("c1", "c2", 0.60),
    ]
}

fn run(policy: LinkagePolicy, threshold: f64) -> ClusteringResult {
    let config = ClusteringConfig {
        threshold,
        policy,
        min_cluster_size: 2,
    };
    ClusteringEngine::new(&config)
        .unwrap()
        .cluster(&universe(), &edges())
        .unwrap()
}

fn similarity_map() -> HashMap<(String, String), f64> {
    edges()
        .into_iter()
        .map(|e| {
            let key = if e.id_a <= e.id_b {
                (e.id_a, e.id_b)
            } else {
                (e.id_b, e.id_a)
            };
            (key, e.similarity)
        })
        .collect()
}

#[test]
fn every_record_appears_exactly_once() {
    for policy in [LinkagePolicy::Complete, LinkagePolicy::Single] {
        let result = run(policy, 0.8);

        let mut seen: Vec<String> = result
            .clusters
            .iter()
            .flat_map(|c| c.members.iter().cloned())
            .chain(result.outliers.iter().cloned())
            .collect();
        seen.sort();

        let mut expected = universe();
        expected.sort();
        assert_eq!(seen, expected, "partition violated under {:?}", policy);
    }
}

#[test]
fn complete_linkage_keeps_only_fully_connected_groups() {
    let result = run(LinkagePolicy::Complete, 0.8);
    let sims = similarity_map();

    for cluster in &result.clusters {
        for i in 0..cluster.members.len() {
            for j in (i + 1)..cluster.members.len() {
                let key = (cluster.members[i].clone(), cluster.members[j].clone());
                let sim = sims.get(&key).copied().unwrap_or(0.0);
                assert!(
                    sim >= 0.8,
                    "cluster {} holds {:?} with similarity {}",
                    cluster.id,
                    key,
                    sim
                );
            }
        }
    }
}

#[test]
fn bridge_component_splits_under_complete_linkage() {
    let result = run(LinkagePolicy::Complete, 0.8);

    let members: Vec<Vec<String>> = result.clusters.iter().map(|c| c.members.clone()).collect();
    assert_eq!(members, vec![ids(&["a1", "a2", "a3"]), ids(&["b1", "b2"])]);
    assert_eq!(result.outliers, ids(&["b3", "c1", "c2", "d1"]));
}

#[test]
fn bridge_component_stays_whole_under_single_linkage() {
    let result = run(LinkagePolicy::Single, 0.8);

    assert_eq!(result.clusters.len(), 1);
    assert_eq!(
        result.clusters[0].members,
        ids(&["a1", "a2", "a3", "b1", "b2", "b3"])
    );
    // Unscored in-cluster pairs drag the cohesion statistic to zero.
    assert_eq!(result.clusters[0].min_pairwise_sim, 0.0);
    assert_eq!(result.outliers, ids(&["c1", "c2", "d1"]));
}

#[test]
fn complete_clusters_refine_single_clusters() {
    let complete = run(LinkagePolicy::Complete, 0.8);
    let single = run(LinkagePolicy::Single, 0.8);

    for cluster in &complete.clusters {
        let hosts: HashSet<usize> = cluster
            .members
            .iter()
            .filter_map(|member| {
                single
                    .clusters
                    .iter()
                    .find(|s| s.members.contains(member))
                    .map(|s| s.id)
            })
            .collect();
        assert_eq!(
            hosts.len(),
            1,
            "complete cluster {} spans {} single-linkage clusters",
            cluster.id,
            hosts.len()
        );
    }
}

#[test]
fn raising_the_threshold_only_splits_clusters() {
    let loose = run(LinkagePolicy::Single, 0.8);
    let strict = run(LinkagePolicy::Single, 0.95);

    for cluster in &strict.clusters {
        let first = &cluster.members[0];
        let host = loose
            .clusters
            .iter()
            .find(|c| c.members.contains(first))
            .unwrap_or_else(|| panic!("member {} lost its loose-threshold cluster", first));
        for member in &cluster.members {
            assert!(
                host.members.contains(member),
                "strict cluster {} is not contained in a loose cluster",
                cluster.id
            );
        }
    }
}

#[test]
fn cluster_ids_are_sequential_and_stats_consistent() {
    let result = run(LinkagePolicy::Complete, 0.8);

    for (idx, cluster) in result.clusters.iter().enumerate() {
        assert_eq!(cluster.id, idx);
        assert_eq!(cluster.size, cluster.members.len());
        assert!(cluster.size >= 2);
        // Complete linkage only groups fully scored members, so the
        // cohesion statistic can never fall below the threshold.
        assert!(cluster.min_pairwise_sim >= result.threshold);

        let mut sorted = cluster.members.clone();
        sorted.sort();
        assert_eq!(sorted, cluster.members, "members must be sorted");
    }

    let mut sorted_outliers = result.outliers.clone();
    sorted_outliers.sort();
    assert_eq!(sorted_outliers, result.outliers, "outliers must be sorted");
}

#[test]
fn repeated_runs_are_identical() {
    let first = run(LinkagePolicy::Complete, 0.8);
    let second = run(LinkagePolicy::Complete, 0.8);
    assert_eq!(first, second);
}
