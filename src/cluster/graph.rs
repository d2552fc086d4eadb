use ahash::{AHashMap, AHashSet};
use log::{debug, warn};
use std::collections::VecDeque;

use crate::types::SimilarityEdge;

/// Undirected similarity graph over a fixed universe of record ids.
///
/// Adjacency lists hold only the edges at or above the construction
/// threshold, so connected components are computed over qualifying
/// edges alone. The pair-similarity map keeps every accepted edge,
/// including below-threshold ones, because cluster statistics need to
/// see the weakest link even when it would never join two records.
pub struct SimilarityGraph {
    universe: Vec<String>,
    adjacency: AHashMap<String, Vec<String>>,
    similarities: AHashMap<(String, String), f64>,
    discarded: usize,
}

impl SimilarityGraph {
    /// Builds the graph from scored edges. Self-loops and edges whose
    /// endpoints are not in the universe are discarded with a warning
    /// count. When the same pair appears more than once the last
    /// occurrence wins in the similarity map.
    pub fn build(universe: &[String], edges: &[SimilarityEdge], threshold: f64) -> Self {
        let universe_set: AHashSet<&str> = universe.iter().map(|id| id.as_str()).collect();
        let mut adjacency: AHashMap<String, Vec<String>> = AHashMap::new();
        let mut similarities: AHashMap<(String, String), f64> = AHashMap::new();
        let mut discarded = 0usize;

        for edge in edges {
            if edge.id_a == edge.id_b {
                discarded += 1;
                continue;
            }
            if !universe_set.contains(edge.id_a.as_str())
                || !universe_set.contains(edge.id_b.as_str())
            {
                discarded += 1;
                continue;
            }
            similarities.insert(pair_key(&edge.id_a, &edge.id_b), edge.similarity);
            if edge.similarity >= threshold {
                adjacency
                    .entry(edge.id_a.clone())
                    .or_default()
                    .push(edge.id_b.clone());
                adjacency
                    .entry(edge.id_b.clone())
                    .or_default()
                    .push(edge.id_a.clone());
            }
        }

        if discarded > 0 {
            warn!(
                "Discarded {} edge(s) with self-loops or unknown endpoints",
                discarded
            );
        }
        debug!(
            "Built similarity graph: {} nodes, {} scored pairs, {} at or above threshold {:.2}",
            universe.len(),
            similarities.len(),
            adjacency.values().map(|n| n.len()).sum::<usize>() / 2,
            threshold
        );

        SimilarityGraph {
            universe: universe.to_vec(),
            adjacency,
            similarities,
            discarded,
        }
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub fn discarded_edges(&self) -> usize {
        self.discarded
    }

    /// Scored similarity for a pair, regardless of threshold. Returns
    /// None when the pair was never scored.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        self.similarities.get(&pair_key(a, b)).copied()
    }

    /// True when the pair was scored at or above the threshold.
    pub fn connected(&self, a: &str, b: &str) -> bool {
        self.adjacency
            .get(a)
            .map(|neighbors| neighbors.iter().any(|n| n == b))
            .unwrap_or(false)
    }

    /// Neighbors joined by qualifying edges, in edge insertion order.
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.adjacency
            .get(id)
            .map(|n| n.as_slice())
            .unwrap_or(&[])
    }

    /// Connected components over qualifying edges. Components are
    /// emitted in universe order of their first member and each
    /// component lists members in breadth-first visit order, so the
    /// result is identical across runs for the same inputs.
    pub fn components(&self) -> Vec<Vec<String>> {
        let mut visited: AHashSet<&str> = AHashSet::with_capacity(self.universe.len());
        let mut components = Vec::new();

        for start in &self.universe {
            if visited.contains(start.as_str()) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::new();
            visited.insert(start.as_str());
            queue.push_back(start.as_str());

            while let Some(id) = queue.pop_front() {
                component.push(id.to_string());
                for neighbor in self.neighbors(id) {
                    if visited.insert(neighbor.as_str()) {
                        queue.push_back(neighbor.as_str());
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// Weakest scored similarity between any two members. Pairs that
    /// were never scored count as 0.0 so sparse components cannot
    /// report inflated cohesion. A singleton is vacuously cohesive.
    pub fn min_pairwise(&self, members: &[String]) -> f64 {
        if members.len() < 2 {
            return 1.0;
        }
        let mut min_sim = f64::INFINITY;
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let sim = self.similarity(&members[i], &members[j]).unwrap_or(0.0);
                if sim < min_sim {
                    min_sim = sim;
                }
            }
        }
        min_sim
    }
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
