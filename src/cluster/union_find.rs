// src/cluster/union_find.rs

use ahash::AHashMap;

/// Disjoint-set forest keyed by record id, with path compression and union
/// by rank. Backs union-based grouping wherever a full adjacency graph is
/// not needed.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parent: AHashMap<String, String>,
    rank: AHashMap<String, u32>,
    size: AHashMap<String, usize>,
}

impl DisjointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as its own singleton set if unseen.
    pub fn insert(&mut self, id: &str) {
        if !self.parent.contains_key(id) {
            self.parent.insert(id.to_string(), id.to_string());
            self.rank.insert(id.to_string(), 0);
            self.size.insert(id.to_string(), 1);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parent.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of the set containing `id`, compressing the walked path.
    pub fn find(&mut self, id: &str) -> Option<String> {
        if !self.parent.contains_key(id) {
            return None;
        }

        let mut root = id.to_string();
        while let Some(parent) = self.parent.get(&root) {
            if *parent == root {
                break;
            }
            root = parent.clone();
        }

        // Second pass: point the chain straight at the root.
        let mut current = id.to_string();
        while current != root {
            let next = match self.parent.get(&current) {
                Some(next) => next.clone(),
                None => break,
            };
            self.parent.insert(current, root.clone());
            current = next;
        }

        Some(root)
    }

    /// Merges the sets containing `a` and `b`, inserting unseen ids first.
    /// Returns true when a merge actually happened.
    pub fn union(&mut self, a: &str, b: &str) -> bool {
        self.insert(a);
        self.insert(b);

        let (root_a, root_b) = match (self.find(a), self.find(b)) {
            (Some(ra), Some(rb)) => (ra, rb),
            _ => return false,
        };
        if root_a == root_b {
            return false;
        }

        let rank_a = self.rank.get(&root_a).copied().unwrap_or(0);
        let rank_b = self.rank.get(&root_b).copied().unwrap_or(0);

        // Attach the lower-ranked root; ties attach b under a.
        let (winner, loser) = if rank_a >= rank_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };

        self.parent.insert(loser.clone(), winner.clone());
        let absorbed = self.size.get(&loser).copied().unwrap_or(1);
        *self.size.entry(winner.clone()).or_insert(1) += absorbed;
        if rank_a == rank_b {
            *self.rank.entry(winner).or_insert(0) += 1;
        }
        true
    }

    pub fn same_set(&mut self, a: &str, b: &str) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Size of the set containing `id`; 0 for unknown ids.
    pub fn set_size(&mut self, id: &str) -> usize {
        match self.find(id) {
            Some(root) => self.size.get(&root).copied().unwrap_or(0),
            None => 0,
        }
    }

    /// All sets, each with sorted members, ordered by smallest member.
    pub fn sets(&mut self) -> Vec<Vec<String>> {
        let mut ids: Vec<String> = self.parent.keys().cloned().collect();
        ids.sort_unstable();

        let mut groups: AHashMap<String, Vec<String>> = AHashMap::new();
        for id in ids {
            if let Some(root) = self.find(&id) {
                groups.entry(root).or_default().push(id);
            }
        }

        let mut sets: Vec<Vec<String>> = groups.into_values().collect();
        sets.sort_unstable_by(|a, b| a.first().cmp(&b.first()));
        sets
    }
}
