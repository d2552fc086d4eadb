// cluster/mod.rs
pub mod cache;
pub mod engine;
pub mod graph;
pub mod policy;
pub mod union_find;

// Re-export the main types
pub use self::cache::{job_fingerprint, ClusterCache};
pub use self::engine::{Cluster, ClusteringEngine, ClusteringResult};
pub use self::graph::SimilarityGraph;
pub use self::policy::{CompleteLinkage, LinkageFactory, LinkageStrategy, SingleLinkage};
pub use self::union_find::DisjointSet;
