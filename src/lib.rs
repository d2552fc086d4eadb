//! orgdedupe is a library for finding duplicate organization records.
//! It blocks normalized records into candidate pairs, scores them with
//! composite fuzzy name matching, clusters the resulting similarity
//! graph, and picks a surviving primary record per duplicate group.

// Module declarations
pub mod error;
pub mod types;
pub mod config;
pub mod exec;
pub mod blocking;
pub mod scoring;
pub mod cluster;
pub mod survivor;
pub mod pipeline;

// Re-exports
pub use error::{Error, Result};
pub use types::{Record, ScoredPair, SimilarityEdge};
pub use blocking::{BlockStats, CandidateGenerator};
pub use scoring::PairScorer;
pub use cluster::{Cluster, ClusterCache, ClusteringEngine, ClusteringResult};
pub use survivor::{MergePreview, PreviewBuilder, PrimarySelector};
pub use exec::{CancellationToken, ChunkObserver, Executor, ResourceEstimator};
pub use pipeline::{DedupePipeline, PipelineOutput, ProgressEvent, Stage};

// Re-export the config from config module
pub use config::DedupeConfig;
