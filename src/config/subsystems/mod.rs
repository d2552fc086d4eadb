pub mod blocking;
pub mod scoring;
pub mod clustering;
pub mod survivorship;
pub mod executor;

pub use blocking::{BlockingConfig, SecondaryBlockingMode};
pub use scoring::ScoringConfig;
pub use clustering::{ClusteringConfig, LinkagePolicy};
pub use survivorship::{SurvivorshipConfig, SelectionStrategy};
pub use executor::{ExecutorConfig, ParallelBackend};
