pub mod cancel;
pub mod resources;
pub mod executor;

pub use cancel::CancellationToken;
pub use resources::{MemoryInfo, MemoryPressure, ResourceEstimator};
pub use executor::{ChunkObserver, ExecutionMode, Executor};
