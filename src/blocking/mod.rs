pub mod keys;
pub mod generator;

pub use generator::{BlockStats, CandidateGenerator};
