pub mod ratios;
pub mod scorer;

pub use scorer::{PairScorer, sort_pairs};
