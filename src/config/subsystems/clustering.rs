// src/config/subsystems/clustering.rs

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

/// Linkage policy for turning the thresholded similarity graph into
/// clusters. Complete linkage demands all-pairs similarity above the
/// threshold; single linkage only a connecting path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkagePolicy {
    Complete,
    Single,
}

impl LinkagePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkagePolicy::Complete => "complete",
            LinkagePolicy::Single => "single",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "complete" => Some(Self::Complete),
            "single" => Some(Self::Single),
            _ => None,
        }
    }
}

impl Default for LinkagePolicy {
    fn default() -> Self {
        Self::Complete
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Minimum similarity for an edge to enter the graph, on [0, 1].
    pub threshold: f64,

    pub policy: LinkagePolicy,

    /// Components/subclusters smaller than this become outliers.
    pub min_cluster_size: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            // Matches the default medium score cutoff (84 on the 0-100
            // scale), so default clustering sees exactly the retained pairs.
            threshold: 0.84,
            policy: LinkagePolicy::default(),
            min_cluster_size: 2,
        }
    }
}

impl FromIni for ClusteringConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "clustering" {
            return None;
        }

        match key {
            "threshold" => {
                match value.parse::<f64>() {
                    Ok(threshold) if (0.0..=1.0).contains(&threshold) => {
                        self.threshold = threshold;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid threshold (must be within [0.0, 1.0]): {}", value)
                    ))),
                }
            },
            "policy" => {
                match LinkagePolicy::from_str(value) {
                    Some(policy) => {
                        self.policy = policy;
                        Some(Ok(()))
                    },
                    None => Some(Err(Error::Config(
                        format!("Invalid policy (must be 'complete' or 'single'): {}", value)
                    ))),
                }
            },
            "min_cluster_size" => {
                match value.parse() {
                    Ok(size) if size >= 1 => {
                        self.min_cluster_size = size;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid min_cluster_size (must be >= 1): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "clustering threshold must be within [0.0, 1.0], got {}",
                self.threshold
            )));
        }
        if self.min_cluster_size < 1 {
            return Err(Error::Config(format!(
                "min_cluster_size must be >= 1, got {}",
                self.min_cluster_size
            )));
        }
        Ok(())
    }
}
