// src/config/subsystems/executor.rs

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

/// Execution backend preference. `Threads` runs chunks on a rayon pool;
/// `Sequential` forces single-threaded execution regardless of input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelBackend {
    Threads,
    Sequential,
}

impl ParallelBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParallelBackend::Threads => "threads",
            ParallelBackend::Sequential => "sequential",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "threads" | "thread" | "parallel" => Some(Self::Threads),
            "sequential" | "serial" => Some(Self::Sequential),
            _ => None,
        }
    }
}

impl Default for ParallelBackend {
    fn default() -> Self {
        Self::Threads
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker count; 0 lets the resource estimator decide.
    pub worker_count: usize,

    pub backend: ParallelBackend,

    /// Baseline items per chunk before the worker-based split is applied.
    pub chunk_size: usize,

    /// Inputs below this size always run sequentially.
    pub small_input_threshold: usize,

    /// Estimated per-worker footprint; 0 disables memory-based reduction.
    pub per_worker_memory_mb: u64,

    /// Share of total system memory the pool may claim.
    pub memory_cap_percent: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            backend: ParallelBackend::default(),
            chunk_size: 1000,
            small_input_threshold: 10_000,
            per_worker_memory_mb: 0,
            memory_cap_percent: 75.0,
        }
    }
}

impl FromIni for ExecutorConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "executor" {
            return None;
        }

        match key {
            "worker_count" => {
                match value.parse() {
                    Ok(count) => {
                        self.worker_count = count;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid worker_count: {}", value)
                    ))),
                }
            },
            "backend" => {
                match ParallelBackend::from_str(value) {
                    Some(backend) => {
                        self.backend = backend;
                        Some(Ok(()))
                    },
                    None => Some(Err(Error::Config(
                        format!("Invalid backend (must be 'threads' or 'sequential'): {}", value)
                    ))),
                }
            },
            "chunk_size" => {
                match value.parse() {
                    Ok(size) if size > 0 => {
                        self.chunk_size = size;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid chunk_size (must be > 0): {}", value)
                    ))),
                }
            },
            "small_input_threshold" => {
                match value.parse() {
                    Ok(threshold) => {
                        self.small_input_threshold = threshold;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid small_input_threshold: {}", value)
                    ))),
                }
            },
            "per_worker_memory_mb" => {
                match value.parse() {
                    Ok(mb) => {
                        self.per_worker_memory_mb = mb;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid per_worker_memory_mb: {}", value)
                    ))),
                }
            },
            "memory_cap_percent" => {
                match value.parse::<f64>() {
                    Ok(percent) if percent > 0.0 && percent <= 100.0 => {
                        self.memory_cap_percent = percent;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid memory_cap_percent (must be within (0, 100]): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config(
                "chunk_size must be greater than 0".to_string()
            ));
        }
        if !(self.memory_cap_percent > 0.0 && self.memory_cap_percent <= 100.0) {
            return Err(Error::Config(format!(
                "memory_cap_percent must be within (0, 100], got {}",
                self.memory_cap_percent
            )));
        }
        Ok(())
    }
}
