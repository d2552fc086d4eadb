// src/exec/resources.rs

use std::fmt;

use log::debug;

use crate::config::subsystems::ExecutorConfig;

// Memory usage bands for diagnostics and worker sizing
const HIGH_MEMORY_THRESHOLD: f64 = 0.80;
const LOW_MEMORY_THRESHOLD: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    Low,
    Normal,
    High,
    Unknown,
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "Low"),
            MemoryPressure::Normal => write!(f, "Normal"),
            MemoryPressure::High => write!(f, "High"),
            MemoryPressure::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub avail_kb: u64,
}

impl MemoryInfo {
    pub fn used_fraction(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        1.0 - (self.avail_kb as f64 / self.total_kb as f64)
    }
}

/// Proposes worker counts and per-worker memory budgets from what the host
/// actually has. All estimates are advisory; explicit configuration wins.
#[derive(Debug, Clone, Default)]
pub struct ResourceEstimator;

impl ResourceEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Default worker proposal: leave two cores for the rest of the system,
    /// never fewer than one worker.
    pub fn cpu_workers(&self) -> usize {
        let cpu_count = num_cpus::get();
        cpu_count.min(cpu_count.saturating_sub(2).max(1))
    }

    pub fn memory_info(&self) -> Option<MemoryInfo> {
        match sys_info::mem_info() {
            Ok(info) => Some(MemoryInfo {
                total_kb: info.total,
                avail_kb: info.avail,
            }),
            Err(e) => {
                debug!("Could not get memory info: {}", e);
                None
            }
        }
    }

    pub fn pressure(&self) -> MemoryPressure {
        match self.memory_info() {
            Some(info) => {
                let used = info.used_fraction();
                if used > HIGH_MEMORY_THRESHOLD {
                    MemoryPressure::High
                } else if used < LOW_MEMORY_THRESHOLD {
                    MemoryPressure::Low
                } else {
                    MemoryPressure::Normal
                }
            }
            None => MemoryPressure::Unknown,
        }
    }

    /// Worker count for a run: the configured count when explicit, otherwise
    /// the CPU proposal, optionally reduced so that `workers *
    /// per_worker_memory_mb` stays inside the configured share of total
    /// memory.
    pub fn recommend_workers(&self, config: &ExecutorConfig) -> usize {
        if config.worker_count > 0 {
            return config.worker_count;
        }

        let mut workers = self.cpu_workers();

        if config.per_worker_memory_mb > 0 {
            if let Some(info) = self.memory_info() {
                let cap_mb = (info.total_kb / 1024) as f64 * (config.memory_cap_percent / 100.0);
                let by_memory = (cap_mb / config.per_worker_memory_mb as f64).floor() as usize;
                workers = workers.min(by_memory.max(1));
                debug!(
                    "Memory-capped workers: {} (cap {:.0} MB, {} MB per worker)",
                    workers, cap_mb, config.per_worker_memory_mb
                );
            } else {
                debug!("Could not get memory info; keeping CPU-based worker count");
            }
        }

        workers.max(1)
    }

    /// Even split of the memory cap across workers, in MB.
    pub fn memory_per_worker_mb(&self, config: &ExecutorConfig, workers: usize) -> Option<u64> {
        let info = self.memory_info()?;
        let cap_mb = (info.total_kb / 1024) as f64 * (config.memory_cap_percent / 100.0);
        Some((cap_mb / workers.max(1) as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::subsystems::ExecutorConfig;

    #[test]
    fn cpu_workers_is_at_least_one() {
        let estimator = ResourceEstimator::new();
        assert!(estimator.cpu_workers() >= 1);
        assert!(estimator.cpu_workers() <= num_cpus::get());
    }

    #[test]
    fn explicit_worker_count_wins() {
        let estimator = ResourceEstimator::new();
        let mut config = ExecutorConfig::default();
        config.worker_count = 7;
        assert_eq!(estimator.recommend_workers(&config), 7);
    }

    #[test]
    fn auto_workers_never_zero() {
        let estimator = ResourceEstimator::new();
        let mut config = ExecutorConfig::default();
        config.worker_count = 0;
        // Absurd footprint forces the memory cap to bite if mem_info works.
        config.per_worker_memory_mb = u64::MAX / 2;
        assert!(estimator.recommend_workers(&config) >= 1);
    }
}
