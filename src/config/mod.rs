pub mod subsystems;

use serde::{Serialize, Deserialize};
use std::path::Path;
use std::fs;
use log::{LevelFilter, trace, warn};
use crate::error::Result;

pub trait FromIni {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeConfig {
    pub blocking: subsystems::BlockingConfig,
    pub scoring: subsystems::ScoringConfig,
    pub clustering: subsystems::ClusteringConfig,
    pub survivorship: subsystems::SurvivorshipConfig,
    pub executor: subsystems::ExecutorConfig,

    /// Log level for the pipeline binary ("error".."trace" or "none").
    pub log_level: String,
}

impl DedupeConfig {
    pub fn validate(&self) -> Result<()> {
        self.blocking.validate()?;
        self.scoring.validate()?;
        self.clustering.validate()?;
        self.survivorship.validate()?;
        self.executor.validate()?;
        Ok(())
    }

    pub fn from_ini<P: AsRef<Path>>(path: P) -> Result<Self> {
        let absolute_path = std::fs::canonicalize(&path)
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        trace!("Loading configuration from: {:?}", absolute_path);

        let content = fs::read_to_string(&path)?;
        Self::from_ini_str(&content)
    }

    pub fn from_ini_str(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].to_string();
                trace!("  Line {}: Found section: [{}]", line_num + 1, current_section);
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                // Delegate to the appropriate subsystem config
                if let Some(result) = match current_section.as_str() {
                    "blocking" => config.blocking.from_ini_section(&current_section, key, value),
                    "scoring" => config.scoring.from_ini_section(&current_section, key, value),
                    "clustering" => config.clustering.from_ini_section(&current_section, key, value),
                    "survivorship" => config.survivorship.from_ini_section(&current_section, key, value),
                    "executor" => config.executor.from_ini_section(&current_section, key, value),
                    "pipeline" => config.set_pipeline_key(key, value),
                    // Handle nested sections
                    s if s.starts_with("survivorship.") => {
                        config.survivorship.from_ini_section(&current_section, key, value)
                    },
                    _ => None,
                } {
                    if let Err(e) = result {
                        warn!("Error processing config key {}={}: {}", key, value, e);
                    }
                } else {
                    warn!("Unrecognized config key: {}={} in section [{}]", key, value, current_section);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn set_pipeline_key(&mut self, key: &str, value: &str) -> Option<Result<()>> {
        match key {
            "log_level" => {
                let level = value.trim().to_lowercase();
                match level.as_str() {
                    "error" | "warn" | "info" | "debug" | "trace" | "none" => {
                        self.log_level = level;
                        Some(Ok(()))
                    },
                    _ => Some(Err(crate::error::Error::Config(format!(
                        "Invalid log level '{}'. Must be one of: none, error, warn, info, debug, trace",
                        value
                    )))),
                }
            },
            _ => None,
        }
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.log_level.trim().to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            "none" => LevelFilter::Off,
            _ => LevelFilter::Info,
        }
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            blocking: subsystems::BlockingConfig::default(),
            scoring: subsystems::ScoringConfig::default(),
            clustering: subsystems::ClusteringConfig::default(),
            survivorship: subsystems::SurvivorshipConfig::default(),
            executor: subsystems::ExecutorConfig::default(),
            log_level: "info".to_string(),
        }
    }
}
