// src/config/subsystems/scoring.rs

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Pairs scoring below this cutoff are discarded after scoring.
    pub medium_threshold: f64,

    /// Subtracted when the two suffix classes differ.
    pub suffix_mismatch_penalty: f64,

    /// Subtracted when the digits-space-digits styles disagree.
    pub numeric_style_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            medium_threshold: 84.0,
            suffix_mismatch_penalty: 25.0,
            numeric_style_penalty: 5.0,
        }
    }
}

impl FromIni for ScoringConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "scoring" {
            return None;
        }

        match key {
            "medium_threshold" => {
                match value.parse::<f64>() {
                    Ok(threshold) if (0.0..=100.0).contains(&threshold) => {
                        self.medium_threshold = threshold;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid medium_threshold (must be within [0, 100]): {}", value)
                    ))),
                }
            },
            "suffix_mismatch_penalty" => {
                match value.parse::<f64>() {
                    Ok(penalty) if penalty >= 0.0 => {
                        self.suffix_mismatch_penalty = penalty;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid suffix_mismatch_penalty (must be >= 0): {}", value)
                    ))),
                }
            },
            "numeric_style_penalty" => {
                match value.parse::<f64>() {
                    Ok(penalty) if penalty >= 0.0 => {
                        self.numeric_style_penalty = penalty;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid numeric_style_penalty (must be >= 0): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.medium_threshold) {
            return Err(Error::Config(format!(
                "medium_threshold must be within [0, 100], got {}",
                self.medium_threshold
            )));
        }
        if self.suffix_mismatch_penalty < 0.0 || !self.suffix_mismatch_penalty.is_finite() {
            return Err(Error::Config(format!(
                "suffix_mismatch_penalty must be a non-negative number, got {}",
                self.suffix_mismatch_penalty
            )));
        }
        if self.numeric_style_penalty < 0.0 || !self.numeric_style_penalty.is_finite() {
            return Err(Error::Config(format!(
                "numeric_style_penalty must be a non-negative number, got {}",
                self.numeric_style_penalty
            )));
        }
        Ok(())
    }
}
