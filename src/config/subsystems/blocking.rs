// src/config/subsystems/blocking.rs

use ahash::AHashSet;
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

/// How oversized primary buckets are re-partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryBlockingMode {
    FirstTwoTokens,
    CharBigrams,
}

impl SecondaryBlockingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecondaryBlockingMode::FirstTwoTokens => "first_two_tokens",
            SecondaryBlockingMode::CharBigrams => "char_bigrams",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "first_two_tokens" => Some(Self::FirstTwoTokens),
            "char_bigrams" => Some(Self::CharBigrams),
            _ => None,
        }
    }
}

impl Default for SecondaryBlockingMode {
    fn default() -> Self {
        Self::FirstTwoTokens
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Tokens never used as a primary blocking key.
    pub stop_tokens: Vec<String>,

    /// Primary buckets above this size go through secondary blocking.
    pub block_cap: usize,

    pub secondary_mode: SecondaryBlockingMode,

    /// Length-difference prefilter inside oversized buckets.
    pub use_length_prefilter: bool,
    pub max_length_diff: usize,

    /// Hard ceiling on total emitted pairs; generation stops (with a
    /// warning) once it is crossed.
    pub pair_ceiling: usize,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            stop_tokens: vec!["inc".to_string(), "llc".to_string(), "ltd".to_string()],
            block_cap: 800,
            secondary_mode: SecondaryBlockingMode::default(),
            use_length_prefilter: true,
            max_length_diff: 5,
            pair_ceiling: 10_000_000,
        }
    }
}

impl FromIni for BlockingConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "blocking" {
            return None;
        }

        match key {
            "stop_tokens" => {
                self.stop_tokens = value
                    .split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                Some(Ok(()))
            },
            "block_cap" => {
                match value.parse() {
                    Ok(cap) if cap > 0 => {
                        self.block_cap = cap;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid block_cap (must be > 0): {}", value)
                    ))),
                }
            },
            "secondary_mode" => {
                match SecondaryBlockingMode::from_str(value) {
                    Some(mode) => {
                        self.secondary_mode = mode;
                        Some(Ok(()))
                    },
                    None => Some(Err(Error::Config(
                        format!("Invalid secondary_mode (must be 'first_two_tokens' or 'char_bigrams'): {}", value)
                    ))),
                }
            },
            "use_length_prefilter" => {
                match value.parse() {
                    Ok(flag) => {
                        self.use_length_prefilter = flag;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid use_length_prefilter value (must be true/false): {}", value)
                    ))),
                }
            },
            "max_length_diff" => {
                match value.parse() {
                    Ok(diff) => {
                        self.max_length_diff = diff;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid max_length_diff: {}", value)
                    ))),
                }
            },
            "pair_ceiling" => {
                match value.parse() {
                    Ok(ceiling) if ceiling > 0 => {
                        self.pair_ceiling = ceiling;
                        Some(Ok(()))
                    },
                    _ => Some(Err(Error::Config(
                        format!("Invalid pair_ceiling (must be > 0): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl BlockingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_cap == 0 {
            return Err(Error::Config(
                "block_cap must be greater than 0".to_string()
            ));
        }
        if self.pair_ceiling == 0 {
            return Err(Error::Config(
                "pair_ceiling must be greater than 0".to_string()
            ));
        }
        Ok(())
    }

    /// Stop tokens as a lowercase lookup set.
    pub fn stop_token_set(&self) -> AHashSet<String> {
        self.stop_tokens.iter().map(|t| t.to_lowercase()).collect()
    }
}
