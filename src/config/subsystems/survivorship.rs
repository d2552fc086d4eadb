// src/config/subsystems/survivorship.rs

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

/// Which of the two equivalent primary-selection paths to run. Outputs are
/// identical; the split exists for the singleton-heavy common case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    SingletonFastPath,
    FullSort,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::SingletonFastPath => "singleton_fast_path",
            SelectionStrategy::FullSort => "full_sort",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "singleton_fast_path" | "fast" => Some(Self::SingletonFastPath),
            "full_sort" | "sort" => Some(Self::FullSort),
            _ => None,
        }
    }
}

impl Default for SelectionStrategy {
    fn default() -> Self {
        Self::SingletonFastPath
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivorshipConfig {
    /// Relationship value -> rank; lower ranks win primary selection.
    pub relationship_ranks: BTreeMap<String, i32>,

    /// Rank used for relationships absent from the table (and for records
    /// with no relationship at all).
    pub default_relationship_rank: i32,

    /// Field names compared after the relationship rank, in order.
    pub tie_breakers: Vec<String>,

    /// Group id marking unassigned records; always negative, never primary.
    pub sentinel_group: i64,

    pub strategy: SelectionStrategy,

    /// Fields compared in merge previews.
    pub preview_fields: Vec<String>,
}

impl Default for SurvivorshipConfig {
    fn default() -> Self {
        Self {
            relationship_ranks: BTreeMap::new(),
            default_relationship_rank: 60,
            tie_breakers: vec!["created_date".to_string(), "id".to_string()],
            sentinel_group: -1,
            strategy: SelectionStrategy::default(),
            preview_fields: vec![
                "name_core".to_string(),
                "suffix_class".to_string(),
                "relationship".to_string(),
                "created_date".to_string(),
            ],
        }
    }
}

impl FromIni for SurvivorshipConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        // The nested [survivorship.ranks] section carries the rank table:
        // every key is a relationship value, every value its rank.
        if section_name == "survivorship.ranks" {
            return match value.parse::<i32>() {
                Ok(rank) => {
                    self.relationship_ranks.insert(key.to_lowercase(), rank);
                    Some(Ok(()))
                },
                Err(_) => Some(Err(Error::Config(
                    format!("Invalid rank for relationship '{}': {}", key, value)
                ))),
            };
        }

        if section_name != "survivorship" {
            return None;
        }

        match key {
            "default_relationship_rank" => {
                match value.parse() {
                    Ok(rank) => {
                        self.default_relationship_rank = rank;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid default_relationship_rank: {}", value)
                    ))),
                }
            },
            "tie_breakers" => {
                self.tie_breakers = value
                    .split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
                Some(Ok(()))
            },
            "sentinel_group" => {
                match value.parse() {
                    Ok(id) => {
                        self.sentinel_group = id;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid sentinel_group: {}", value)
                    ))),
                }
            },
            "strategy" => {
                match SelectionStrategy::from_str(value) {
                    Some(strategy) => {
                        self.strategy = strategy;
                        Some(Ok(()))
                    },
                    None => Some(Err(Error::Config(
                        format!("Invalid strategy (must be 'singleton_fast_path' or 'full_sort'): {}", value)
                    ))),
                }
            },
            "preview_fields" => {
                self.preview_fields = value
                    .split(',')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
                Some(Ok(()))
            },
            _ => None,
        }
    }
}

impl SurvivorshipConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sentinel_group >= 0 {
            return Err(Error::Config(format!(
                "sentinel_group must be negative so it cannot collide with cluster ids, got {}",
                self.sentinel_group
            )));
        }
        Ok(())
    }

    pub fn rank_for(&self, relationship: Option<&str>) -> i32 {
        relationship
            .and_then(|r| self.relationship_ranks.get(&r.to_lowercase()))
            .copied()
            .unwrap_or(self.default_relationship_rank)
    }
}
