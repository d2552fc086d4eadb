use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Serialize, Deserialize};

/// Normalized input entity. Produced upstream by the normalizer; read-only
/// to every stage in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// Canonical matching name, lowercase tokens separated by single spaces.
    pub name_core: String,
    /// Legal-suffix category ("INC", "LLC", ...) or "NONE".
    pub suffix_class: String,
    pub relationship: Option<String>,
    pub created_date: Option<NaiveDate>,
    /// Pass-through columns kept for survivorship tie-breakers and previews.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        name_core: impl Into<String>,
        suffix_class: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name_core: name_core.into(),
            suffix_class: suffix_class.into(),
            relationship: None,
            created_date: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn name_tokens(&self) -> impl Iterator<Item = &str> {
        self.name_core.split_whitespace()
    }

    /// Field access by column name, covering the fixed schema and the
    /// pass-through attributes. Dates render in ISO-8601.
    pub fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "name_core" => Some(self.name_core.clone()),
            "suffix_class" => Some(self.suffix_class.clone()),
            "relationship" => self.relationship.clone(),
            "created_date" => self.created_date.map(|d| d.to_string()),
            other => self.attributes.get(other).cloned(),
        }
    }
}

/// One scored candidate pair, `id_a < id_b` lexicographically. Serialized
/// field names follow the downstream pairs-table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub id_a: String,
    pub id_b: String,
    pub score: f64,
    #[serde(rename = "ratio_name")]
    pub token_sort_ratio: f64,
    #[serde(rename = "ratio_set")]
    pub token_set_ratio: f64,
    pub jaccard: f64,
    #[serde(rename = "num_style_match")]
    pub numeric_style_match: bool,
    pub suffix_match: bool,
    pub base_score: f64,
}

impl ScoredPair {
    /// Pair similarity on the [0,1] scale the clustering engine consumes.
    pub fn similarity(&self) -> f64 {
        self.score / 100.0
    }

    pub fn to_edge(&self) -> SimilarityEdge {
        SimilarityEdge {
            id_a: self.id_a.clone(),
            id_b: self.id_b.clone(),
            similarity: self.similarity(),
        }
    }
}

/// Weighted undirected edge in the similarity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub id_a: String,
    pub id_b: String,
    pub similarity: f64,
}

impl SimilarityEdge {
    pub fn new(id_a: impl Into<String>, id_b: impl Into<String>, similarity: f64) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.into(),
            similarity,
        }
    }
}
