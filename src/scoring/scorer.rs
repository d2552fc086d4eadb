// src/scoring/scorer.rs

use std::cmp::Ordering;

use log::info;

use crate::config::subsystems::ScoringConfig;
use crate::error::{Error, Result};
use crate::exec::{CancellationToken, ChunkObserver, Executor};
use crate::types::{Record, ScoredPair};
use super::ratios;

// Composite weights over the three similarity signals
const SORT_RATIO_WEIGHT: f64 = 0.45;
const SET_RATIO_WEIGHT: f64 = 0.35;
const JACCARD_WEIGHT: f64 = 20.0;

/// Scores candidate pairs with the composite fuzzy formula and the domain
/// penalties, then filters and orders them for downstream consumers.
pub struct PairScorer {
    config: ScoringConfig,
}

impl PairScorer {
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Composite score for one pair. Output ids are ordered so that
    /// `id_a < id_b`; every sub-score is symmetric, so the swap is safe.
    pub fn score_pair(&self, a: &Record, b: &Record) -> ScoredPair {
        let token_sort_ratio = ratios::token_sort_ratio(&a.name_core, &b.name_core);
        let token_set_ratio = ratios::token_set_ratio(&a.name_core, &b.name_core);
        let jaccard = ratios::jaccard(&a.name_core, &b.name_core);
        let suffix_match = a.suffix_class == b.suffix_class;
        let numeric_style_match = ratios::numeric_style_match(&a.name_core, &b.name_core);

        let mut base = SORT_RATIO_WEIGHT * token_sort_ratio
            + SET_RATIO_WEIGHT * token_set_ratio
            + JACCARD_WEIGHT * jaccard;
        if !suffix_match {
            base -= self.config.suffix_mismatch_penalty;
        }
        if !numeric_style_match {
            base -= self.config.numeric_style_penalty;
        }

        let score = base.clamp(0.0, 100.0).round();

        let (id_a, id_b) = if a.id <= b.id {
            (a.id.clone(), b.id.clone())
        } else {
            (b.id.clone(), a.id.clone())
        };

        ScoredPair {
            id_a,
            id_b,
            score,
            token_sort_ratio,
            token_set_ratio,
            jaccard,
            numeric_style_match,
            suffix_match,
            base_score: base,
        }
    }

    /// Scores candidate index pairs through the execution substrate, drops
    /// pairs below the medium threshold, and sorts the survivors by
    /// `(id_a, id_b, score desc)`.
    pub fn score_candidates(
        &self,
        records: &[Record],
        pairs: &[(usize, usize)],
        executor: &Executor,
        token: &CancellationToken,
    ) -> Result<Vec<ScoredPair>> {
        self.score_candidates_with(records, pairs, executor, token, None)
    }

    /// `score_candidates` with an optional per-chunk progress callback.
    pub fn score_candidates_with(
        &self,
        records: &[Record],
        pairs: &[(usize, usize)],
        executor: &Executor,
        token: &CancellationToken,
        observer: Option<ChunkObserver>,
    ) -> Result<Vec<ScoredPair>> {
        let threshold = self.config.medium_threshold;

        let mut scored = executor.map_chunks_with(pairs, token, observer, |chunk| {
            let mut out = Vec::with_capacity(chunk.len());
            for &(i, j) in chunk {
                let (a, b) = match (records.get(i), records.get(j)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(Error::Scoring(format!(
                            "candidate pair ({}, {}) out of bounds for {} records",
                            i,
                            j,
                            records.len()
                        )))
                    }
                };
                let pair = self.score_pair(a, b);
                if pair.score >= threshold {
                    out.push(pair);
                }
            }
            Ok(out)
        })?;

        sort_pairs(&mut scored);

        info!(
            "Scored {} candidate pairs, {} at or above threshold {}",
            pairs.len(),
            scored.len(),
            threshold
        );
        Ok(scored)
    }
}

/// Deterministic pairs-table order: `(id_a, id_b, score desc)`.
pub fn sort_pairs(pairs: &mut [ScoredPair]) {
    pairs.sort_by(|x, y| {
        x.id_a
            .cmp(&y.id_a)
            .then_with(|| x.id_b.cmp(&y.id_b))
            .then_with(|| y.score.partial_cmp(&x.score).unwrap_or(Ordering::Equal))
    });
}
