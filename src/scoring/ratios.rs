// src/scoring/ratios.rs
//
// Fuzzy-ratio primitives for pair scoring. All ratios are built on
// normalized Levenshtein similarity scaled to [0, 100]; token-based
// variants normalize token order and token multiplicity first.

use std::collections::BTreeSet;

use ahash::AHashSet;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMERIC_STYLE: Regex = Regex::new(r"\d+\s+\d+").unwrap();
}

/// Levenshtein similarity as a percentage: `(1 - dist/max_len) * 100`.
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Ratio over the space-joined, lexicographically sorted token sequences,
/// making the comparison order-insensitive.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    levenshtein_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Duplicate-insensitive token-set ratio: compares the sorted intersection
/// against each side's intersection-plus-remainder and the two full sides
/// against each other, taking the best.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection = tokens_a
        .intersection(&tokens_b)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let only_a = tokens_a
        .difference(&tokens_b)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let only_b = tokens_b
        .difference(&tokens_a)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let combined_a = join_nonempty(&intersection, &only_a);
    let combined_b = join_nonempty(&intersection, &only_b);

    levenshtein_ratio(&intersection, &combined_a)
        .max(levenshtein_ratio(&intersection, &combined_b))
        .max(levenshtein_ratio(&combined_a, &combined_b))
}

/// Token Jaccard overlap in [0, 1]; 0 when either side has no tokens.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: AHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: AHashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.len() + tokens_b.len() - intersection;
    intersection as f64 / union as f64
}

/// First digits-space-digits occurrence in the name, if any ("20 20").
pub fn numeric_style(s: &str) -> Option<&str> {
    NUMERIC_STYLE.find(s).map(|m| m.as_str())
}

/// Styles match when both names lack the pattern, or both carry the same
/// one. Exactly one side carrying it, or differing patterns, is a mismatch.
pub fn numeric_style_match(a: &str, b: &str) -> bool {
    match (numeric_style(a), numeric_style(b)) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_nonempty(head: &str, tail: &str) -> String {
    if head.is_empty() {
        tail.to_string()
    } else if tail.is_empty() {
        head.to_string()
    } else {
        format!("{} {}", head, tail)
    }
}
