// src/blocking/keys.rs

use ahash::AHashSet;

use crate::config::subsystems::SecondaryBlockingMode;
use crate::types::Record;

/// Primary blocking key: the first name token outside the stop set, falling
/// back to the first token when every token is a stop token. Empty names
/// have no key and are never blocked.
pub fn primary_key(record: &Record, stop_tokens: &AHashSet<String>) -> Option<String> {
    let mut first = None;
    for token in record.name_tokens() {
        if first.is_none() {
            first = Some(token);
        }
        if !stop_tokens.contains(token) {
            return Some(token.to_string());
        }
    }
    first.map(|t| t.to_string())
}

/// Secondary key used to split oversized primary buckets into sub-buckets.
pub fn secondary_key(record: &Record, mode: SecondaryBlockingMode) -> String {
    match mode {
        SecondaryBlockingMode::FirstTwoTokens => {
            record.name_tokens().take(2).collect::<Vec<_>>().join(" ")
        }
        SecondaryBlockingMode::CharBigrams => bigram_signature(&record.name_core),
    }
}

/// Sorted, deduplicated character bigrams of the space-stripped name,
/// concatenated into one key. A partition key, not a multi-key index:
/// every record lands in exactly one sub-bucket.
fn bigram_signature(name: &str) -> String {
    let chars: Vec<char> = name.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.len() < 2 {
        return chars.iter().collect();
    }

    let mut bigrams: Vec<String> = chars.windows(2).map(|w| w.iter().collect()).collect();
    bigrams.sort_unstable();
    bigrams.dedup();
    bigrams.concat()
}
