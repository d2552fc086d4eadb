// src/blocking/generator.rs

use ahash::AHashMap;
use log::{debug, info, warn};
use serde::{Serialize, Deserialize};

use crate::config::subsystems::BlockingConfig;
use crate::error::Result;
use crate::exec::{CancellationToken, ChunkObserver, Executor};
use crate::types::Record;
use super::keys;

// Progress callback cadence over the bucket scan
const BUCKET_PROGRESS_EVERY: usize = 64;

/// Bucket-level diagnostics from one candidate-generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockStats {
    pub total_records: usize,
    /// Records with no usable blocking key; they produce no pairs at all.
    pub unblockable_records: usize,
    pub bucket_count: usize,
    pub oversized_buckets: usize,
    pub largest_bucket: usize,
    /// Pairs before and after deduplication.
    pub raw_pairs: usize,
    pub emitted_pairs: usize,
    /// True when the global pair ceiling stopped bucket processing early.
    pub truncated: bool,
}

/// Partitions records into blocking buckets and emits the deduplicated
/// candidate index pairs each bucket yields, bounded by the bucket cap and
/// the global pair ceiling.
pub struct CandidateGenerator {
    config: BlockingConfig,
}

impl CandidateGenerator {
    pub fn new(config: &BlockingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn generate(
        &self,
        records: &[Record],
        executor: &Executor,
        token: &CancellationToken,
    ) -> Result<(Vec<(usize, usize)>, BlockStats)> {
        self.generate_with(records, executor, token, None)
    }

    /// `generate` with an optional progress callback, invoked with
    /// `(buckets scanned, total buckets)` as the bucket scan advances.
    pub fn generate_with(
        &self,
        records: &[Record],
        executor: &Executor,
        token: &CancellationToken,
        observer: Option<ChunkObserver>,
    ) -> Result<(Vec<(usize, usize)>, BlockStats)> {
        let stop_tokens = self.config.stop_token_set();
        let mut stats = BlockStats {
            total_records: records.len(),
            ..Default::default()
        };

        // Primary partition; member order inside a bucket is record order.
        let mut buckets: AHashMap<String, Vec<usize>> = AHashMap::new();
        for (idx, record) in records.iter().enumerate() {
            match keys::primary_key(record, &stop_tokens) {
                Some(key) => buckets.entry(key).or_default().push(idx),
                None => stats.unblockable_records += 1,
            }
        }

        // Sorted key order keeps ceiling truncation and diagnostics stable
        // across runs.
        let mut ordered: Vec<(String, Vec<usize>)> = buckets.into_iter().collect();
        ordered.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        stats.bucket_count = ordered.len();
        stats.largest_bucket = ordered.iter().map(|(_, m)| m.len()).max().unwrap_or(0);

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for (scanned, (key, members)) in ordered.iter().enumerate() {
            if token.is_cancelled() {
                debug!("Cancellation observed during blocking; stopping bucket scan");
                break;
            }
            if pairs.len() > self.config.pair_ceiling {
                warn!(
                    "Pair ceiling of {} exceeded ({} pairs emitted); skipping remaining buckets",
                    self.config.pair_ceiling,
                    pairs.len()
                );
                stats.truncated = true;
                break;
            }
            if let Some(observe) = observer {
                if (scanned + 1) % BUCKET_PROGRESS_EVERY == 0 {
                    observe(scanned + 1, ordered.len());
                }
            }
            if members.len() <= 1 {
                continue;
            }

            if members.len() <= self.config.block_cap {
                emit_combinations(members, &mut pairs);
            } else {
                stats.oversized_buckets += 1;
                debug!(
                    "Bucket '{}' has {} members (cap {}); applying secondary blocking",
                    key,
                    members.len(),
                    self.config.block_cap
                );
                self.emit_oversized(records, members, executor, token, &mut pairs)?;
            }
        }

        stats.raw_pairs = pairs.len();

        // Pair identity is the unordered index combination.
        pairs.sort_unstable();
        pairs.dedup();
        stats.emitted_pairs = pairs.len();

        info!(
            "Blocking: {} buckets ({} oversized), {} candidate pairs, {} unblockable records",
            stats.bucket_count, stats.oversized_buckets, stats.emitted_pairs, stats.unblockable_records
        );
        Ok((pairs, stats))
    }

    /// Re-partitions an oversized bucket by the secondary key and emits each
    /// sub-bucket through the substrate. Sub-bucket order is preserved, so
    /// the concatenated output is stable.
    fn emit_oversized(
        &self,
        records: &[Record],
        members: &[usize],
        executor: &Executor,
        token: &CancellationToken,
        pairs: &mut Vec<(usize, usize)>,
    ) -> Result<()> {
        let mut sub_buckets: AHashMap<String, Vec<usize>> = AHashMap::new();
        for &idx in members {
            let key = keys::secondary_key(&records[idx], self.config.secondary_mode);
            sub_buckets.entry(key).or_default().push(idx);
        }

        let mut ordered: Vec<(String, Vec<usize>)> = sub_buckets.into_iter().collect();
        ordered.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let sub_members: Vec<Vec<usize>> = ordered.into_iter().map(|(_, m)| m).collect();

        let emitted = executor.map_items(&sub_members, token, |sub| {
            Ok(self.filtered_combinations(records, sub))
        })?;

        for chunk in emitted {
            pairs.extend(chunk);
        }
        Ok(())
    }

    /// Pairwise combinations inside a sub-bucket, with the optional
    /// length-difference prefilter applied first.
    fn filtered_combinations(&self, records: &[Record], members: &[usize]) -> Vec<(usize, usize)> {
        if members.len() <= 1 {
            return Vec::new();
        }

        let lens: Vec<usize> = members
            .iter()
            .map(|&idx| records[idx].name_core.chars().count())
            .collect();

        let mut out = Vec::new();
        for i in 0..members.len() {
            for j in i + 1..members.len() {
                if self.config.use_length_prefilter {
                    let diff = lens[i].abs_diff(lens[j]);
                    if diff > self.config.max_length_diff {
                        continue;
                    }
                }
                out.push((members[i], members[j]));
            }
        }
        out
    }
}

fn emit_combinations(members: &[usize], out: &mut Vec<(usize, usize)>) {
    for i in 0..members.len() {
        for j in i + 1..members.len() {
            out.push((members[i], members[j]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::subsystems::{BlockingConfig, ExecutorConfig, ParallelBackend, SecondaryBlockingMode};
    use crate::exec::{CancellationToken, Executor};
    use crate::types::Record;

    fn sequential_executor() -> Executor {
        let mut config = ExecutorConfig::default();
        config.worker_count = 1;
        config.backend = ParallelBackend::Sequential;
        Executor::new(&config)
    }

    fn generate(
        config: &BlockingConfig,
        records: &[Record],
    ) -> (Vec<(usize, usize)>, BlockStats) {
        let generator = CandidateGenerator::new(config).unwrap();
        let executor = sequential_executor();
        let token = CancellationToken::new();
        generator.generate(records, &executor, &token).unwrap()
    }

    #[test]
    fn same_bucket_records_pair_up() {
        let records = vec![
            Record::new("r1", "acme corp", "CORP"),
            Record::new("r2", "acme corporation", "CORP"),
            Record::new("r3", "zenith labs", "LLC"),
        ];
        let (pairs, stats) = generate(&BlockingConfig::default(), &records);
        assert_eq!(pairs, vec![(0, 1)]);
        assert_eq!(stats.bucket_count, 2);
        assert_eq!(stats.emitted_pairs, 1);
        assert!(!stats.truncated);
    }

    #[test]
    fn empty_names_are_unblockable() {
        let records = vec![
            Record::new("r1", "", "NONE"),
            Record::new("r2", "acme corp", "CORP"),
        ];
        let (pairs, stats) = generate(&BlockingConfig::default(), &records);
        assert!(pairs.is_empty());
        assert_eq!(stats.unblockable_records, 1);
    }

    #[test]
    fn all_stop_token_names_share_the_fallback_bucket() {
        let records = vec![
            Record::new("r1", "inc llc", "NONE"),
            Record::new("r2", "inc ltd", "NONE"),
        ];
        let (pairs, _) = generate(&BlockingConfig::default(), &records);
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn oversized_buckets_split_by_secondary_key() {
        let mut config = BlockingConfig::default();
        config.block_cap = 2;
        config.secondary_mode = SecondaryBlockingMode::FirstTwoTokens;

        let records = vec![
            Record::new("r1", "acme corp east", "CORP"),
            Record::new("r2", "acme corp west", "CORP"),
            Record::new("r3", "acme labs north", "LLC"),
            Record::new("r4", "acme labs south", "LLC"),
        ];
        let (pairs, stats) = generate(&config, &records);
        assert_eq!(pairs, vec![(0, 1), (2, 3)]);
        assert_eq!(stats.oversized_buckets, 1);
    }

    #[test]
    fn length_prefilter_drops_distant_pairs() {
        let mut config = BlockingConfig::default();
        config.block_cap = 1;
        config.secondary_mode = SecondaryBlockingMode::FirstTwoTokens;

        let records = vec![
            Record::new("r1", "acme corp", "CORP"),
            Record::new("r2", "acme corp international holdings division", "CORP"),
        ];
        let (pairs, _) = generate(&config, &records);
        assert!(pairs.is_empty());

        config.use_length_prefilter = false;
        let (pairs, _) = generate(&config, &records);
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn pair_ceiling_truncates_bucket_scan() {
        let mut config = BlockingConfig::default();
        config.pair_ceiling = 1;

        // Three buckets in sorted key order: alpha, beta, gamma
        let records = vec![
            Record::new("r1", "alpha one", "NONE"),
            Record::new("r2", "alpha two", "NONE"),
            Record::new("r3", "alpha three", "NONE"),
            Record::new("r4", "beta one", "NONE"),
            Record::new("r5", "beta two", "NONE"),
            Record::new("r6", "gamma one", "NONE"),
            Record::new("r7", "gamma two", "NONE"),
        ];
        let (pairs, stats) = generate(&config, &records);
        // The alpha bucket finishes (3 pairs), then the scan stops.
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert!(stats.truncated);
    }

    #[test]
    fn pairs_are_unique_and_ordered() {
        let records: Vec<Record> = (0..20)
            .map(|i| Record::new(format!("r{:02}", i), format!("acme unit{}", i), "NONE"))
            .collect();
        let (pairs, _) = generate(&BlockingConfig::default(), &records);
        assert_eq!(pairs.len(), 190); // C(20,2)
        for window in pairs.windows(2) {
            assert!(window[0] < window[1]);
        }
        for &(a, b) in &pairs {
            assert!(a < b);
        }
    }

    #[test]
    fn bucket_scan_reports_progress() {
        let records: Vec<Record> = (0..130)
            .map(|i| Record::new(format!("r{:03}", i), format!("token{:03} corp", i), "NONE"))
            .collect();

        let generator = CandidateGenerator::new(&BlockingConfig::default()).unwrap();
        let executor = sequential_executor();
        let token = CancellationToken::new();

        let seen = std::sync::Mutex::new(Vec::new());
        let observe = |done: usize, total: usize| {
            seen.lock().unwrap().push((done, total));
        };
        let observer: crate::exec::ChunkObserver = &observe;

        generator
            .generate_with(&records, &executor, &token, Some(observer))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(64, 130), (128, 130)]);
    }
}
