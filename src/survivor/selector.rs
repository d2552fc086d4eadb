use log::debug;
use std::collections::BTreeMap;

use crate::config::subsystems::survivorship::{SelectionStrategy, SurvivorshipConfig};
use crate::error::{Error, Result};
use crate::types::Record;

/// Composite ordering key for primary selection. Lower compares first
/// and first wins. Tie-breaker values carry a missing flag so absent
/// values always lose to present ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RankingKey {
    rank: i32,
    breakers: Vec<(bool, String)>,
}

/// Marks exactly one record per duplicate group as the primary.
///
/// Both selection strategies produce identical flags; the fast path
/// just skips sorting for singleton groups, which dominate real runs.
pub struct PrimarySelector {
    config: SurvivorshipConfig,
}

impl PrimarySelector {
    pub fn new(config: &SurvivorshipConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// `group_ids` runs parallel to `records`; the sentinel group is
    /// skipped entirely and its rows are never primary.
    pub fn select(&self, records: &[Record], group_ids: &[i64]) -> Result<Vec<bool>> {
        if records.len() != group_ids.len() {
            return Err(Error::survivorship(format!(
                "group assignment length {} does not match record count {}",
                group_ids.len(),
                records.len()
            )));
        }

        let flags = match self.config.strategy {
            SelectionStrategy::SingletonFastPath => self.select_fast(records, group_ids)?,
            SelectionStrategy::FullSort => self.select_full_sort(records, group_ids)?,
        };

        debug!(
            "Primary selection ({}) marked {} of {} record(s)",
            self.config.strategy.as_str(),
            flags.iter().filter(|f| **f).count(),
            records.len()
        );
        Ok(flags)
    }

    fn select_fast(&self, records: &[Record], group_ids: &[i64]) -> Result<Vec<bool>> {
        let mut flags = vec![false; records.len()];
        let groups = self.collect_groups(group_ids)?;

        let mut singletons = 0usize;
        for indices in groups.into_values() {
            if indices.len() == 1 {
                flags[indices[0]] = true;
                singletons += 1;
                continue;
            }
            let mut keyed: Vec<(RankingKey, usize)> = indices
                .into_iter()
                .map(|idx| (self.ranking_key(&records[idx]), idx))
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            flags[keyed[0].1] = true;
        }

        debug!("Fast path promoted {} singleton group(s) without sorting", singletons);
        Ok(flags)
    }

    fn select_full_sort(&self, records: &[Record], group_ids: &[i64]) -> Result<Vec<bool>> {
        let mut flags = vec![false; records.len()];
        let mut rows: Vec<(i64, RankingKey, usize)> = Vec::with_capacity(records.len());
        for (idx, &group) in group_ids.iter().enumerate() {
            if group == self.config.sentinel_group {
                continue;
            }
            if group < 0 {
                return Err(unknown_group_error(group, self.config.sentinel_group));
            }
            rows.push((group, self.ranking_key(&records[idx]), idx));
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        // First row of each group wins.
        let mut current: Option<i64> = None;
        for (group, _, idx) in rows {
            if current != Some(group) {
                flags[idx] = true;
                current = Some(group);
            }
        }
        Ok(flags)
    }

    fn collect_groups(&self, group_ids: &[i64]) -> Result<BTreeMap<i64, Vec<usize>>> {
        let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &group) in group_ids.iter().enumerate() {
            if group == self.config.sentinel_group {
                continue;
            }
            if group < 0 {
                return Err(unknown_group_error(group, self.config.sentinel_group));
            }
            groups.entry(group).or_default().push(idx);
        }
        Ok(groups)
    }

    fn ranking_key(&self, record: &Record) -> RankingKey {
        let rank = self.config.rank_for(record.relationship.as_deref());
        let breakers = self
            .config
            .tie_breakers
            .iter()
            .map(|field| match record.field_value(field) {
                Some(value) => (false, value),
                None => (true, String::new()),
            })
            .collect();
        RankingKey { rank, breakers }
    }
}

fn unknown_group_error(group: i64, sentinel: i64) -> Error {
    Error::survivorship(format!(
        "negative group id {} is not the sentinel {}",
        group, sentinel
    ))
}
