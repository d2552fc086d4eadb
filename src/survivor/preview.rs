use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::subsystems::survivorship::SurvivorshipConfig;
use crate::error::{Error, Result};
use crate::types::Record;

/// One compared field across a group. `values` aligns with the
/// preview's `member_ids`; a missing value stays `None` and counts as
/// its own value when deciding whether the field conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    pub values: Vec<Option<String>>,
    pub conflict: bool,
}

/// Reviewer-facing summary of what a merge would fold together.
/// Produced only for groups with two or more members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePreview {
    pub group_id: i64,
    pub primary_id: String,
    pub member_ids: Vec<String>,
    pub fields: Vec<FieldComparison>,
    pub conflict_count: usize,
}

/// Builds merge previews from the selection output. Previews are
/// ordered by group id and list members in id order, so the report is
/// stable across runs.
pub struct PreviewBuilder {
    config: SurvivorshipConfig,
}

impl PreviewBuilder {
    pub fn new(config: &SurvivorshipConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// `group_ids` and `primary_flags` run parallel to `records`.
    /// Every multi-member group must carry exactly one primary flag.
    pub fn build(
        &self,
        records: &[Record],
        group_ids: &[i64],
        primary_flags: &[bool],
    ) -> Result<Vec<MergePreview>> {
        if records.len() != group_ids.len() || records.len() != primary_flags.len() {
            return Err(Error::survivorship(format!(
                "preview inputs disagree on length: {} record(s), {} group id(s), {} flag(s)",
                records.len(),
                group_ids.len(),
                primary_flags.len()
            )));
        }

        let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &group) in group_ids.iter().enumerate() {
            if group == self.config.sentinel_group {
                continue;
            }
            if group < 0 {
                return Err(Error::survivorship(format!(
                    "negative group id {} is not the sentinel {}",
                    group, self.config.sentinel_group
                )));
            }
            groups.entry(group).or_default().push(idx);
        }

        let mut previews = Vec::new();
        for (group, mut indices) in groups {
            if indices.len() < 2 {
                continue;
            }
            indices.sort_by(|&a, &b| records[a].id.cmp(&records[b].id));

            let primary_id = indices
                .iter()
                .find(|&&idx| primary_flags[idx])
                .map(|&idx| records[idx].id.clone())
                .ok_or_else(|| {
                    Error::survivorship(format!("group {} has no primary record", group))
                })?;

            let member_ids: Vec<String> =
                indices.iter().map(|&idx| records[idx].id.clone()).collect();

            let mut fields = Vec::with_capacity(self.config.preview_fields.len());
            let mut conflict_count = 0usize;
            for field in &self.config.preview_fields {
                let values: Vec<Option<String>> = indices
                    .iter()
                    .map(|&idx| records[idx].field_value(field))
                    .collect();
                let mut distinct: Vec<&Option<String>> = values.iter().collect();
                distinct.sort_unstable();
                distinct.dedup();
                let conflict = distinct.len() > 1;
                if conflict {
                    conflict_count += 1;
                }
                fields.push(FieldComparison {
                    field: field.clone(),
                    values,
                    conflict,
                });
            }

            previews.push(MergePreview {
                group_id: group,
                primary_id,
                member_ids,
                fields,
                conflict_count,
            });
        }

        debug!(
            "Built {} merge preview(s) over {} field(s)",
            previews.len(),
            self.config.preview_fields.len()
        );
        Ok(previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, name: &str, relationship: Option<&str>) -> Record {
        let mut rec = Record::new(id, name, "inc");
        rec.relationship = relationship.map(|r| r.to_string());
        rec
    }

    fn builder() -> PreviewBuilder {
        PreviewBuilder::new(&SurvivorshipConfig::default()).unwrap()
    }

    #[test]
    fn conflicting_field_is_flagged_with_aligned_values() {
        let records = vec![
            record("r1", "acme corp", None),
            record("r2", "acme corporation", None),
        ];
        let previews = builder()
            .build(&records, &[0, 0], &[true, false])
            .unwrap();

        assert_eq!(previews.len(), 1);
        let preview = &previews[0];
        assert_eq!(preview.group_id, 0);
        assert_eq!(preview.primary_id, "r1");
        assert_eq!(preview.member_ids, vec!["r1", "r2"]);

        let name = preview.fields.iter().find(|f| f.field == "name_core").unwrap();
        assert!(name.conflict);
        assert_eq!(
            name.values,
            vec![
                Some("acme corp".to_string()),
                Some("acme corporation".to_string())
            ]
        );

        let suffix = preview.fields.iter().find(|f| f.field == "suffix_class").unwrap();
        assert!(!suffix.conflict);
    }

    #[test]
    fn missing_value_counts_as_distinct() {
        let records = vec![
            record("r1", "acme corp", Some("parent")),
            record("r2", "acme corp", None),
        ];
        let previews = builder()
            .build(&records, &[0, 0], &[true, false])
            .unwrap();

        let relationship = previews[0]
            .fields
            .iter()
            .find(|f| f.field == "relationship")
            .unwrap();
        assert!(relationship.conflict);
        assert_eq!(
            relationship.values,
            vec![Some("parent".to_string()), None]
        );
    }

    #[test]
    fn all_missing_is_not_a_conflict() {
        let records = vec![
            record("r1", "acme corp", None),
            record("r2", "acme corp", None),
        ];
        let previews = builder()
            .build(&records, &[0, 0], &[true, false])
            .unwrap();

        let relationship = previews[0]
            .fields
            .iter()
            .find(|f| f.field == "relationship")
            .unwrap();
        assert!(!relationship.conflict);
        assert_eq!(previews[0].conflict_count, 0);
    }

    #[test]
    fn singletons_and_sentinel_rows_produce_no_preview() {
        let records = vec![
            record("r1", "acme corp", None),
            record("r2", "globex", None),
            record("r3", "initech", None),
        ];
        let previews = builder()
            .build(&records, &[0, -1, 1], &[true, false, true])
            .unwrap();
        assert!(previews.is_empty());
    }

    #[test]
    fn conflict_count_spans_all_compared_fields() {
        let mut first = record("r1", "acme corp", Some("parent"));
        first.created_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        let second = record("r2", "acme corporation", Some("subsidiary"));

        let previews = builder()
            .build(&[first, second], &[3, 3], &[false, true])
            .unwrap();

        // name_core, relationship and created_date differ; suffix_class does not.
        assert_eq!(previews[0].conflict_count, 3);
        assert_eq!(previews[0].primary_id, "r2");
    }

    #[test]
    fn group_without_primary_is_an_error() {
        let records = vec![
            record("r1", "acme corp", None),
            record("r2", "acme corp", None),
        ];
        let err = builder()
            .build(&records, &[0, 0], &[false, false])
            .unwrap_err();
        assert!(err.to_string().contains("no primary"));
    }
}
