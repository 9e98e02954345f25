// medallion-core/src/domain/quality/disposition.rs

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What the Silver transformer does with a row that violated a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    Quarantine,
    Reject,
    FillSentinel,
    DropDuplicate,
    RejectOrphan,
    FlagOutlier,
    ReportOnly,
}

impl Disposition {
    /// Policy wording used in `action_on_failure`.
    pub fn policy(&self) -> &'static str {
        match self {
            Disposition::Quarantine => "Quarantine row",
            Disposition::Reject => "Reject row",
            Disposition::FillSentinel => "Fill 'UNKNOWN'",
            Disposition::DropDuplicate => "Drop duplicate",
            Disposition::RejectOrphan => "Reject orphan",
            Disposition::FlagOutlier => "Flag outlier",
            Disposition::ReportOnly => "Report metric",
        }
    }

    /// Resolved action attached to each sampled violation.
    pub fn action(&self) -> &'static str {
        match self {
            Disposition::Quarantine => "QUARANTINE",
            Disposition::Reject => "REJECT",
            Disposition::FillSentinel => "FILL 'UNKNOWN'",
            Disposition::DropDuplicate => "DROP DUPLICATE",
            Disposition::RejectOrphan => "REJECT ORPHAN",
            Disposition::FlagOutlier => "FLAG OUTLIER",
            Disposition::ReportOnly => "REPORT METRIC",
        }
    }

    /// Row leaves the pipeline and goes to quarantine.
    pub fn excludes_row(&self) -> bool {
        matches!(
            self,
            Disposition::Quarantine | Disposition::Reject | Disposition::RejectOrphan
        )
    }

    /// Row stays but is modified in place.
    pub fn repairs_row(&self) -> bool {
        matches!(self, Disposition::FillSentinel | Disposition::FlagOutlier)
    }

    /// A violation under this disposition fails the check.
    pub fn can_fail(&self) -> bool {
        !matches!(self, Disposition::ReportOnly)
    }
}

/// One instruction for one Bronze row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowAction {
    pub check_id: u8,
    pub disposition: Disposition,
    pub column: Option<String>,
    pub reason: String,
}

/// Row-level instructions produced by the firewall, keyed by dataset then Bronze row index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispositionSet {
    by_dataset: BTreeMap<String, BTreeMap<usize, Vec<RowAction>>>,
}

impl DispositionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dataset: &str, row: usize, action: RowAction) {
        self.by_dataset
            .entry(dataset.to_string())
            .or_default()
            .entry(row)
            .or_default()
            .push(action);
    }

    pub fn actions(&self, dataset: &str, row: usize) -> &[RowAction] {
        self.by_dataset
            .get(dataset)
            .and_then(|rows| rows.get(&row))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn rows_where<F>(&self, dataset: &str, pred: F) -> BTreeSet<usize>
    where
        F: Fn(&RowAction) -> bool,
    {
        self.by_dataset
            .get(dataset)
            .map(|rows| {
                rows.iter()
                    .filter(|(_, actions)| actions.iter().any(&pred))
                    .map(|(row, _)| *row)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn duplicates(&self, dataset: &str) -> BTreeSet<usize> {
        self.rows_where(dataset, |a| a.disposition == Disposition::DropDuplicate)
    }

    pub fn exclusions(&self, dataset: &str) -> BTreeSet<usize> {
        self.rows_where(dataset, |a| a.disposition.excludes_row())
    }

    pub fn outliers(&self, dataset: &str) -> BTreeSet<usize> {
        self.rows_where(dataset, |a| a.disposition == Disposition::FlagOutlier)
    }

    /// (row, column) pairs to fill with the sentinel.
    pub fn fills(&self, dataset: &str) -> Vec<(usize, String)> {
        self.by_dataset
            .get(dataset)
            .map(|rows| {
                rows.iter()
                    .flat_map(|(row, actions)| {
                        actions
                            .iter()
                            .filter(|a| a.disposition == Disposition::FillSentinel)
                            .filter_map(move |a| a.column.clone().map(|c| (*row, c)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct rows touched by a given check.
    pub fn count_for_check(&self, check_id: u8) -> usize {
        self.by_dataset
            .values()
            .flat_map(|rows| rows.values())
            .filter(|actions| actions.iter().any(|a| a.check_id == check_id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dataset.is_empty()
    }
}
