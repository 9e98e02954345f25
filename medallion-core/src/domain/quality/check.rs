// medallion-core/src/domain/quality/check.rs
//
// Evidence types of the quality report. Produced once per run, never mutated.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::quality::disposition::Disposition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    AllPassed,
    IssuesDetected,
}

/// One sampled violation with the action resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViolationDetail {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub reason: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCompleteness {
    pub source: String,
    pub column: String,
    pub total_rows: usize,
    pub non_null_rows: usize,
    pub completeness_pct: f64,
    pub below_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityCheckResult {
    pub check_id: u8,
    pub check_name: String,
    pub rule: String,
    pub datasets: Vec<String>,
    pub total_rows_checked: usize,
    pub violations_found: usize,
    pub status: CheckStatus,
    pub action_on_failure: String,
    pub disposition: Disposition,
    pub violation_details: Vec<ViolationDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_metrics: Vec<ColumnCompleteness>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_violations: usize,
    pub overall_status: OverallStatus,
}

impl QualitySummary {
    pub fn from_results(results: &[QualityCheckResult]) -> Self {
        let passed = results
            .iter()
            .filter(|r| r.status == CheckStatus::Pass)
            .count();
        let failed = results.len() - passed;
        Self {
            total_checks: results.len(),
            passed,
            failed,
            total_violations: results.iter().map(|r| r.violations_found).sum(),
            overall_status: if failed == 0 {
                OverallStatus::AllPassed
            } else {
                OverallStatus::IssuesDetected
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub report_timestamp: String,
    pub run_date: NaiveDate,
    pub summary: QualitySummary,
    pub datasets_checked: BTreeMap<String, DatasetStats>,
    pub check_results: Vec<QualityCheckResult>,
}

impl QualityReport {
    pub fn result(&self, check_id: u8) -> Option<&QualityCheckResult> {
        self.check_results.iter().find(|r| r.check_id == check_id)
    }

    pub fn failed_checks(&self) -> Vec<String> {
        self.check_results
            .iter()
            .filter(|r| r.status == CheckStatus::Fail)
            .map(|r| format!("#{} {}", r.check_id, r.check_name))
            .collect()
    }

    pub fn has_issues(&self) -> bool {
        self.summary.overall_status == OverallStatus::IssuesDetected
    }
}
