// medallion-core/src/domain/quality/firewall.rs

use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::quality::check::{
    CheckStatus, DatasetStats, QualityCheckResult, QualityReport, QualitySummary, ViolationDetail,
};
use crate::domain::quality::disposition::{DispositionSet, RowAction};
use crate::domain::quality::rules::{CHECKS, CheckContext, CheckDefinition, Findings, Violation};
use crate::domain::schema::registry::row_id_column;
use crate::domain::table::Datasets;

pub const DEFAULT_SAMPLE_SIZE: usize = 10;
pub const DEFAULT_COMPLETENESS_THRESHOLD: f64 = 0.95;

/// Report plus the row-level instructions the Silver transformer applies.
#[derive(Debug, Clone)]
pub struct FirewallOutcome {
    pub report: QualityReport,
    pub dispositions: DispositionSet,
}

/// Read-only observer of Bronze. It never modifies its inputs and never halts the
/// pipeline on its own: gating is the caller's decision.
#[derive(Debug, Clone)]
pub struct QualityFirewall {
    pub completeness_threshold: f64,
    pub sample_size: usize,
}

impl Default for QualityFirewall {
    fn default() -> Self {
        Self {
            completeness_threshold: DEFAULT_COMPLETENESS_THRESHOLD,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl QualityFirewall {
    pub fn new(completeness_threshold: f64, sample_size: usize) -> Self {
        Self {
            completeness_threshold,
            sample_size,
        }
    }

    pub fn run(&self, bronze: &Datasets, run_date: NaiveDate) -> FirewallOutcome {
        let ctx = CheckContext {
            datasets: bronze,
            run_date,
            completeness_threshold: self.completeness_threshold,
        };

        let mut dispositions = DispositionSet::new();
        let mut results = Vec::with_capacity(CHECKS.len());

        for def in &CHECKS {
            let findings = (def.evaluate)(&ctx);

            // 1. DISPOSITIONS (row-level only; check 7 has none)
            if def.disposition.can_fail() {
                for v in &findings.violations {
                    if let Some(row) = v.row {
                        dispositions.record(
                            &v.dataset,
                            row,
                            RowAction {
                                check_id: def.id,
                                disposition: def.disposition,
                                column: v.column.clone(),
                                reason: v.reason.clone(),
                            },
                        );
                    }
                }
            }

            // 2. EVIDENCE
            let result = self.result_for(def, bronze, findings);
            let icon = if result.status == CheckStatus::Pass { "✅" } else { "❌" };
            info!(
                "  {} Check {}: {} -> {:?} ({} issues)",
                icon, result.check_id, result.check_name, result.status, result.violations_found
            );
            results.push(result);
        }

        let summary = QualitySummary::from_results(&results);
        if summary.failed > 0 {
            warn!(
                "🚨 {}/{} checks failed, {} violations (advisory)",
                summary.failed, summary.total_checks, summary.total_violations
            );
        }

        let datasets_checked: BTreeMap<String, DatasetStats> = bronze
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    DatasetStats {
                        rows: t.num_rows(),
                        columns: t.num_columns(),
                    },
                )
            })
            .collect();

        FirewallOutcome {
            report: QualityReport {
                report_timestamp: Utc::now().to_rfc3339(),
                run_date,
                summary,
                datasets_checked,
                check_results: results,
            },
            dispositions,
        }
    }

    fn result_for(
        &self,
        def: &CheckDefinition,
        bronze: &Datasets,
        findings: Findings,
    ) -> QualityCheckResult {
        let violations_found = findings.violations.len();
        let status = if def.disposition.can_fail() && violations_found > 0 {
            CheckStatus::Fail
        } else {
            CheckStatus::Pass
        };

        let datasets = if def.datasets.is_empty() {
            bronze.keys().cloned().collect()
        } else {
            def.datasets.iter().map(|d| d.to_string()).collect()
        };

        let violation_details = findings
            .violations
            .iter()
            .take(self.sample_size)
            .map(|v| Self::detail(def, bronze, v))
            .collect();

        QualityCheckResult {
            check_id: def.id,
            check_name: def.name.to_string(),
            rule: def.rule.to_string(),
            datasets,
            total_rows_checked: findings.rows_checked,
            violations_found,
            status,
            action_on_failure: def.disposition.policy().to_string(),
            disposition: def.disposition,
            violation_details,
            column_metrics: findings.column_metrics,
        }
    }

    fn detail(def: &CheckDefinition, bronze: &Datasets, v: &Violation) -> ViolationDetail {
        let row_id = match (v.row, row_id_column(&v.dataset), bronze.get(&v.dataset)) {
            (Some(row), Some(col), Some(table)) => table.value(row, col).as_text(),
            _ => None,
        };
        ViolationDetail {
            source: v.dataset.clone(),
            row_index: v.row,
            row_id,
            column: v.column.clone(),
            value: v.value.clone().filter(|s| !s.is_empty()),
            reason: v.reason.clone(),
            action: def.disposition.action().to_string(),
        }
    }
}
