// medallion-core/src/application/quality.rs

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::domain::error::DomainError;
use crate::domain::layer::Layer;
use crate::domain::quality::{FirewallOutcome, QualityFirewall};
use crate::domain::schema::datasets::BRONZE;
use crate::domain::table::Datasets;
use crate::error::MedallionError;
use crate::infrastructure::fs::atomic_write;
use crate::ports::store::TableStore;

pub const REPORT_DIR: &str = "quality";
pub const REPORT_FILE: &str = "data_quality_report.json";

pub fn report_path(data_root: &Path) -> PathBuf {
    data_root.join(REPORT_DIR).join(REPORT_FILE)
}

/// Every Bronze dataset that exists. Fails only when Bronze is entirely empty.
pub fn load_bronze(store: &dyn TableStore) -> Result<Datasets, MedallionError> {
    let mut bronze = Datasets::new();
    for dataset in BRONZE {
        match store.read_table(Layer::Bronze, dataset)? {
            Some(table) => {
                bronze.insert(dataset.to_string(), table);
            }
            None => warn!(dataset, "Bronze dataset not ingested yet"),
        }
    }
    if bronze.is_empty() {
        return Err(DomainError::MissingDataset("bronze".to_string()).into());
    }
    Ok(bronze)
}

/// Runs the firewall over Bronze and publishes the JSON report.
/// Issues never fail this stage: the report is evidence, not a gate.
#[instrument(skip(store, firewall), fields(run_date = %run_date))]
pub fn run_quality_check(
    store: &dyn TableStore,
    data_root: &Path,
    firewall: &QualityFirewall,
    run_date: NaiveDate,
) -> Result<FirewallOutcome, MedallionError> {
    let bronze = load_bronze(store)?;
    let outcome = firewall.run(&bronze, run_date);

    let json = serde_json::to_string_pretty(&outcome.report)
        .map_err(crate::infrastructure::error::InfrastructureError::from)?;
    let path = report_path(data_root);
    atomic_write(&path, json)?;

    let summary = &outcome.report.summary;
    info!(
        "🛡️  Quality report: {}/{} checks passed, {} violations -> {}",
        summary.passed,
        summary.total_checks,
        summary.total_violations,
        path.display()
    );
    Ok(outcome)
}
