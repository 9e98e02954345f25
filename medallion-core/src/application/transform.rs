// medallion-core/src/application/transform.rs

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use crate::application::quality::load_bronze;
use crate::domain::layer::Layer;
use crate::domain::project::PipelineConfig;
use crate::domain::quality::QualitySummary;
use crate::domain::schema::SchemaRegistry;
use crate::domain::schema::datasets::{QUARANTINE, SHIPMENTS, UNIFIED_SALES, WAREHOUSE_INVENTORY};
use crate::domain::silver::{CleaningStats, SilverTransformer};
use crate::error::MedallionError;
use crate::ports::store::{LayerTable, TableStore};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransformReport {
    pub unified_sales_rows: usize,
    pub quarantined_rows: usize,
    pub quality: QualitySummary,
    pub datasets: Vec<CleaningStats>,
}

/// Bronze -> Silver. The firewall is re-evaluated on the Bronze being read, so the
/// dispositions always match the rows they refer to. Bronze is never modified.
#[instrument(skip_all, fields(run_date = %run_date))]
pub fn run_transform(
    store: &dyn TableStore,
    config: &PipelineConfig,
    run_date: NaiveDate,
) -> Result<TransformReport, MedallionError> {
    let bronze = load_bronze(store)?;
    let outcome = config.firewall().run(&bronze, run_date);

    let transformer = SilverTransformer::new(config.silver(), SchemaRegistry::retail());
    let silver = transformer.transform(&bronze, &outcome)?;

    let report = TransformReport {
        unified_sales_rows: silver.unified_sales.num_rows(),
        quarantined_rows: silver.quarantine.num_rows(),
        quality: outcome.report.summary.clone(),
        datasets: silver.stats.clone(),
    };

    // Staged then swapped: a failure above leaves the previous Silver untouched.
    store.replace_layer(
        Layer::Silver,
        &[
            LayerTable::new(UNIFIED_SALES, silver.unified_sales),
            LayerTable::new(WAREHOUSE_INVENTORY, silver.warehouse_inventory),
            LayerTable::new(SHIPMENTS, silver.shipments),
            LayerTable::new(QUARANTINE, silver.quarantine),
        ],
    )?;

    info!(
        "🥈 Silver built: {} unified sales, {} quarantined",
        report.unified_sales_rows, report.quarantined_rows
    );
    Ok(report)
}
