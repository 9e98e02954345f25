// medallion-core/src/application/assemble.rs

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::domain::error::DomainError;
use crate::domain::gold::{CustomerDimension, GoldAssembler, GoldHistory, GoldSummary, KeyAllocator};
use crate::domain::layer::Layer;
use crate::domain::schema::datasets::{
    DIM_CUSTOMER, DIM_DATE, DIM_PRODUCT, DIM_STORE, FACT_SALES, SURROGATE_KEYS, UNIFIED_SALES,
};
use crate::error::MedallionError;
use crate::ports::store::{LayerTable, TableStore};

pub const FACT_PARTITIONS: [&str; 2] = ["year", "month"];

/// Key allocations and customer versions carried over from the current Gold layer.
pub fn load_history(store: &dyn TableStore) -> Result<GoldHistory, MedallionError> {
    let keys = match store.read_table(Layer::Gold, SURROGATE_KEYS)? {
        Some(table) => KeyAllocator::from_table(&table)?,
        None => KeyAllocator::new(),
    };
    let customers = match store.read_table(Layer::Gold, DIM_CUSTOMER)? {
        Some(table) => CustomerDimension::from_table(&table)?,
        None => CustomerDimension::new(),
    };
    debug!(versions = customers.versions().len(), "Gold history loaded");
    Ok(GoldHistory { keys, customers })
}

/// Silver -> Gold star schema, swapped in as a whole.
#[instrument(skip_all, fields(run_date = %run_date))]
pub fn run_assemble(store: &dyn TableStore, run_date: NaiveDate) -> Result<GoldSummary, MedallionError> {
    let sales = store
        .read_table(Layer::Silver, UNIFIED_SALES)?
        .ok_or_else(|| DomainError::MissingDataset(UNIFIED_SALES.to_string()))?;

    let history = load_history(store)?;
    let gold = GoldAssembler::assemble(&sales, history, run_date)?;

    store.replace_layer(
        Layer::Gold,
        &[
            LayerTable::new(DIM_DATE, gold.dim_date),
            LayerTable::new(DIM_PRODUCT, gold.dim_product),
            LayerTable::new(DIM_STORE, gold.dim_store),
            LayerTable::new(DIM_CUSTOMER, gold.dim_customer),
            LayerTable::new(FACT_SALES, gold.fact_sales).partitioned(&FACT_PARTITIONS),
            LayerTable::new(SURROGATE_KEYS, gold.keys.to_table()?),
        ],
    )?;

    info!(
        "🥇 Gold built: {} facts, revenue {:.2}, customers +{} new / {} re-versioned",
        gold.summary.fact_rows,
        gold.summary.total_revenue,
        gold.summary.scd.inserted,
        gold.summary.scd.versioned
    );
    Ok(gold.summary)
}
