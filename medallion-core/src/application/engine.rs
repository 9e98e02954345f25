// medallion-core/src/application/engine.rs

use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::domain::layer::Layer;
use crate::domain::query::ReadOnlyGuard;
use crate::error::MedallionError;
use crate::infrastructure::adapters::parquet::ParquetStore;
use crate::ports::connector::{Connector, QueryResult};
use crate::ports::store::TableStore;

/// Exposes every Gold table as a view named after it. Returns the view names.
pub async fn register_gold_views(
    connector: &dyn Connector,
    store: &ParquetStore,
) -> Result<Vec<String>, MedallionError> {
    let tables = store.list_tables(Layer::Gold)?;
    for table in &tables {
        connector
            .register_table(table, &store.parquet_glob(Layer::Gold, table))
            .await?;
        let columns = connector.fetch_columns(table).await?;
        debug!(view = %table, columns = columns.len(), "View registered");
    }
    info!(engine = connector.engine_name(), views = tables.len(), "🔌 Gold views registered");
    Ok(tables)
}

/// Exécute une requête SQL en lecture seule avec instrumentation (Logs + Timing).
/// Anything but a single query is refused before it reaches the engine.
#[instrument(skip(connector), fields(query.len = query.len()))]
pub async fn execute_query(
    connector: &dyn Connector,
    query: &str,
) -> Result<QueryResult, MedallionError> {
    ReadOnlyGuard::check(query)?;

    let start = Instant::now();
    debug!("⚡ Executing Query: {}", query);

    let result = connector.query(query).await;
    let duration = start.elapsed();

    match result {
        Ok(rows) => {
            debug!("✅ Query finished in {:.2?} ({} rows)", duration, rows.rows.len());
            Ok(rows)
        }
        Err(e) => {
            error!("❌ Query failed after {:.2?}: {}", duration, e);
            Err(e)
        }
    }
}
