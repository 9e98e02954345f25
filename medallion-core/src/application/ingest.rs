// medallion-core/src/application/ingest.rs

use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::path::Path;
use tracing::{info, instrument};

use crate::application::retry::{AttemptOutcome, RetryPolicy, with_retry};
use crate::domain::layer::Layer;
use crate::domain::project::{Feed, PipelineConfig, SourceConfig};
use crate::domain::schema::{SchemaRegistry, SchemaValidator, ValidatedBatch, ValidationMode};
use crate::error::MedallionError;
use crate::infrastructure::ingest_log::{IngestionLog, IngestionLogEntry, IngestionStatus};
use crate::ports::source::SourceReader;
use crate::ports::store::{LayerTable, TableStore};

pub const RAW_DIR: &str = "raw";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestReport {
    pub feed: Feed,
    pub dataset: String,
    pub rows: usize,
    pub columns: usize,
    pub attempts: u32,
    pub warnings: Vec<String>,
}

/// Everything one ingestor needs, borrowed from the caller.
pub struct IngestContext<'a> {
    pub reader: &'a dyn SourceReader,
    pub store: &'a dyn TableStore,
    pub registry: &'a SchemaRegistry,
    pub mode: ValidationMode,
    pub policy: RetryPolicy,
    pub log: &'a IngestionLog,
    pub raw_dir: &'a Path,
}

/// Raw file -> validated table -> `bronze/<dataset>`, retried as one unit.
#[instrument(skip_all, fields(dataset = %source.dataset))]
pub async fn ingest_source(
    source: &SourceConfig,
    ctx: &IngestContext<'_>,
) -> Result<IngestReport, MedallionError> {
    let descriptor = ctx.registry.get(&source.dataset)?;
    let raw_path = ctx.raw_dir.join(&source.path);
    let destination = ctx.store.layer_path(Layer::Bronze).join(&source.dataset);

    let entry = |attempt: u32, status: IngestionStatus| IngestionLogEntry {
        timestamp: Utc::now().to_rfc3339(),
        feed: source.feed,
        dataset: source.dataset.clone(),
        source: raw_path.display().to_string(),
        destination: destination.display().to_string(),
        attempt,
        rows: 0,
        columns: 0,
        status,
        warnings: Vec::new(),
        error: None,
    };

    let mut log_failure: Option<MedallionError> = None;
    let mut attempts = 0;

    // Copies of the borrowed pieces, so each attempt's future owns its inputs.
    let (reader, store, mode) = (ctx.reader, ctx.store, ctx.mode);
    let (path, format, dataset) = (raw_path.as_path(), source.format(), source.dataset.as_str());

    let batch = with_retry(
        &ctx.policy,
        move |_attempt| async move {
            let raw = reader.read(path, format).await?;
            let batch = SchemaValidator::validate(&raw, descriptor, mode)?;
            store.write_table(Layer::Bronze, &LayerTable::new(dataset, batch.table.clone()))?;
            Ok::<ValidatedBatch, MedallionError>(batch)
        },
        |attempt, outcome| {
            attempts = attempt;
            let record = match outcome {
                AttemptOutcome::Succeeded(batch) => IngestionLogEntry {
                    rows: batch.table.num_rows(),
                    columns: batch.table.num_columns(),
                    warnings: batch.warnings.iter().map(|w| w.to_string()).collect(),
                    ..entry(attempt, IngestionStatus::Success)
                },
                AttemptOutcome::Retrying(e, _) => IngestionLogEntry {
                    error: Some(e.to_string()),
                    ..entry(attempt, IngestionStatus::Retrying)
                },
                AttemptOutcome::Failed(e) => IngestionLogEntry {
                    error: Some(e.to_string()),
                    ..entry(attempt, IngestionStatus::Failed)
                },
            };
            if let Err(e) = ctx.log.append(&record) {
                log_failure.get_or_insert(MedallionError::from(e));
            }
        },
    )
    .await?;

    if let Some(e) = log_failure {
        return Err(e);
    }

    info!(
        "  📥 {} -> bronze/{} ({} rows, {} cols)",
        source.path,
        source.dataset,
        batch.table.num_rows(),
        batch.table.num_columns()
    );

    Ok(IngestReport {
        feed: source.feed,
        dataset: source.dataset.clone(),
        rows: batch.table.num_rows(),
        columns: batch.table.num_columns(),
        attempts,
        warnings: batch.warnings.iter().map(|w| w.to_string()).collect(),
    })
}

/// One ingestor per configured source, run concurrently (each writes its own dataset).
#[instrument(skip_all, fields(sources = config.sources.len()))]
pub async fn ingest_all(
    config: &PipelineConfig,
    data_root: &Path,
    reader: &dyn SourceReader,
    store: &dyn TableStore,
    log: &IngestionLog,
) -> Result<Vec<IngestReport>, MedallionError> {
    let registry = SchemaRegistry::retail();
    let raw_dir = data_root.join(RAW_DIR);
    let ctx = IngestContext {
        reader,
        store,
        registry: &registry,
        mode: config.ingestion.validation_mode(),
        policy: RetryPolicy::from_config(&config.ingestion),
        log,
        raw_dir: &raw_dir,
    };

    let results: Vec<_> = futures::stream::iter(config.sources.iter())
        .map(|source| ingest_source(source, &ctx))
        .buffer_unordered(4)
        .collect()
        .await;

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        reports.push(result?);
    }
    reports.sort_by(|a, b| a.dataset.cmp(&b.dataset));
    Ok(reports)
}
