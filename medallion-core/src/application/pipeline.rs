// medallion-core/src/application/pipeline.rs

use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use crate::application::assemble::run_assemble;
use crate::application::ingest::{IngestReport, ingest_all};
use crate::application::quality::run_quality_check;
use crate::application::transform::{TransformReport, run_transform};
use crate::domain::gold::GoldSummary;
use crate::domain::project::PipelineConfig;
use crate::domain::quality::QualitySummary;
use crate::error::MedallionError;
use crate::infrastructure::ingest_log::IngestionLog;
use crate::ports::source::SourceReader;
use crate::ports::store::TableStore;

pub const RUN_RESULTS_FILE: &str = "run_results.json";

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub run_date: NaiveDate,
    pub ingestion: Vec<IngestReport>,
    pub quality: Option<QualitySummary>,
    pub silver: Option<TransformReport>,
    pub gold: Option<GoldSummary>,
    pub errors: Vec<String>,
    pub duration_secs: f64,
}

impl RunResult {
    fn started(run_date: NaiveDate) -> Self {
        Self {
            success: false,
            run_date,
            ingestion: Vec::new(),
            quality: None,
            silver: None,
            gold: None,
            errors: Vec::new(),
            duration_secs: 0.0,
        }
    }
}

// Context struct to keep the stage signatures short
pub struct PipelineContext<'a> {
    pub config: &'a PipelineConfig,
    pub data_root: &'a Path,
    pub reader: &'a dyn SourceReader,
    pub store: &'a dyn TableStore,
    pub log: &'a IngestionLog,
}

/// Raw -> Bronze -> quality report -> Silver -> Gold, stopping at the first failing stage.
/// `run_results.json` is written in both cases.
pub async fn run_pipeline(ctx: PipelineContext<'_>) -> Result<RunResult, MedallionError> {
    println!("🚀 Starting Medallion Pipeline: {}", ctx.config.name);
    let start_time = Instant::now();

    let run_date = ctx.config.effective_run_date();
    println!("📅 Run date: {}", run_date);

    let mut result = RunResult::started(run_date);
    let outcome = run_stages(&ctx, run_date, &mut result).await;

    result.duration_secs = start_time.elapsed().as_secs_f64();
    result.success = outcome.is_ok();
    if let Err(e) = &outcome {
        result.errors.push(e.to_string());
    }
    save_json(&ctx.data_root.join(RUN_RESULTS_FILE), &result)?;

    outcome?;
    println!("✨ Done in {:.2}s.", result.duration_secs);
    Ok(result)
}

async fn run_stages(
    ctx: &PipelineContext<'_>,
    run_date: NaiveDate,
    result: &mut RunResult,
) -> Result<(), MedallionError> {
    // 1. INGESTION (Raw -> Bronze)
    println!("📥 Ingesting {} sources...", ctx.config.sources.len());
    result.ingestion = ingest_all(ctx.config, ctx.data_root, ctx.reader, ctx.store, ctx.log).await?;
    for report in &result.ingestion {
        println!(
            "    ✅ {} ({} rows, {} attempt(s))",
            report.dataset, report.rows, report.attempts
        );
        for warning in &report.warnings {
            println!("       ⚠️  {}", warning);
        }
    }

    // 2. QUALITY FIREWALL (Bronze -> report)
    println!("🛡️  Running quality firewall...");
    let outcome = run_quality_check(ctx.store, ctx.data_root, &ctx.config.firewall(), run_date)?;
    let summary = outcome.report.summary.clone();
    println!(
        "    {} {}/{} checks passed, {} violations",
        if summary.failed == 0 { "🟢" } else { "🟠" },
        summary.passed,
        summary.total_checks,
        summary.total_violations
    );
    result.quality = Some(summary);

    // 3. SILVER (Bronze -> Silver)
    println!("🥈 Building Silver...");
    let silver = run_transform(ctx.store, ctx.config, run_date)?;
    println!(
        "    ✅ {} unified sales, {} quarantined",
        silver.unified_sales_rows, silver.quarantined_rows
    );
    result.silver = Some(silver);

    // 4. GOLD (Silver -> star schema)
    println!("🥇 Building Gold...");
    let gold = run_assemble(ctx.store, run_date)?;
    println!(
        "    ✅ {} facts, revenue {:.2}",
        gold.fact_rows, gold.total_revenue
    );
    result.gold = Some(gold);

    Ok(())
}

// --- HELPER FUNCTIONS ---

fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), MedallionError> {
    let content = serde_json::to_string_pretty(data)
        .map_err(|e| MedallionError::InternalError(format!("Serialization: {}", e)))?;
    crate::infrastructure::fs::atomic_write(path, content)?;
    Ok(())
}
