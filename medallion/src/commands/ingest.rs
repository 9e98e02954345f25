// medallion/src/commands/ingest.rs
//
// USE CASE: Raw files -> Bronze.

use std::path::PathBuf;

use anyhow::Context;
use medallion_core::application::ingest_all;
use medallion_core::infrastructure::IngestionLog;
use medallion_core::infrastructure::adapters::RawFileReader;

use super::Project;

pub async fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let reader = RawFileReader::new();
    let log = IngestionLog::new(&project.data_root);

    println!("📥 Ingesting {} sources...", project.config.sources.len());
    let reports = ingest_all(
        &project.config,
        &project.data_root,
        &reader,
        &project.store,
        &log,
    )
    .await
    .with_context(|| format!("Ingestion failed (see {:?})", log.path()))?;

    for report in reports {
        println!(
            "   ✅ {} <- {:?}: {} rows, {} columns, {} attempt(s)",
            report.dataset, report.feed, report.rows, report.columns, report.attempts
        );
        for warning in &report.warnings {
            println!("      ⚠️  {}", warning);
        }
    }
    Ok(())
}
