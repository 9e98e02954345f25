// medallion/src/commands/run.rs
//
// USE CASE: Run the whole pipeline.

use std::path::PathBuf;

use medallion_core::application::{PipelineContext, run_pipeline};
use medallion_core::infrastructure::IngestionLog;
use medallion_core::infrastructure::adapters::RawFileReader;

use super::Project;

pub async fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Load the Config (Infra)
    let project = Project::load(&project_dir)?;

    // B. Adapters
    let reader = RawFileReader::new();
    let log = IngestionLog::new(&project.data_root);

    // C. Run the Pipeline (Application Layer)
    let result = run_pipeline(PipelineContext {
        config: &project.config,
        data_root: &project.data_root,
        reader: &reader,
        store: &project.store,
        log: &log,
    })
    .await;

    // A failed stage always surfaces as Err; run_results.json holds the details.
    match result {
        Ok(run_res) => {
            println!(
                "\n✨ SUCCESS! Pipeline finished in {:.2?} ({} facts)",
                start.elapsed(),
                run_res.gold.map(|g| g.fact_rows).unwrap_or_default()
            );
        }
        Err(e) => {
            eprintln!("\n💥 CRITICAL PIPELINE ERROR: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
