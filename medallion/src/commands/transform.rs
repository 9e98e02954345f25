// medallion/src/commands/transform.rs
//
// USE CASE: Bronze -> Silver.

use std::path::PathBuf;

use anyhow::Context;
use medallion_core::application::run_transform;

use super::Project;

pub fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let run_date = project.config.effective_run_date();

    println!("🥈 Building Silver...");
    let report = run_transform(&project.store, &project.config, run_date)
        .context("Silver transformation failed")?;

    for stats in &report.datasets {
        println!(
            "   ✅ {}: {} -> {} rows",
            stats.dataset, stats.input_rows, stats.output_rows
        );
    }
    println!(
        "   {} unified sales, {} quarantined",
        report.unified_sales_rows, report.quarantined_rows
    );
    Ok(())
}
