// medallion/src/commands/assemble.rs
//
// USE CASE: Silver -> Gold star schema.

use std::path::PathBuf;

use anyhow::Context;
use medallion_core::application::run_assemble;

use super::Project;

pub fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let run_date = project.config.effective_run_date();

    println!("🥇 Building Gold...");
    let summary = run_assemble(&project.store, run_date).context("Gold assembly failed")?;

    println!(
        "   ✅ {} facts, revenue {:.2}",
        summary.fact_rows, summary.total_revenue
    );
    println!(
        "   👥 Customers: {} new, {} re-versioned, {} unchanged",
        summary.scd.inserted, summary.scd.versioned, summary.scd.unchanged
    );
    Ok(())
}
