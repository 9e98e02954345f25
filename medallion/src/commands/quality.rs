// medallion/src/commands/quality.rs
//
// USE CASE: Quality firewall over Bronze.

use std::path::PathBuf;

use anyhow::Context;
use comfy_table::Table;
use medallion_core::application::quality::report_path;
use medallion_core::application::run_quality_check;
use medallion_core::domain::quality::CheckStatus;

use super::Project;

pub fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;
    let run_date = project.config.effective_run_date();

    println!("🛡️  Running quality firewall (run date {})...", run_date);
    let outcome = run_quality_check(
        &project.store,
        &project.data_root,
        &project.config.firewall(),
        run_date,
    )
    .context("Quality check failed")?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Check", "Violations", "Status", "Action"]);
    for check in &outcome.report.check_results {
        let status = match check.status {
            CheckStatus::Pass => "✅ PASS",
            CheckStatus::Fail => "❌ FAIL",
        };
        table.add_row(vec![
            check.check_id.to_string(),
            check.check_name.clone(),
            check.violations_found.to_string(),
            status.to_string(),
            check.action_on_failure.clone(),
        ]);
    }
    println!("{table}");

    let summary = &outcome.report.summary;
    println!(
        "   {}/{} checks passed. Report: {}",
        summary.passed,
        summary.total_checks,
        report_path(&project.data_root).display()
    );
    Ok(())
}
