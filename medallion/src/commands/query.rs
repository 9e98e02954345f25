// medallion/src/commands/query.rs
//
// USE CASE: Read-only SQL over the Gold tables.

use std::path::PathBuf;

use comfy_table::Table;
use medallion_core::application::{execute_query, register_gold_views};
use medallion_core::infrastructure::adapters::DuckDBConnector;

use super::Project;

pub async fn execute(project_dir: PathBuf, query: String) -> anyhow::Result<()> {
    let project = Project::load(&project_dir)?;

    // In-memory engine: Gold parquet files are only ever read.
    let connector = DuckDBConnector::new(":memory:")?;
    register_gold_views(&connector, &project.store).await?;

    let result = match execute_query(&connector, &query).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("❌ Query failed: {}", e);
            std::process::exit(1);
        }
    };

    let mut table = Table::new();
    table.set_header(result.columns.clone());
    for row in &result.rows {
        table.add_row(row.clone());
    }
    println!("{table}");
    println!("   {} row(s)", result.rows.len());
    Ok(())
}
