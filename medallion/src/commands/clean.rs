// medallion/src/commands/clean.rs
//
// USE CASE: Remove derived layers.

use std::path::PathBuf;

use medallion_core::application::{CleanTarget, clean_project};

pub fn execute(project_dir: PathBuf, target: CleanTarget) -> anyhow::Result<()> {
    match clean_project(&project_dir, target) {
        Ok(removed) if removed.is_empty() => println!("✨ Nothing to clean."),
        Ok(removed) => println!("✨ Cleaned {} layer(s).", removed.len()),
        Err(e) => {
            eprintln!("❌ Clean failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
