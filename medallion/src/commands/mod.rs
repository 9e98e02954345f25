// medallion/src/commands/mod.rs

pub mod assemble;
pub mod clean;
pub mod ingest;
pub mod quality;
pub mod query;
pub mod run;
pub mod transform;

use anyhow::Context;
use std::path::{Path, PathBuf};

use medallion_core::domain::project::PipelineConfig;
use medallion_core::infrastructure::adapters::ParquetStore;
use medallion_core::infrastructure::config::{data_root, load_pipeline_config};

/// A loaded project: its configuration and the lake it points at.
pub struct Project {
    pub config: PipelineConfig,
    pub data_root: PathBuf,
    pub store: ParquetStore,
}

impl Project {
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        println!("⚙️  Loading configuration...");
        let config = load_pipeline_config(project_dir).with_context(|| {
            format!(
                "Failed to load project configuration from {:?}",
                project_dir
            )
        })?;
        println!("   Project: {} (v{})", config.name, config.version);

        let data_root = data_root(project_dir, &config);
        let store = ParquetStore::new(&data_root);
        tracing::debug!(data_root = %data_root.display(), "Project loaded");
        Ok(Self {
            config,
            data_root,
            store,
        })
    }
}
