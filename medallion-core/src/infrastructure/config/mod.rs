// medallion-core/src/infrastructure/config/mod.rs

pub mod project;

pub use crate::domain::project::PipelineConfig;
pub use project::{data_root, load_pipeline_config};
