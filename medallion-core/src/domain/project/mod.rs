// medallion-core/src/domain/project/mod.rs

pub mod configuration;
pub use configuration::{
    Feed, IngestionConfig, PipelineConfig, QualityConfig, SourceConfig, SourceFormat,
};
