// medallion-core/src/application/mod.rs

pub mod assemble;
pub mod clean;
pub mod engine;
pub mod ingest;
pub mod quality;
pub mod retry;
pub mod transform;

pub mod pipeline;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Cela permet au CLI de faire :
// `use medallion_core::application::{run_pipeline, clean_project, execute_query};`
// sans avoir à connaître la structure interne des fichiers.

pub use assemble::run_assemble;
pub use clean::{CleanTarget, clean_project};
pub use engine::{execute_query, register_gold_views};
pub use ingest::{IngestReport, ingest_all};
pub use pipeline::{PipelineContext, RunResult, run_pipeline};
pub use quality::run_quality_check;
pub use retry::RetryPolicy;
pub use transform::{TransformReport, run_transform};
