// medallion-core/src/infrastructure/mod.rs

pub mod adapters;
pub mod config;
pub mod error;
pub mod fs;
pub mod ingest_log;

pub use ingest_log::{IngestionLog, IngestionLogEntry, IngestionStatus};
