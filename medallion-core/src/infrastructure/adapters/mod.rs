// medallion-core/src/infrastructure/adapters/mod.rs

pub mod duckdb;
pub mod parquet;
pub mod raw;

pub use duckdb::DuckDBConnector;
pub use parquet::ParquetStore;
pub use raw::RawFileReader;
