// medallion-core/src/infrastructure/error.rs

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use datafusion::parquet::errors::ParquetError;
use miette::Diagnostic;
use std::io::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DatabaseError {
    #[error("DuckDB Engine Error: {0}")]
    #[diagnostic(
        code(medallion::infra::database::duckdb),
        help("An error occurred inside the SQL engine.")
    )]
    DuckDB(#[from] duckdb::Error),

    #[error("DataFusion Engine Error: {0}")]
    #[diagnostic(code(medallion::infra::database::datafusion))]
    DataFusion(#[from] DataFusionError),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- DATABASE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DatabaseError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(medallion::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- COLUMNAR FILES ---
    #[error("Arrow Error: {0}")]
    #[diagnostic(code(medallion::infra::arrow))]
    Arrow(#[from] ArrowError),

    #[error("Parquet Error: {0}")]
    #[diagnostic(code(medallion::infra::parquet))]
    Parquet(#[from] ParquetError),

    #[error("Columnar data does not fit the table model: {0}")]
    #[diagnostic(code(medallion::infra::table_shape))]
    TableShape(String),

    // --- RAW SOURCES ---
    #[error("Malformed source '{path}': {reason}")]
    #[diagnostic(
        code(medallion::infra::malformed_source),
        help("The raw file cannot be parsed. Retrying will not help.")
    )]
    MalformedSource { path: String, reason: String },

    // --- SERIALIZATION ---
    #[error("JSON Error: {0}")]
    #[diagnostic(code(medallion::infra::json))]
    Json(#[from] serde_json::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(medallion::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(medallion::infra::config_invalid))]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("Project configuration not found at '{0}'")]
    #[diagnostic(code(medallion::infra::config_missing))]
    ConfigNotFound(String),
}

impl InfrastructureError {
    /// Locked files, unavailable mounts and interrupted reads are worth another attempt.
    /// Anything that failed to parse is not.
    pub fn is_transient(&self) -> bool {
        match self {
            InfrastructureError::Io(e) => matches!(
                e.kind(),
                ErrorKind::NotFound
                    | ErrorKind::PermissionDenied
                    | ErrorKind::TimedOut
                    | ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::ResourceBusy
                    | ErrorKind::StaleNetworkFileHandle
            ),
            _ => false,
        }
    }
}

// Manual implementation for shortcuts (e.g. `?` operator on duckdb calls)
impl From<duckdb::Error> for InfrastructureError {
    fn from(err: duckdb::Error) -> Self {
        InfrastructureError::Database(DatabaseError::DuckDB(err))
    }
}

impl From<DataFusionError> for InfrastructureError {
    fn from(err: DataFusionError) -> Self {
        InfrastructureError::Database(DatabaseError::DataFusion(err))
    }
}
