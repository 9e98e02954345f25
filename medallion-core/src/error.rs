// medallion-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MedallionError {
    // --- ERREURS DU DOMAINE (Invariants, Quality gate, SCD2) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, Parquet, DuckDB) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    // --- ERREURS GÉNÉRIQUES / APPLICATIVES ---
    #[error("Internal Error: {0}")]
    InternalError(String),

    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

impl MedallionError {
    pub fn is_transient(&self) -> bool {
        match self {
            MedallionError::Infrastructure(e) => e.is_transient(),
            _ => false,
        }
    }
}

// Manual implementation to avoid duplicate enum variant but keep ergonomics
impl From<std::io::Error> for MedallionError {
    fn from(err: std::io::Error) -> Self {
        MedallionError::Infrastructure(InfrastructureError::Io(err))
    }
}
