// medallion-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Schema mismatch on '{dataset}': missing columns {missing:?}")]
    #[diagnostic(
        code(medallion::domain::schema_mismatch),
        help("Strict mode refuses to default-fill. Fix the feed or ingest in lenient mode.")
    )]
    SchemaMismatch {
        dataset: String,
        missing: Vec<String>,
    },

    #[error("No schema registered for dataset '{0}'")]
    #[diagnostic(code(medallion::domain::unknown_dataset))]
    UnknownDataset(String),

    #[error("Dataset '{0}' is not present in its upstream layer")]
    #[diagnostic(
        code(medallion::domain::missing_dataset),
        help("Run the upstream stage first (ingest before transform, transform before assemble).")
    )]
    MissingDataset(String),

    #[error("Malformed table: {0}")]
    #[diagnostic(code(medallion::domain::table))]
    MalformedTable(String),

    #[error(
        "Data loss threshold exceeded on '{dataset}': {excluded}/{total} rows excluded ({ratio:.2} > {threshold:.2})"
    )]
    #[diagnostic(
        code(medallion::domain::data_loss),
        help("Inspect the quality report before re-running. The previous Silver layer is untouched.")
    )]
    DataLossThresholdExceeded {
        dataset: String,
        excluded: usize,
        total: usize,
        ratio: f64,
        threshold: f64,
    },

    #[error("Quality gate is blocking and checks failed: {failed_checks:?}")]
    #[diagnostic(
        code(medallion::domain::quality_gate),
        help("Switch 'quality.gate' to 'advisory' or fix the Bronze data.")
    )]
    QualityGateFailed { failed_checks: Vec<String> },

    #[error("Orphan fact '{fact}': no {dimension} row for natural key '{natural_key}'")]
    #[diagnostic(code(medallion::domain::orphan_fact))]
    OrphanFact {
        fact: String,
        dimension: String,
        natural_key: String,
    },

    #[error("SCD2 invariant violated for '{natural_key}': {reason}")]
    #[diagnostic(code(medallion::domain::scd_invariant))]
    ScdInvariantViolation { natural_key: String, reason: String },

    #[error("Amount conservation violated: fact total {fact_total:.2} != silver total {silver_total:.2}")]
    #[diagnostic(code(medallion::domain::conservation))]
    ConservationViolation { fact_total: f64, silver_total: f64 },

    #[error("Only read-only queries are allowed on the Gold layer: {0}")]
    #[diagnostic(code(medallion::domain::read_only), help("Use SELECT / WITH statements only."))]
    ForbiddenStatement(String),
}
