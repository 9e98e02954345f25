// medallion-core/src/ports/connector.rs

// What the query surface needs from a SQL engine, without knowing which engine it is.
// The Gold layer is plain Parquet; any engine that can expose it as views fits here.

use crate::error::MedallionError;
use async_trait::async_trait;

// Struct simple pour décrire une colonne (indépendant de la DB)
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// Result set rendered as text, ready for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(&self, query: &str) -> Result<(), MedallionError>;

    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<ColumnSchema>, MedallionError>;

    /// Exposes a set of Parquet files (glob) as a view named `name`.
    async fn register_table(&self, name: &str, parquet_glob: &str) -> Result<(), MedallionError>;

    async fn query(&self, sql: &str) -> Result<QueryResult, MedallionError>;

    fn engine_name(&self) -> &str;
}
