// medallion-core/src/ports/store.rs

// Contract for the layer directories (bronze/, silver/, gold/).
// Implementations must never leave a half-written table or layer visible.

use std::path::PathBuf;

use crate::domain::layer::Layer;
use crate::domain::table::Table;
use crate::error::MedallionError;

#[derive(Debug, Clone)]
pub struct LayerTable {
    pub name: String,
    pub table: Table,
    /// Hive-style partition columns (`year=2024/month=03/`), in order.
    pub partition_by: Vec<String>,
}

impl LayerTable {
    pub fn new(name: &str, table: Table) -> Self {
        Self {
            name: name.to_string(),
            table,
            partition_by: Vec::new(),
        }
    }

    pub fn partitioned(mut self, columns: &[&str]) -> Self {
        self.partition_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

pub trait TableStore: Send + Sync {
    fn layer_path(&self, layer: Layer) -> PathBuf;

    /// `None` when the table has never been written.
    fn read_table(&self, layer: Layer, name: &str) -> Result<Option<Table>, MedallionError>;

    /// Replaces one table of the layer, leaving its siblings alone.
    fn write_table(&self, layer: Layer, table: &LayerTable) -> Result<(), MedallionError>;

    /// Replaces the whole layer in one swap. On error the previous layer is untouched.
    fn replace_layer(&self, layer: Layer, tables: &[LayerTable]) -> Result<(), MedallionError>;

    fn list_tables(&self, layer: Layer) -> Result<Vec<String>, MedallionError>;
}
