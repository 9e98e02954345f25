// medallion-core/src/domain/schema/descriptor.rs

use serde::Serialize;

use crate::domain::error::DomainError;
use crate::domain::table::{ColumnType, Field, Table, Value};

/// Sentinel written into text columns that are missing or must not stay null.
pub const UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnType,
    pub default: Value,
}

impl ColumnSpec {
    /// Column with the type's standard default (text: "UNKNOWN", numbers: 0, date: null).
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: default_for(kind),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    pub fn field(&self) -> Field {
        Field::new(self.name.clone(), self.kind)
    }
}

pub fn default_for(kind: ColumnType) -> Value {
    match kind {
        ColumnType::String => Value::str(UNKNOWN),
        ColumnType::Int => Value::Int(0),
        ColumnType::Float => Value::Float(0.0),
        ColumnType::Date => Value::Null,
        ColumnType::Bool => Value::Bool(false),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    pub dataset: String,
    pub version: u32,
    pub columns: Vec<ColumnSpec>,
}

impl SchemaDescriptor {
    pub fn new(dataset: impl Into<String>, version: u32, columns: Vec<ColumnSpec>) -> Self {
        Self {
            dataset: dataset.into(),
            version,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn fields(&self) -> Vec<Field> {
        self.columns.iter().map(ColumnSpec::field).collect()
    }

    /// Empty table with exactly this descriptor's columns.
    pub fn empty_table(&self) -> Table {
        Table::new(self.fields())
    }

    /// Replaces nulls in the given columns with their declared defaults.
    pub fn fill_nulls(&self, table: &mut Table, columns: &[&str]) -> Result<usize, DomainError> {
        let mut filled = 0;
        for name in columns {
            let Some(spec) = self.column(name) else {
                continue;
            };
            for row in 0..table.num_rows() {
                if table.value(row, name).is_blank() {
                    table.set_value(row, name, spec.default.clone())?;
                    filled += 1;
                }
            }
        }
        Ok(filled)
    }
}
