// medallion-core/src/domain/schema/validator.rs

use std::fmt;
use tracing::{debug, warn};

use crate::domain::error::DomainError;
use crate::domain::schema::coercion::{Coerced, coerce};
use crate::domain::schema::descriptor::SchemaDescriptor;
use crate::domain::table::{Field, Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Missing columns are default-filled and reported as warnings.
    #[default]
    Lenient,
    /// Any missing column is a `SchemaMismatch`.
    Strict,
}

impl ValidationMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Lenient
        }
    }
}

/// Non-fatal drift found while normalising a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    MissingColumn { column: String },
    ExtraColumns { columns: Vec<String> },
    CoercionFailures { column: String, count: usize },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::MissingColumn { column } => {
                write!(f, "Missing column '{}' filled with default", column)
            }
            SchemaWarning::ExtraColumns { columns } => {
                write!(f, "Extra columns found (kept): {:?}", columns)
            }
            SchemaWarning::CoercionFailures { column, count } => {
                write!(f, "{} cell(s) in '{}' could not be coerced (set to null)", count, column)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBatch {
    pub table: Table,
    pub warnings: Vec<SchemaWarning>,
}

pub struct SchemaValidator;

impl SchemaValidator {
    /// Normalises `raw` against `descriptor`.
    ///
    /// The output holds every descriptor column, in descriptor order and coerced to its
    /// declared type, followed by any extra columns of the input, untouched.
    pub fn validate(
        raw: &Table,
        descriptor: &SchemaDescriptor,
        mode: ValidationMode,
    ) -> Result<ValidatedBatch, DomainError> {
        let mut warnings = Vec::new();

        // 1. COLUMN PRESENCE
        let missing: Vec<String> = descriptor
            .columns
            .iter()
            .filter(|c| !raw.has_column(&c.name))
            .map(|c| c.name.clone())
            .collect();

        if !missing.is_empty() {
            if mode == ValidationMode::Strict {
                return Err(DomainError::SchemaMismatch {
                    dataset: descriptor.dataset.clone(),
                    missing,
                });
            }
            for column in &missing {
                warnings.push(SchemaWarning::MissingColumn {
                    column: column.clone(),
                });
            }
        }

        let extra: Vec<String> = raw
            .column_names()
            .into_iter()
            .filter(|name| descriptor.column(name).is_none())
            .map(str::to_string)
            .collect();

        // 2. COERCION ("coerce, don't crash")
        let mut fields: Vec<Field> = descriptor.fields();
        let mut failures = vec![0usize; descriptor.columns.len()];
        let mut rows = Vec::with_capacity(raw.num_rows());

        for r in 0..raw.num_rows() {
            let mut row = Vec::with_capacity(fields.len() + extra.len());
            for (i, spec) in descriptor.columns.iter().enumerate() {
                if !raw.has_column(&spec.name) {
                    row.push(spec.default.clone());
                    continue;
                }
                let value = match coerce(spec.kind, raw.value(r, &spec.name)) {
                    Coerced::Ok(v) => v,
                    Coerced::Blank => Value::Null,
                    Coerced::Failed => {
                        failures[i] += 1;
                        Value::Null
                    }
                };
                row.push(value);
            }
            for name in &extra {
                row.push(raw.value(r, name).clone());
            }
            rows.push(row);
        }

        for (spec, count) in descriptor.columns.iter().zip(&failures) {
            if *count > 0 {
                warnings.push(SchemaWarning::CoercionFailures {
                    column: spec.name.clone(),
                    count: *count,
                });
            }
        }

        // 3. EXTRA COLUMNS are retained after the declared ones
        if !extra.is_empty() {
            for name in &extra {
                if let Some(idx) = raw.column_index(name) {
                    fields.push(raw.fields()[idx].clone());
                }
            }
            warnings.push(SchemaWarning::ExtraColumns { columns: extra });
        }

        for w in &warnings {
            warn!(dataset = %descriptor.dataset, "⚠️ {}", w);
        }
        if warnings.is_empty() {
            debug!(dataset = %descriptor.dataset, "Schema validated, no drift");
        }

        let table = Table::try_new(fields, rows)?;
        Ok(ValidatedBatch { table, warnings })
    }

    /// Lenient validation followed by a projection onto the descriptor's columns.
    /// Used to reconcile tables of different shapes into one.
    pub fn conform(table: &Table, descriptor: &SchemaDescriptor) -> Result<Table, DomainError> {
        let batch = Self::validate(table, descriptor, ValidationMode::Lenient)?;
        let names: Vec<&str> = descriptor.columns.iter().map(|c| c.name.as_str()).collect();
        Ok(batch.table.select(&names))
    }
}
