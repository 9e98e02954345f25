// medallion-core/src/domain/table.rs
//
// In-memory tabular model shared by every layer. Raw batches are all-text tables;
// the schema validator turns them into typed tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::DomainError;

/// Values treated as "no data" when they arrive as text.
pub const BLANK_MARKERS: [&str; 6] = ["", "None", "none", "nan", "NaN", "null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    String,
    Date,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
}

static NULL_VALUE: Value = Value::Null;

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or a text cell holding one of the blank markers.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => BLANK_MARKERS.contains(&s.trim()),
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text rendering of any non-null value.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Total order used for deterministic sorting: nulls first, then by value.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::Date(_) => 3,
                Value::Str(_) => 4,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (a, b) if rank(a) == 2 && rank(b) == 2 => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    /// Canonical representation used for key comparisons (dedup, joins).
    pub fn key_repr(&self) -> String {
        match self {
            Value::Null => "\u{0}null".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: ColumnType,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

pub type Row = Vec<Value>;

/// Tables of one layer, keyed by dataset name.
pub type Datasets = BTreeMap<String, Table>;

/// Row-oriented table with a typed header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    fields: Vec<Field>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    pub fn try_new(fields: Vec<Field>, rows: Vec<Row>) -> Result<Self, DomainError> {
        let mut table = Self::new(fields);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// All-text table, the shape of a raw batch.
    pub fn text(columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> Result<Self, DomainError> {
        let fields = columns
            .iter()
            .map(|c| Field::new(*c, ColumnType::String))
            .collect();
        let rows = rows
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .map(|c| c.map(Value::str).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Self::try_new(fields, rows)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), DomainError> {
        if row.len() != self.fields.len() {
            return Err(DomainError::MalformedTable(format!(
                "row has {} values, header has {} columns",
                row.len(),
                self.fields.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Value at (row, column); missing column or row reads as null.
    pub fn value(&self, row: usize, column: &str) -> &Value {
        self.column_index(column)
            .and_then(|c| self.rows.get(row).and_then(|r| r.get(c)))
            .unwrap_or(&NULL_VALUE)
    }

    pub fn set_value(&mut self, row: usize, column: &str, value: Value) -> Result<(), DomainError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| DomainError::MalformedTable(format!("unknown column '{}'", column)))?;
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(idx))
            .ok_or_else(|| DomainError::MalformedTable(format!("row {} out of range", row)))?;
        *cell = value;
        Ok(())
    }

    /// Appends a column, filling every existing row with `fill`.
    pub fn add_column(&mut self, field: Field, fill: Value) {
        self.fields.push(field);
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.fields[idx].name = to.to_string();
        }
    }

    /// Keeps only the rows whose index satisfies `keep`.
    pub fn retain_rows<F: FnMut(usize) -> bool>(&mut self, mut keep: F) {
        let mut idx = 0;
        self.rows.retain(|_| {
            let k = keep(idx);
            idx += 1;
            k
        });
    }

    /// Appends the rows of `other`, which must have the same column names in the same order.
    pub fn append(&mut self, other: Table) -> Result<(), DomainError> {
        if self.column_names() != other.column_names() {
            return Err(DomainError::MalformedTable(format!(
                "cannot append {:?} to {:?}",
                other.column_names(),
                self.column_names()
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub fn sort_rows_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Row, &Row) -> Ordering,
    {
        self.rows.sort_by(compare);
    }

    /// Row as a JSON object, used for audit payloads.
    pub fn row_json(&self, row: usize) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if let Some(values) = self.rows.get(row) {
            for (field, value) in self.fields.iter().zip(values) {
                let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                map.insert(field.name.clone(), json);
            }
        }
        serde_json::Value::Object(map)
    }

    /// Projection onto `columns`, in that order. Unknown columns come back as nulls.
    pub fn select(&self, columns: &[&str]) -> Table {
        let fields = columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .map(|i| self.fields[i].clone())
                    .unwrap_or_else(|| Field::new(*c, ColumnType::String))
            })
            .collect();
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| {
                indices
                    .iter()
                    .map(|i| i.map(|i| r[i].clone()).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Table { fields, rows }
    }

    /// Sum of a numeric column; nulls count as zero.
    pub fn sum(&self, column: &str) -> f64 {
        match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .filter_map(|r| r[idx].as_f64())
                .sum(),
            None => 0.0,
        }
    }
}
