// medallion-core/src/infrastructure/adapters/parquet.rs

use chrono::{Datelike, NaiveDate};
use datafusion::arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Field as ArrowField, Schema};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::domain::layer::Layer;
use crate::domain::table::{ColumnType, Field, Row, Table, Value};
use crate::error::MedallionError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::fs::{staging_dir, swap_dir};
use crate::ports::store::{LayerTable, TableStore};

/// `NaiveDate::num_days_from_ce()` of 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;
const HIVE_NULL: &str = "__HIVE_DEFAULT_PARTITION__";

/// Layer directories as Parquet files under `<data-path>/<layer>/<table>/`.
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Glob matching every file of a table, partitioned or not.
    pub fn parquet_glob(&self, layer: Layer, name: &str) -> String {
        format!(
            "{}/{}/**/*.parquet",
            self.layer_path(layer).to_string_lossy(),
            name
        )
    }

    fn write_into(dir: &Path, table: &LayerTable) -> Result<usize, InfrastructureError> {
        fs::create_dir_all(dir)?;

        if table.partition_by.is_empty() || table.table.is_empty() {
            let file = if table.partition_by.is_empty() {
                format!("{}.parquet", table.name)
            } else {
                "part-00000.parquet".to_string()
            };
            write_parquet(&dir.join(file), &table.table)?;
            return Ok(1);
        }

        // 1. Group rows by partition values (BTreeMap keeps directories ordered)
        let mut partitions: BTreeMap<Vec<String>, Vec<Row>> = BTreeMap::new();
        for row in table.table.rows() {
            let key = table
                .partition_by
                .iter()
                .map(|col| match table.table.column_index(col) {
                    Some(i) => partition_value(&row[i]),
                    None => HIVE_NULL.to_string(),
                })
                .collect();
            partitions.entry(key).or_default().push(row.clone());
        }

        // 2. One file per partition directory
        for (values, rows) in &partitions {
            let mut part_dir = dir.to_path_buf();
            for (col, value) in table.partition_by.iter().zip(values) {
                part_dir = part_dir.join(format!("{}={}", col, value));
            }
            fs::create_dir_all(&part_dir)?;
            let part = Table::try_new(table.table.fields().to_vec(), rows.clone())
                .map_err(|e| InfrastructureError::TableShape(e.to_string()))?;
            write_parquet(&part_dir.join("part-00000.parquet"), &part)?;
        }
        Ok(partitions.len())
    }
}

impl TableStore for ParquetStore {
    fn layer_path(&self, layer: Layer) -> PathBuf {
        self.root.join(layer.dir_name())
    }

    fn read_table(&self, layer: Layer, name: &str) -> Result<Option<Table>, MedallionError> {
        let dir = self.layer_path(layer).join(name);
        if !dir.exists() {
            return Ok(None);
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| {
                e.path().is_file()
                    && e.path().extension().and_then(|s| s.to_str()) == Some("parquet")
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();

        let mut merged: Option<Table> = None;
        for file in files {
            let part = read_parquet(&file)?;
            match merged.as_mut() {
                None => merged = Some(part),
                Some(acc) => acc.append(part)?,
            }
        }
        debug!(layer = %layer, table = name, rows = ?merged.as_ref().map(Table::num_rows), "Table read");
        Ok(merged)
    }

    #[instrument(skip(self, table), fields(table = %table.name))]
    fn write_table(&self, layer: Layer, table: &LayerTable) -> Result<(), MedallionError> {
        let target = self.layer_path(layer).join(&table.name);
        let staged = staging_dir(&target)?;
        Self::write_into(staged.path(), table)?;
        swap_dir(staged, &target)?;
        debug!(rows = table.table.num_rows(), "Table written");
        Ok(())
    }

    #[instrument(skip(self, tables), fields(tables = tables.len()))]
    fn replace_layer(&self, layer: Layer, tables: &[LayerTable]) -> Result<(), MedallionError> {
        let target = self.layer_path(layer);
        let staged = staging_dir(&target)?;
        let mut files = 0;
        for table in tables {
            files += Self::write_into(&staged.path().join(&table.name), table)?;
        }
        swap_dir(staged, &target)?;
        info!("💾 {} layer replaced ({} tables, {} files)", layer, tables.len(), files);
        Ok(())
    }

    fn list_tables(&self, layer: Layer) -> Result<Vec<String>, MedallionError> {
        let dir = self.layer_path(layer);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

// --- ARROW CONVERSION ---

fn arrow_type(kind: ColumnType) -> DataType {
    match kind {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::String => DataType::Utf8,
        ColumnType::Date => DataType::Date32,
        ColumnType::Bool => DataType::Boolean,
    }
}

fn column_type(data_type: &DataType) -> ColumnType {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ColumnType::Int,
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => ColumnType::Float,
        DataType::Date32 | DataType::Date64 => ColumnType::Date,
        DataType::Boolean => ColumnType::Bool,
        _ => ColumnType::String,
    }
}

pub fn to_record_batch(table: &Table) -> Result<RecordBatch, InfrastructureError> {
    let schema = Arc::new(Schema::new(
        table
            .fields()
            .iter()
            .map(|f| ArrowField::new(&f.name, arrow_type(f.kind), true))
            .collect::<Vec<_>>(),
    ));

    let columns: Vec<ArrayRef> = table
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let cells = table.rows().iter().map(|r| &r[i]);
            let array: ArrayRef = match f.kind {
                ColumnType::Int => Arc::new(cells.map(Value::as_i64).collect::<Int64Array>()),
                ColumnType::Float => Arc::new(cells.map(Value::as_f64).collect::<Float64Array>()),
                ColumnType::String => Arc::new(cells.map(Value::as_text).collect::<StringArray>()),
                ColumnType::Date => Arc::new(
                    cells
                        .map(|v| v.as_date().map(|d| d.num_days_from_ce() - UNIX_EPOCH_FROM_CE))
                        .collect::<Date32Array>(),
                ),
                ColumnType::Bool => Arc::new(cells.map(Value::as_bool).collect::<BooleanArray>()),
            };
            array
        })
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

/// Converts Arrow batches into a table. Foreign Arrow types are cast to the
/// closest column type (integers to Int64, decimals to Float64, anything else to text).
pub fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Table, InfrastructureError> {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| Field::new(f.name().as_str(), column_type(f.data_type())))
        .collect();

    let mut rows: Vec<Row> = Vec::new();
    for batch in batches {
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            columns.push(column_values(batch.column(i), field.kind)?);
        }
        for r in 0..batch.num_rows() {
            rows.push(columns.iter().map(|c| c[r].clone()).collect());
        }
    }
    Table::try_new(fields, rows).map_err(|e| InfrastructureError::TableShape(e.to_string()))
}

fn column_values(array: &ArrayRef, kind: ColumnType) -> Result<Vec<Value>, InfrastructureError> {
    let array = cast(array, &arrow_type(kind))?;
    let mismatch = || {
        InfrastructureError::Arrow(datafusion::arrow::error::ArrowError::CastError(format!(
            "column is not {:?} after cast",
            kind
        )))
    };

    let values = match kind {
        ColumnType::Int => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(mismatch)?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Int))
            .collect(),
        ColumnType::Float => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(mismatch)?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Float))
            .collect(),
        ColumnType::String => array
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(mismatch)?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::str))
            .collect(),
        ColumnType::Date => array
            .as_any()
            .downcast_ref::<Date32Array>()
            .ok_or_else(mismatch)?
            .iter()
            .map(|v| {
                v.and_then(|days| NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_FROM_CE))
                    .map_or(Value::Null, Value::Date)
            })
            .collect(),
        ColumnType::Bool => array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(mismatch)?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
    };
    Ok(values)
}

fn partition_value(value: &Value) -> String {
    match value {
        Value::Null => HIVE_NULL.to_string(),
        Value::Int(i) => format!("{:02}", i),
        other => other.to_string(),
    }
}

fn write_parquet(path: &Path, table: &Table) -> Result<(), InfrastructureError> {
    let batch = to_record_batch(table)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<Table, InfrastructureError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    from_record_batches(&schema, &batches)
}
