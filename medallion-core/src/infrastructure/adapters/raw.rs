// medallion-core/src/infrastructure/adapters/raw.rs

use async_trait::async_trait;
use datafusion::arrow::datatypes::{DataType, Field as ArrowField, Schema};
use datafusion::error::DataFusionError;
use datafusion::prelude::*;
use serde_json::Value as Json;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::domain::project::SourceFormat;
use crate::domain::table::{ColumnType, Field, Table, Value};
use crate::error::MedallionError;
use crate::infrastructure::adapters::parquet::from_record_batches;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::SourceReader;

/// Reads raw CSV / JSON exports as all-text tables.
///
/// I/O failures surface as `InfrastructureError::Io` (retryable when transient);
/// anything that opens but does not parse is `MalformedSource` (permanent).
#[derive(Default)]
pub struct RawFileReader;

impl RawFileReader {
    pub fn new() -> Self {
        Self
    }

    async fn read_csv(&self, path: &Path) -> Result<Table, InfrastructureError> {
        let path_str = path.to_str().ok_or_else(|| InfrastructureError::MalformedSource {
            path: path.display().to_string(),
            reason: "path is not valid UTF-8".into(),
        })?;
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let malformed = |e: DataFusionError| InfrastructureError::MalformedSource {
            path: path_str.to_string(),
            reason: e.to_string(),
        };

        let ctx = SessionContext::new();

        // 1. Header discovery (DataFusion infers types, we only keep the names)
        let inferred = ctx
            .read_csv(
                path_str,
                CsvReadOptions::new()
                    .has_header(true)
                    .file_extension(&extension),
            )
            .await
            .map_err(malformed)?;
        let text_schema = Schema::new(
            inferred
                .schema()
                .fields()
                .iter()
                .map(|f| ArrowField::new(f.name(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        );

        // 2. Re-read every cell as text, so "00123" stays "00123"
        let batches = ctx
            .read_csv(
                path_str,
                CsvReadOptions::new()
                    .has_header(true)
                    .file_extension(&extension)
                    .schema(&text_schema),
            )
            .await
            .map_err(malformed)?
            .collect()
            .await
            .map_err(malformed)?;

        from_record_batches(&text_schema, &batches)
    }

    fn read_json(&self, path: &Path) -> Result<Table, InfrastructureError> {
        let content = fs::read_to_string(path)?;
        let malformed = |reason: String| InfrastructureError::MalformedSource {
            path: path.display().to_string(),
            reason,
        };

        // Either one JSON array of objects, or one object per line.
        let records: Vec<Json> = match serde_json::from_str::<Json>(&content) {
            Ok(Json::Array(items)) => items,
            Ok(obj @ Json::Object(_)) => vec![obj],
            Ok(_) => return Err(malformed("expected an array of objects".into())),
            Err(whole) => content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str::<Json>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| malformed(whole.to_string()))?,
        };

        json_records_to_table(&records).map_err(malformed)
    }
}

/// Flat JSON objects to an all-text table. Columns appear in first-seen order.
pub fn json_records_to_table(records: &[Json]) -> Result<Table, String> {
    let mut columns: Vec<String> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let obj = record
            .as_object()
            .ok_or_else(|| format!("record {} is not an object", i))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let fields = columns
        .iter()
        .map(|c| Field::new(c.as_str(), ColumnType::String))
        .collect();
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| match record.get(c) {
                    None | Some(Json::Null) => Value::Null,
                    Some(Json::String(s)) => Value::str(s.as_str()),
                    Some(other) => Value::str(other.to_string()),
                })
                .collect()
        })
        .collect();
    Table::try_new(fields, rows).map_err(|e| e.to_string())
}

#[async_trait]
impl SourceReader for RawFileReader {
    async fn read(&self, path: &Path, format: SourceFormat) -> Result<Table, MedallionError> {
        // Opening first classifies missing / locked files as I/O errors (retryable).
        fs::File::open(path)?;

        let table = match format {
            SourceFormat::Csv => self.read_csv(path).await?,
            SourceFormat::Json => self.read_json(path)?,
        };
        debug!(path = ?path, rows = table.num_rows(), columns = table.num_columns(), "Raw batch read");
        Ok(table)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn test_csv_cells_stay_text() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("pos_sales.csv");
        fs::write(
            &path,
            "invoice_no,product_id,quantity,unit_price\nINV1,00123,2,10.5\nINV2,P9,,-50\n",
        )?;

        let table = RawFileReader::new().read(&path, SourceFormat::Csv).await?;

        assert_eq!(table.column_names(), vec!["invoice_no", "product_id", "quantity", "unit_price"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.value(0, "product_id"), &Value::str("00123"));
        assert_eq!(table.value(1, "unit_price"), &Value::str("-50"));
        assert!(table.value(1, "quantity").is_blank());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_array_and_lines() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let array = tmp.path().join("web_orders.json");
        fs::write(
            &array,
            r#"[{"order_id":"W1","quantity":2,"customer_id":null},{"order_id":"W2","unit_price":9.99}]"#,
        )?;
        let lines = tmp.path().join("web_orders.jsonl");
        fs::write(&lines, "{\"order_id\":\"W1\"}\n{\"order_id\":\"W2\"}\n")?;

        let reader = RawFileReader::new();
        let t = reader.read(&array, SourceFormat::Json).await?;
        assert_eq!(t.column_names(), vec!["order_id", "quantity", "customer_id", "unit_price"]);
        assert_eq!(t.value(0, "quantity"), &Value::str("2"));
        assert!(t.value(0, "customer_id").is_null());
        assert!(t.value(0, "unit_price").is_null());

        let t = reader.read(&lines, SourceFormat::Json).await?;
        assert_eq!(t.num_rows(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_transient_and_garbage_is_not() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let reader = RawFileReader::new();

        let missing = reader
            .read(&tmp.path().join("nope.csv"), SourceFormat::Csv)
            .await
            .unwrap_err();
        assert!(missing.is_transient());

        let garbage = tmp.path().join("web_orders.json");
        fs::write(&garbage, "{ not json")?;
        let err = reader.read(&garbage, SourceFormat::Json).await.unwrap_err();
        assert!(!err.is_transient());
        Ok(())
    }
}
