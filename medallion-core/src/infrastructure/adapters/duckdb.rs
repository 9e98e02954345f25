// medallion-core/src/infrastructure/adapters/duckdb.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use duckdb::types::Value as DuckValue;
use duckdb::{Config, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// Imports Hexagonaux
use crate::error::MedallionError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::connector::{ColumnSchema, Connector, QueryResult};

pub struct DuckDBConnector {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDBConnector {
    pub fn new(db_path: &str) -> Result<Self, InfrastructureError> {
        let config = Config::default();

        let conn = if db_path == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(db_path, config)?
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, MedallionError> {
        self.conn.lock().map_err(|_| {
            MedallionError::Infrastructure(InfrastructureError::Io(std::io::Error::other(
                "DuckDB Mutex Poisoned",
            )))
        })
    }
}

fn db(e: duckdb::Error) -> MedallionError {
    MedallionError::Infrastructure(InfrastructureError::from(e))
}

fn render(value: DuckValue) -> String {
    match value {
        DuckValue::Null => "NULL".to_string(),
        DuckValue::Boolean(b) => b.to_string(),
        DuckValue::TinyInt(i) => i.to_string(),
        DuckValue::SmallInt(i) => i.to_string(),
        DuckValue::Int(i) => i.to_string(),
        DuckValue::BigInt(i) => i.to_string(),
        DuckValue::HugeInt(i) => i.to_string(),
        DuckValue::UTinyInt(i) => i.to_string(),
        DuckValue::USmallInt(i) => i.to_string(),
        DuckValue::UInt(i) => i.to_string(),
        DuckValue::UBigInt(i) => i.to_string(),
        DuckValue::Float(f) => f.to_string(),
        DuckValue::Double(f) => f.to_string(),
        DuckValue::Text(s) => s,
        DuckValue::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .map(|d| d.to_string())
            .unwrap_or_else(|| days.to_string()),
        other => format!("{:?}", other),
    }
}

#[async_trait]
impl Connector for DuckDBConnector {
    async fn execute(&self, query: &str) -> Result<(), MedallionError> {
        let conn = self.lock()?;
        conn.execute_batch(query).map_err(db)
    }

    async fn fetch_columns(&self, table_name: &str) -> Result<Vec<ColumnSchema>, MedallionError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info('{}')", table_name))
            .map_err(db)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ColumnSchema {
                    name: row.get("name")?,
                    data_type: row.get("type")?,
                    is_nullable: !row.get::<_, bool>("notnull")?,
                })
            })
            .map_err(db)?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row.map_err(db)?);
        }

        Ok(columns)
    }

    async fn register_table(&self, name: &str, parquet_glob: &str) -> Result<(), MedallionError> {
        // Partition columns are stored in the files too, so hive decoding stays off.
        let query = format!(
            "CREATE OR REPLACE VIEW \"{}\" AS SELECT * FROM read_parquet('{}', hive_partitioning = false)",
            name,
            parquet_glob.replace('\'', "''")
        );
        self.execute(&query).await
    }

    async fn query(&self, sql: &str) -> Result<QueryResult, MedallionError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(db)?;
        let mut rows = stmt.query([]).map_err(db)?;

        let columns: Vec<String> = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();

        let mut result = QueryResult {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next().map_err(db)? {
            let mut cells = Vec::with_capacity(result.columns.len());
            for i in 0..result.columns.len() {
                let value: DuckValue = row.get(i).map_err(db)?;
                cells.push(render(value));
            }
            result.rows.push(cells);
        }
        Ok(result)
    }

    fn engine_name(&self) -> &str {
        "duckdb"
    }
}
