// medallion-core/src/domain/project/configuration.rs

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use validator::{Validate, ValidationError};

use crate::domain::quality::QualityFirewall;
use crate::domain::schema::ValidationMode;
use crate::domain::schema::datasets::{POS_SALES, SHIPMENTS, WAREHOUSE_INVENTORY, WEB_ORDERS};
use crate::domain::silver::{GateMode, SilverConfig};

/// Physical feed a raw file comes from. One ingestor runs per source entry.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Pos,
    Web,
    Warehouse,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate, PartialEq)]
pub struct SourceConfig {
    pub feed: Feed,
    #[validate(length(min = 1, message = "dataset cannot be empty"))]
    pub dataset: String,
    /// Relative to `<data-path>/raw`.
    #[validate(length(min = 1, message = "path cannot be empty"))]
    pub path: String,
    #[serde(default)]
    pub format: Option<SourceFormat>,
}

impl SourceConfig {
    pub fn new(feed: Feed, dataset: &str, path: &str) -> Self {
        Self {
            feed,
            dataset: dataset.to_string(),
            path: path.to_string(),
            format: None,
        }
    }

    /// Declared format, else guessed from the extension (CSV by default).
    pub fn format(&self) -> SourceFormat {
        self.format.unwrap_or_else(|| {
            match Path::new(&self.path)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .as_deref()
            {
                Some("json") | Some("jsonl") => SourceFormat::Json,
                _ => SourceFormat::Csv,
            }
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate, PartialEq)]
pub struct IngestionConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(rename = "strict-schema", default)]
    pub strict_schema: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            strict_schema: false,
        }
    }
}

impl IngestionConfig {
    pub fn validation_mode(&self) -> ValidationMode {
        ValidationMode::from_strict(self.strict_schema)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate, PartialEq)]
pub struct QualityConfig {
    #[serde(default)]
    pub gate: GateMode,

    #[serde(rename = "completeness-threshold", default = "default_completeness")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub completeness_threshold: f64,

    #[serde(rename = "max-exclusion-ratio", default = "default_exclusion_ratio")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_exclusion_ratio: f64,

    #[serde(rename = "sample-size", default = "default_sample_size")]
    #[validate(range(min = 1))]
    pub sample_size: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            gate: GateMode::default(),
            completeness_threshold: default_completeness(),
            max_exclusion_ratio: default_exclusion_ratio(),
            sample_size: default_sample_size(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate, PartialEq)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(rename = "data-path", default = "default_data_path")]
    pub data_path: String,

    /// Business "today": the future-date cutoff and the SCD2 change date.
    #[serde(rename = "run-date", default)]
    pub run_date: Option<NaiveDate>,

    #[serde(default = "default_sources")]
    #[validate(nested)]
    #[validate(custom(function = "validate_unique_datasets"))]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub quality: QualityConfig,
}

impl PipelineConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: default_version(),
            data_path: default_data_path(),
            run_date: None,
            sources: default_sources(),
            ingestion: IngestionConfig::default(),
            quality: QualityConfig::default(),
        }
    }

    pub fn effective_run_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn firewall(&self) -> QualityFirewall {
        QualityFirewall::new(self.quality.completeness_threshold, self.quality.sample_size)
    }

    pub fn silver(&self) -> SilverConfig {
        SilverConfig {
            gate: self.quality.gate,
            max_exclusion_ratio: self.quality.max_exclusion_ratio,
        }
    }
}

// A Bronze dataset has exactly one writer.
fn validate_unique_datasets(sources: &[SourceConfig]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for s in sources {
        if !seen.insert(s.dataset.as_str()) {
            let mut err = ValidationError::new("duplicate_dataset");
            err.message = Some(format!("dataset '{}' is written by more than one source", s.dataset).into());
            return Err(err);
        }
    }
    Ok(())
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new(Feed::Pos, POS_SALES, "pos_sales.csv"),
        SourceConfig::new(Feed::Web, WEB_ORDERS, "web_orders.json"),
        SourceConfig::new(Feed::Warehouse, WAREHOUSE_INVENTORY, "warehouse_inventory.csv"),
        SourceConfig::new(Feed::Warehouse, SHIPMENTS, "shipments.csv"),
    ]
}

fn default_version() -> String {
    "1.0.0".to_string()
}
fn default_data_path() -> String {
    "data".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_completeness() -> f64 {
    0.95
}
fn default_exclusion_ratio() -> f64 {
    0.5
}
fn default_sample_size() -> usize {
    10
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_gets_defaults() {
        let cfg: PipelineConfig = serde_yaml::from_str("name: retail").unwrap();
        assert_eq!(cfg.data_path, "data");
        assert_eq!(cfg.sources.len(), 4);
        assert_eq!(cfg.ingestion.max_attempts, 3);
        assert_eq!(cfg.ingestion.base_delay_ms, 1000);
        assert_eq!(cfg.quality.gate, GateMode::Advisory);
        assert_eq!(cfg.sources[1].format(), SourceFormat::Json);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
name: retail
data-path: lake
run-date: 2024-06-30
sources:
  - feed: pos
    dataset: pos_sales
    path: exports/pos.txt
    format: csv
ingestion:
  max-attempts: 5
  base-delay-ms: 10
  strict-schema: true
quality:
  gate: blocking
  max-exclusion-ratio: 0.2
"#;
        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.run_date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(cfg.ingestion.validation_mode(), ValidationMode::Strict);
        assert_eq!(cfg.silver().gate, GateMode::Blocking);
        assert_eq!(cfg.silver().max_exclusion_ratio, 0.2);
        assert_eq!(cfg.quality.sample_size, 10);
    }

    #[test]
    fn test_duplicate_dataset_is_invalid() {
        let mut cfg = PipelineConfig::new("retail");
        cfg.sources.push(SourceConfig::new(Feed::Pos, POS_SALES, "again.csv"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_out_of_range_values_are_invalid() {
        let mut cfg = PipelineConfig::new("retail");
        cfg.quality.completeness_threshold = 1.5;
        assert!(cfg.validate().is_err());
        cfg.quality.completeness_threshold = 0.9;
        cfg.ingestion.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }
}
