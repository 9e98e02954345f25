// medallion-core/src/application/clean.rs

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::application::pipeline::RUN_RESULTS_FILE;
use crate::application::quality::REPORT_DIR;
use crate::domain::layer::Layer;
use crate::error::MedallionError;
use crate::infrastructure::config::project::{data_root, load_pipeline_config};
use crate::infrastructure::error::InfrastructureError;

/// What `clean` removes. Raw files and the ingestion log are never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanTarget {
    All,
    Only(Layer),
}

impl CleanTarget {
    pub fn layers(&self) -> Vec<Layer> {
        match self {
            CleanTarget::All => Layer::DERIVED.to_vec(),
            CleanTarget::Only(layer) => vec![*layer],
        }
    }
}

impl FromStr for CleanTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(CleanTarget::All);
        }
        match Layer::from_str(s)? {
            Layer::Raw => Err("the raw layer is the source of truth and cannot be cleaned".into()),
            layer => Ok(CleanTarget::Only(layer)),
        }
    }
}

pub fn clean_project(project_dir: &Path, target: CleanTarget) -> Result<Vec<Layer>, MedallionError> {
    tracing::info!("🧹 Initializing Medallion cleanup sequence...");

    let config = load_pipeline_config(project_dir).map_err(MedallionError::Infrastructure)?;
    let root = data_root(project_dir, &config);
    clean_layers(&root, target)
}

/// Deletes derived layers under `data_root`. Each one can be rebuilt from the layer below.
pub fn clean_layers(data_root: &Path, target: CleanTarget) -> Result<Vec<Layer>, MedallionError> {
    let mut removed = Vec::new();

    for layer in target.layers() {
        if !layer.is_rebuildable() {
            return Err(MedallionError::UnsafePath(layer.dir_name().to_string()));
        }
        if remove_under(data_root, layer.dir_name())? {
            println!("   🗑️  Layer removed: {}", layer);
            removed.push(layer);
        }
    }

    // Derived reports go with the layers they describe.
    if target == CleanTarget::All || target == CleanTarget::Only(Layer::Bronze) {
        remove_under(data_root, REPORT_DIR)?;
    }
    if target == CleanTarget::All {
        remove_under(data_root, RUN_RESULTS_FILE)?;
    }

    Ok(removed)
}

fn remove_under(root: &Path, rel_path: &str) -> Result<bool, MedallionError> {
    let full_path = root.join(rel_path);

    // Zero-Trust Path Traversal Guard
    if rel_path.contains("..") || !full_path.starts_with(root) {
        return Err(MedallionError::UnsafePath(rel_path.to_string()));
    }

    if !full_path.exists() {
        return Ok(false);
    }
    if full_path.is_dir() {
        fs::remove_dir_all(&full_path).map_err(InfrastructureError::Io)?;
    } else {
        fs::remove_file(&full_path).map_err(InfrastructureError::Io)?;
    }
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::ingest_log::{LOG_DIR, LOG_FILE};
    use anyhow::Result;

    fn lake(root: &Path) -> Result<()> {
        for dir in ["raw", "bronze/pos_sales", "silver/unified_sales", "gold/fact_sales", "quality", LOG_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        fs::write(root.join("raw/pos_sales.csv"), "invoice_no\nI1\n")?;
        fs::write(root.join(LOG_DIR).join(LOG_FILE), "{}\n")?;
        fs::write(root.join(RUN_RESULTS_FILE), "{}")?;
        Ok(())
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(CleanTarget::from_str("all"), Ok(CleanTarget::All));
        assert_eq!(CleanTarget::from_str("Gold"), Ok(CleanTarget::Only(Layer::Gold)));
        assert!(CleanTarget::from_str("raw").is_err());
        assert!(CleanTarget::from_str("platinum").is_err());
    }

    #[test]
    fn test_clean_single_layer() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        lake(tmp.path())?;

        let removed = clean_layers(tmp.path(), CleanTarget::Only(Layer::Gold))?;

        assert_eq!(removed, vec![Layer::Gold]);
        assert!(!tmp.path().join("gold").exists());
        assert!(tmp.path().join("silver").exists());
        assert!(tmp.path().join("quality").exists());
        Ok(())
    }

    #[test]
    fn test_clean_all_keeps_raw_and_log() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        lake(tmp.path())?;

        let removed = clean_layers(tmp.path(), CleanTarget::All)?;

        assert_eq!(removed, Layer::DERIVED.to_vec());
        assert!(tmp.path().join("raw/pos_sales.csv").exists());
        assert!(tmp.path().join(LOG_DIR).join(LOG_FILE).exists());
        assert!(!tmp.path().join("quality").exists());
        assert!(!tmp.path().join(RUN_RESULTS_FILE).exists());
        Ok(())
    }

    #[test]
    fn test_raw_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let err = clean_layers(tmp.path(), CleanTarget::Only(Layer::Raw)).unwrap_err();
        assert!(matches!(err, MedallionError::UnsafePath(_)));
    }
}
