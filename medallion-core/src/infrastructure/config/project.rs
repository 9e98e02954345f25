// medallion-core/src/infrastructure/config/project.rs

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::project::configuration::PipelineConfig;
use crate::domain::silver::GateMode;
use crate::infrastructure::error::InfrastructureError;

pub const CONFIG_CANDIDATES: [&str; 2] = ["medallion.yaml", "medallion_project.yaml"];

// --- LOADER ---

#[instrument(skip(project_dir))] // Log automatique de l'entrée/sortie de la fonction
pub fn load_pipeline_config(project_dir: &Path) -> Result<PipelineConfig, InfrastructureError> {
    // 1. Découverte du fichier principal
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading pipeline configuration");

    // 2. Chargement YAML Base
    let content = fs::read_to_string(&config_path)?;
    let mut config: PipelineConfig = serde_yaml::from_str(&content)?;

    // 3. Override via Variables d'Environnement (Pattern 'Layering')
    // Permet de faire: MEDALLION_RUN_DATE=2024-07-01 medallion run
    apply_env_overrides(&mut config)?;

    // 4. Validation (ratios, attempts, one writer per dataset)
    config.validate()?;

    Ok(config)
}

/// Absolute data root: `data-path` resolved against the project directory.
pub fn data_root(project_dir: &Path, config: &PipelineConfig) -> PathBuf {
    let data = Path::new(&config.data_path);
    if data.is_absolute() {
        data.to_path_buf()
    } else {
        project_dir.join(data)
    }
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    for filename in CONFIG_CANDIDATES {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, CONFIG_CANDIDATES
    )))
}

fn apply_env_overrides(config: &mut PipelineConfig) -> Result<(), InfrastructureError> {
    if let Ok(val) = std::env::var("MEDALLION_DATA_PATH") {
        info!(old = ?config.data_path, new = ?val, "Overriding data path via ENV");
        config.data_path = val;
    }
    if let Ok(val) = std::env::var("MEDALLION_RUN_DATE") {
        let date = NaiveDate::parse_from_str(val.trim(), "%Y-%m-%d").map_err(|e| {
            InfrastructureError::ConfigError(format!("MEDALLION_RUN_DATE '{}': {}", val, e))
        })?;
        info!(old = ?config.run_date, new = %date, "Overriding run date via ENV");
        config.run_date = Some(date);
    }
    if let Ok(val) = std::env::var("MEDALLION_GATE") {
        let gate = match val.trim().to_ascii_lowercase().as_str() {
            "advisory" => GateMode::Advisory,
            "blocking" => GateMode::Blocking,
            other => {
                return Err(InfrastructureError::ConfigError(format!(
                    "MEDALLION_GATE must be 'advisory' or 'blocking', got '{}'",
                    other
                )));
            }
        };
        info!(old = ?config.quality.gate, new = ?gate, "Overriding quality gate via ENV");
        config.quality.gate = gate;
    }
    Ok(())
}
