//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `forecaster.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - AlignmentConfig: forecast horizon for the exact-match join.
//!     - TrainingConfig: split fraction plus both estimators' parameters.
//!     - ModelsConfig: where artifacts live and what they are called.
//!     - ServerConfig: bind address for `serve`.
//!     - LoggingConfig: default log level / format.
//!
//! every section is optional; a missing key takes its default.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::align::DEFAULT_HORIZON_MINUTES;
use crate::model::{ForestParams, IsolationParams};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ForecasterConfig {
    pub alignment: AlignmentConfig,
    pub training: TrainingConfig,
    pub models: ModelsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AlignmentConfig {
    pub horizon_minutes: i64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self { horizon_minutes: DEFAULT_HORIZON_MINUTES }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// trailing fraction held out for evaluation
    pub test_fraction: f64,
    pub forest: ForestParams,
    pub anomaly: IsolationParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            forest: ForestParams::default(),
            anomaly: IsolationParams::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub forecast_file: String,
    pub anomaly_file: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            forecast_file: "forecast_model.json".to_string(),
            anomaly_file: "anomaly_model.json".to_string(),
        }
    }
}

impl ModelsConfig {
    pub fn forecast_path(&self) -> PathBuf {
        self.dir.join(&self.forecast_file)
    }

    pub fn anomaly_path(&self) -> PathBuf {
        self.dir.join(&self.anomaly_file)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// filter used when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl ForecasterConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: ForecasterConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before logging is initialised, so problems go to stderr directly.
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("forecaster.toml"),
            PathBuf::from("..").join("config").join("forecaster.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        eprintln!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        eprintln!("[CONFIG] No config file found - using defaults");
        Self::default()
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            horizon_minutes = self.alignment.horizon_minutes,
            test_fraction = self.training.test_fraction,
            forest_trees = self.training.forest.n_estimators,
            forest_depth = self.training.forest.max_depth,
            anomaly_trees = self.training.anomaly.n_estimators,
            contamination = self.training.anomaly.contamination,
            models_dir = %self.models.dir.display(),
            "configuration"
        );
    }
}
