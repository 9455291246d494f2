//! ==============================================================================
//! store.rs - model artifact persistence
//! ==============================================================================
//!
//! purpose:
//!     writes and reads the two trained models by filename convention
//!     (ModelsConfig::forecast_path / anomaly_path). each file is a json
//!     envelope recording the feature layout the model was trained on.
//!
//! rules:
//!     - save writes both files only after both models exist; each file goes
//!       to a temp name first and is renamed into place.
//!     - load refuses a missing file, an undecodable file, another format
//!       version, or a different feature layout. the service must not start
//!       serving with any of those.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ModelsConfig;
use crate::error::{ModelLoadError, TrainError};
use crate::features;
use crate::model::{IsolationForest, RandomForestRegressor};
use crate::training::TrainedModels;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact<T> {
    pub format_version: u32,
    pub features: Vec<String>,
    pub trained_at: DateTime<Utc>,
    /// rows the model was fitted on
    pub rows: usize,
    pub model: T,
}

impl<T> ModelArtifact<T> {
    pub fn new(model: T, rows: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            features: features::layout(),
            trained_at: Utc::now(),
            rows,
            model,
        }
    }
}

pub struct LoadedModels {
    pub forecast: ModelArtifact<RandomForestRegressor>,
    pub anomaly: ModelArtifact<IsolationForest>,
}

/// persist both trained models; returns the paths written
pub fn save(config: &ModelsConfig, trained: TrainedModels) -> Result<(PathBuf, PathBuf), TrainError> {
    std::fs::create_dir_all(&config.dir).map_err(|source| TrainError::Persist {
        path: config.dir.clone(),
        source,
    })?;

    let all_rows = trained.report.alignment.aligned;
    let forecast = ModelArtifact::new(trained.forecast, trained.report.train_rows);
    let anomaly = ModelArtifact::new(trained.anomaly, all_rows);

    // encode both before touching the filesystem
    let forecast_json = serde_json::to_vec(&forecast)?;
    let anomaly_json = serde_json::to_vec(&anomaly)?;

    let forecast_path = config.forecast_path();
    let anomaly_path = config.anomaly_path();
    write_pair([
        (forecast_path.as_path(), forecast_json.as_slice()),
        (anomaly_path.as_path(), anomaly_json.as_slice()),
    ])?;

    tracing::info!(
        forecast = %forecast_path.display(),
        anomaly = %anomaly_path.display(),
        trees = forecast.model.params().n_estimators,
        anomaly_threshold = anomaly.model.threshold(),
        contamination = anomaly.model.params().contamination,
        "model artifacts saved"
    );
    Ok((forecast_path, anomaly_path))
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// stage both files as .tmp, then rename them into place; a failure while
/// staging removes what was staged and leaves the previous artifacts untouched
fn write_pair(files: [(&Path, &[u8]); 2]) -> Result<(), TrainError> {
    for (i, &(path, bytes)) in files.iter().enumerate() {
        if let Err(source) = std::fs::write(tmp_path(path), bytes) {
            discard_staged(&files[..=i]);
            return Err(persist_error(path, source));
        }
    }
    for (i, &(path, _)) in files.iter().enumerate() {
        if let Err(source) = std::fs::rename(tmp_path(path), path) {
            discard_staged(&files[i..]);
            return Err(persist_error(path, source));
        }
    }
    Ok(())
}

fn discard_staged(files: &[(&Path, &[u8])]) {
    for &(path, _) in files {
        let _ = std::fs::remove_file(tmp_path(path));
    }
}

fn persist_error(path: &Path, source: std::io::Error) -> TrainError {
    TrainError::Persist {
        path: path.to_path_buf(),
        source,
    }
}

pub fn load(config: &ModelsConfig) -> Result<LoadedModels, ModelLoadError> {
    let forecast = load_artifact(&config.forecast_path())?;
    let anomaly = load_artifact(&config.anomaly_path())?;
    Ok(LoadedModels { forecast, anomaly })
}

pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<ModelArtifact<T>, ModelLoadError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ModelLoadError::Missing(path.to_path_buf())
        } else {
            ModelLoadError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    // check the envelope before decoding a possibly incompatible model body
    #[derive(Deserialize)]
    struct Header {
        format_version: u32,
        features: Vec<String>,
    }
    let header: Header = serde_json::from_slice(&bytes).map_err(|source| ModelLoadError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    if header.format_version != FORMAT_VERSION {
        return Err(ModelLoadError::FormatVersion {
            path: path.to_path_buf(),
            expected: FORMAT_VERSION,
            found: header.format_version,
        });
    }
    let expected = features::layout();
    if header.features != expected {
        return Err(ModelLoadError::FeatureLayout {
            path: path.to_path_buf(),
            expected,
            found: header.features,
        });
    }

    let artifact: ModelArtifact<T> =
        serde_json::from_slice(&bytes).map_err(|source| ModelLoadError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(
        path = %path.display(),
        trained_at = %artifact.trained_at,
        rows = artifact.rows,
        "model artifact loaded"
    );
    Ok(artifact)
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForestParams, IsolationParams};
    use crate::training::TrainingReport;

    fn tiny_models() -> TrainedModels {
        let x = [[20.0, 1.0, 1.0, 1.0, 10.0, 600.0]];
        TrainedModels {
            forecast: RandomForestRegressor::fit(
                &ForestParams { n_estimators: 3, ..ForestParams::default() },
                &x,
                &[21.5],
            )
            .unwrap(),
            anomaly: IsolationForest::fit(
                &IsolationParams { n_estimators: 3, ..IsolationParams::default() },
                &x,
            )
            .unwrap(),
            report: TrainingReport::default(),
        }
    }

    fn config_in(dir: &Path) -> ModelsConfig {
        ModelsConfig {
            dir: dir.join("models"),
            ..ModelsConfig::default()
        }
    }

    #[test]
    fn saved_models_load_back() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        let (forecast_path, anomaly_path) = save(&config, tiny_models()).unwrap();
        assert!(forecast_path.ends_with("forecast_model.json"));
        assert!(anomaly_path.ends_with("anomaly_model.json"));

        let loaded = load(&config).unwrap();
        assert_eq!(loaded.forecast.features, features::layout());
        assert_eq!(loaded.forecast.model.predict_one(&[20.0, 1.0, 1.0, 1.0, 10.0, 600.0]), 21.5);
    }

    #[test]
    fn failed_save_keeps_the_previous_pair() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        save(&config, tiny_models()).unwrap();
        let previous = std::fs::read(config.forecast_path()).unwrap();

        // a directory squatting on the staging name makes the second write fail
        std::fs::create_dir(tmp_path(&config.anomaly_path())).unwrap();
        let err = save(&config, tiny_models()).err().unwrap();
        assert!(matches!(err, TrainError::Persist { .. }));

        assert_eq!(std::fs::read(config.forecast_path()).unwrap(), previous);
        assert!(!tmp_path(&config.forecast_path()).exists());
        assert!(load(&config).is_ok());
    }

    #[test]
    fn missing_artifact_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(&config_in(tmp.path())).err().unwrap();
        assert!(matches!(err, ModelLoadError::Missing(p) if p.ends_with("forecast_model.json")));
    }

    #[test]
    fn garbage_artifact_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("forecast_model.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = load_artifact::<RandomForestRegressor>(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt { .. }));
    }

    #[test]
    fn different_feature_layout_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        save(&config, tiny_models()).unwrap();

        // swap two columns in the recorded layout
        let path = config.forecast_path();
        let mut json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        json["features"][0] = "humidity_air".into();
        json["features"][1] = "temperature".into();
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = load_artifact::<RandomForestRegressor>(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::FeatureLayout { .. }));
    }

    #[test]
    fn other_format_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(tmp.path());
        save(&config, tiny_models()).unwrap();

        let path = config.anomaly_path();
        let mut json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        json["format_version"] = 99.into();
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = load_artifact::<IsolationForest>(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::FormatVersion { found: 99, .. }));
    }
}
