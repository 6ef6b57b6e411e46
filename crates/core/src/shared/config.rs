use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::FACE_MESH_LANDMARK_COUNT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Tunables of the sampling and landmark stages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames per second to analyze from a video.
    pub target_sample_rate: f64,
    /// Faces the detector may consider; only the first is used downstream.
    pub max_faces: usize,
    pub detection_confidence: f64,
    /// Minimum face presence for reusing the previous frame's landmarks as
    /// the next search region. Ignored for still images.
    pub tracking_confidence: f64,
    /// Landmarks per face for the deployed face mesh.
    pub landmark_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 1.0,
            max_faces: 5,
            detection_confidence: 0.5,
            tracking_confidence: 0.5,
            landmark_count: FACE_MESH_LANDMARK_COUNT,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_sample_rate.is_finite() && self.target_sample_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "Target sample rate must be positive, got {}",
                self.target_sample_rate
            )));
        }
        if self.max_faces == 0 {
            return Err(ConfigError::Invalid("Max faces must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.detection_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detection_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.tracking_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Tracking confidence must be between 0.0 and 1.0, got {}",
                self.tracking_confidence
            )));
        }
        if self.landmark_count == 0 {
            return Err(ConfigError::Invalid(
                "Landmark count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Length of the aggregate vector fed to the reducer (`4K`).
    pub fn aggregate_len(&self) -> usize {
        self.landmark_count * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_sample_rate, 1.0);
        assert_eq!(config.max_faces, 5);
        assert_eq!(config.landmark_count, 468);
        assert_eq!(config.aggregate_len(), 1872);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{ "target_sample_rate": 2.5, "max_faces": 1 }"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.target_sample_rate, 2.5);
        assert_eq!(config.max_faces, 1);
        assert_eq!(config.detection_confidence, 0.5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/pipeline.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ not json").unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{ "detection_confidence": 1.5 }"#).unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[rstest]
    #[case::zero_rate(PipelineConfig { target_sample_rate: 0.0, ..Default::default() })]
    #[case::nan_rate(PipelineConfig { target_sample_rate: f64::NAN, ..Default::default() })]
    #[case::no_faces(PipelineConfig { max_faces: 0, ..Default::default() })]
    #[case::tracking(PipelineConfig { tracking_confidence: -0.1, ..Default::default() })]
    #[case::landmarks(PipelineConfig { landmark_count: 0, ..Default::default() })]
    fn test_validate_rejects(#[case] config: PipelineConfig) {
        assert!(config.validate().is_err());
    }
}
