use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced at the pipeline boundary.
///
/// None of these are transient: the same input and the same model parameters
/// fail the same way on every attempt.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("cannot read media {path}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },

    #[error("no face detected in any sampled frame")]
    NoFaceDetected,

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    FeatureDimensionMismatch { expected: usize, actual: usize },

    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("landmark detection failed: {0}")]
    Detection(String),
}

impl PredictionError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnreadableMedia { .. } => "unreadable_media",
            Self::NoFaceDetected => "no_face_detected",
            Self::FeatureDimensionMismatch { .. } => "feature_dimension_mismatch",
            Self::ModelLoad { .. } => "model_load",
            Self::Detection(_) => "detection",
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::UnreadableMedia {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
