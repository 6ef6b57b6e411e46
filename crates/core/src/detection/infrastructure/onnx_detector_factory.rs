use std::path::{Path, PathBuf};

use super::face_mesh_detector::{DetectorSettings, OnnxFaceMeshDetector};
use crate::detection::domain::landmark_detector::{
    DetectionMode, LandmarkDetector, LandmarkDetectorFactory,
};
use crate::shared::constants::{FACE_DETECTION_MODEL_NAME, FACE_MESH_MODEL_NAME};
use crate::shared::model_resolver::{self, ModelResolveError};

/// Where to download the ONNX models when they are not found locally.
#[derive(Clone, Debug, Default)]
pub struct ModelUrls {
    pub face_detection: Option<String>,
    pub face_mesh: Option<String>,
}

/// Opens fresh ONNX sessions for every media input.
pub struct OnnxLandmarkDetectorFactory {
    detection_model: PathBuf,
    mesh_model: PathBuf,
    settings: DetectorSettings,
}

impl OnnxLandmarkDetectorFactory {
    pub fn new(detection_model: PathBuf, mesh_model: PathBuf, settings: DetectorSettings) -> Self {
        Self {
            detection_model,
            mesh_model,
            settings,
        }
    }

    /// Locates both models through [`model_resolver::resolve`].
    pub fn resolve(
        model_dir: Option<&Path>,
        urls: &ModelUrls,
        settings: DetectorSettings,
    ) -> Result<Self, ModelResolveError> {
        let detection_model = model_resolver::resolve(
            FACE_DETECTION_MODEL_NAME,
            model_dir,
            urls.face_detection.as_deref(),
            None,
        )?;
        let mesh_model = model_resolver::resolve(
            FACE_MESH_MODEL_NAME,
            model_dir,
            urls.face_mesh.as_deref(),
            None,
        )?;
        log::debug!(
            "Face models: {} and {}",
            detection_model.display(),
            mesh_model.display()
        );
        Ok(Self::new(detection_model, mesh_model, settings))
    }

    pub fn detection_model(&self) -> &Path {
        &self.detection_model
    }

    pub fn mesh_model(&self) -> &Path {
        &self.mesh_model
    }
}

impl LandmarkDetectorFactory for OnnxLandmarkDetectorFactory {
    fn create(
        &self,
        mode: DetectionMode,
    ) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
        let detector =
            OnnxFaceMeshDetector::new(&self.detection_model, &self.mesh_model, self.settings, mode)?;
        Ok(Box::new(detector))
    }
}
