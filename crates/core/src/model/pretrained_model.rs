use std::fs;
use std::path::Path;

use ndarray::Array1;
use serde::de::DeserializeOwned;

use crate::model::linear_projection::LinearProjection;
use crate::model::prediction::PredictionResult;
use crate::model::random_forest::RandomForest;
use crate::shared::constants::{CLASSIFIER_FILE_NAME, REDUCER_FILE_NAME};
use crate::shared::error::PredictionError;

/// Reducer and classifier trained together. Immutable once loaded, so one
/// instance can be shared behind an `Arc` by every request.
#[derive(Debug, Clone)]
pub struct PretrainedModel {
    reducer: LinearProjection,
    classifier: RandomForest,
}

impl PretrainedModel {
    /// Pairs a reducer with a classifier. Fails with `ModelLoad` when the
    /// reducer's output does not feed the classifier.
    pub fn new(reducer: LinearProjection, classifier: RandomForest) -> Result<Self, PredictionError> {
        if reducer.output_dim() != classifier.n_features() {
            return Err(PredictionError::model_load(
                CLASSIFIER_FILE_NAME,
                format!(
                    "classifier expects {} features but the reducer produces {}",
                    classifier.n_features(),
                    reducer.output_dim()
                ),
            ));
        }
        Ok(Self {
            reducer,
            classifier,
        })
    }

    /// Loads `reducer.json` and `classifier.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, PredictionError> {
        let reducer: LinearProjection = read_json(&dir.join(REDUCER_FILE_NAME))?;
        let classifier: RandomForest = read_json(&dir.join(CLASSIFIER_FILE_NAME))?;
        let model = Self::new(reducer, classifier).map_err(|e| match e {
            PredictionError::ModelLoad { reason, .. } => {
                PredictionError::model_load(dir.join(CLASSIFIER_FILE_NAME), reason)
            }
            other => other,
        })?;

        log::info!(
            "Loaded model from {}: {} -> {} features, classes {:?}",
            dir.display(),
            model.input_dim(),
            model.reducer.output_dim(),
            model.classifier.classes()
        );
        Ok(model)
    }

    /// Length of the aggregate feature vector the model accepts.
    pub fn input_dim(&self) -> usize {
        self.reducer.input_dim()
    }

    pub fn predict(&self, aggregate: &Array1<f64>) -> Result<PredictionResult, PredictionError> {
        let reduced = self.reducer.reduce(aggregate)?;
        self.classifier.predict(&reduced)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PredictionError> {
    let json = fs::read_to_string(path).map_err(|e| PredictionError::model_load(path, e))?;
    serde_json::from_str(&json).map_err(|e| PredictionError::model_load(path, e))
}
