//! Pretrained PCA-style projection applied to the aggregate feature vector.

use ndarray::{Array1, Array2};
use serde::Deserialize;

use crate::shared::constants::MODEL_FORMAT_VERSION;
use crate::shared::error::PredictionError;

/// On-disk form of `reducer.json`.
#[derive(Deserialize)]
struct ReducerFile {
    format_version: u32,
    mean: Vec<f64>,
    /// One row per output dimension.
    components: Vec<Vec<f64>>,
    #[serde(default)]
    explained_variance: Option<Vec<f64>>,
    #[serde(default)]
    whiten: bool,
}

/// `reduce(x) = components · (x − mean)`, optionally divided by the square
/// root of the explained variance per component.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ReducerFile")]
pub struct LinearProjection {
    mean: Array1<f64>,
    components: Array2<f64>,
    whitening: Option<Array1<f64>>,
}

impl LinearProjection {
    /// Builds a projection without whitening.
    pub fn new(mean: Array1<f64>, components: Array2<f64>) -> Result<Self, String> {
        if components.ncols() != mean.len() {
            return Err(format!(
                "components have {} columns but mean has {} entries",
                components.ncols(),
                mean.len()
            ));
        }
        if components.nrows() == 0 {
            return Err("projection has no components".into());
        }
        Ok(Self {
            mean,
            components,
            whitening: None,
        })
    }

    /// Divides each output by `sqrt(explained_variance[i])`.
    pub fn with_whitening(mut self, explained_variance: Array1<f64>) -> Result<Self, String> {
        if explained_variance.len() != self.components.nrows() {
            return Err(format!(
                "explained_variance has {} entries for {} components",
                explained_variance.len(),
                self.components.nrows()
            ));
        }
        if explained_variance.iter().any(|&v| v.is_nan() || v <= 0.0) {
            return Err("explained_variance must be positive to whiten".into());
        }
        self.whitening = Some(explained_variance.mapv(f64::sqrt));
        Ok(self)
    }

    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    pub fn output_dim(&self) -> usize {
        self.components.nrows()
    }

    pub fn reduce(&self, x: &Array1<f64>) -> Result<Array1<f64>, PredictionError> {
        if x.len() != self.input_dim() {
            return Err(PredictionError::FeatureDimensionMismatch {
                expected: self.input_dim(),
                actual: x.len(),
            });
        }
        let centered = x - &self.mean;
        let projected = self.components.dot(&centered);
        Ok(match &self.whitening {
            Some(scale) => projected / scale,
            None => projected,
        })
    }
}

impl TryFrom<ReducerFile> for LinearProjection {
    type Error = String;

    fn try_from(file: ReducerFile) -> Result<Self, Self::Error> {
        if file.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {MODEL_FORMAT_VERSION})",
                file.format_version
            ));
        }

        let rows = file.components.len();
        let cols = file.mean.len();
        if let Some((i, row)) = file
            .components
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != cols)
        {
            return Err(format!(
                "component {i} has {} entries, expected {cols}",
                row.len()
            ));
        }
        let flat: Vec<f64> = file.components.into_iter().flatten().collect();
        let components = Array2::from_shape_vec((rows, cols), flat).map_err(|e| e.to_string())?;

        let projection = Self::new(Array1::from(file.mean), components)?;
        match (file.whiten, file.explained_variance) {
            (false, _) => Ok(projection),
            (true, Some(variance)) => projection.with_whitening(Array1::from(variance)),
            (true, None) => Err("whiten is set but explained_variance is missing".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn projection() -> LinearProjection {
        LinearProjection::new(
            array![1.0, 2.0, 3.0],
            array![[1.0, 0.0, 0.0], [0.5, 0.5, -1.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_reduce_centres_then_projects() {
        let out = projection().reduce(&array![2.0, 4.0, 3.0]).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 1.5);
    }

    #[test]
    fn test_whitening_divides_by_sqrt_variance() {
        let p = projection().with_whitening(array![4.0, 0.25]).unwrap();
        let out = p.reduce(&array![2.0, 4.0, 3.0]).unwrap();
        assert_relative_eq!(out[0], 0.5);
        assert_relative_eq!(out[1], 3.0);
    }

    #[test]
    fn test_wrong_length_is_dimension_mismatch() {
        let err = projection().reduce(&array![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            PredictionError::FeatureDimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "format_version": 1,
            "mean": [0.0, 0.0],
            "components": [[1.0, 1.0]],
            "explained_variance": [9.0],
            "whiten": true
        }"#;
        let p: LinearProjection = serde_json::from_str(json).unwrap();
        assert_eq!(p.input_dim(), 2);
        assert_eq!(p.output_dim(), 1);
        assert_relative_eq!(p.reduce(&array![1.5, 1.5]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_rejects_ragged_components() {
        let json = r#"{"format_version": 1, "mean": [0.0, 0.0], "components": [[1.0, 1.0], [1.0]]}"#;
        let err = serde_json::from_str::<LinearProjection>(json).unwrap_err();
        assert!(err.to_string().contains("component 1"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let json = r#"{"format_version": 2, "mean": [0.0], "components": [[1.0]]}"#;
        let err = serde_json::from_str::<LinearProjection>(json).unwrap_err();
        assert!(err.to_string().contains("format_version"));
    }

    #[test]
    fn test_rejects_whiten_without_variance() {
        let json = r#"{"format_version": 1, "mean": [0.0], "components": [[1.0]], "whiten": true}"#;
        assert!(serde_json::from_str::<LinearProjection>(json).is_err());
    }
}
