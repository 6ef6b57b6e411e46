//! Per-frame landmark normalization.
//!
//! Removes face position and scale so that only the shape of the landmark
//! cloud reaches the classifier.

use ndarray::{Array1, Array2, Axis};

use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::constants::NORMALIZATION_EPSILON;

/// Standardizes each axis to zero mean and unit population deviation, then
/// flattens point-major: `[x0, y0, x1, y1, ...]`, length `2 * K`.
pub fn normalize(landmarks: &LandmarkSet) -> Array1<f64> {
    let k = landmarks.len();
    if k == 0 {
        return Array1::zeros(0);
    }

    let points = Array2::from_shape_fn((k, 2), |(i, axis)| {
        let (x, y) = landmarks.points()[i];
        if axis == 0 {
            x
        } else {
            y
        }
    });

    let mean = points.sum_axis(Axis(0)) / k as f64;
    let std = points.std_axis(Axis(0), 0.0);
    let normalized = (&points - &mean) / (std + NORMALIZATION_EPSILON);

    normalized.iter().copied().collect()
}
