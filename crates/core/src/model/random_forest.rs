//! Pretrained decision-forest classifier.
//!
//! Trees are stored as parallel node arrays: node `i` is a leaf when
//! `children_left[i] == -1`; otherwise samples with
//! `x[feature[i]] <= threshold[i]` go to `children_left[i]` and the rest to
//! `children_right[i]`. `value[i]` holds the per-class weights at node `i`.

use ndarray::Array1;
use serde::Deserialize;

use crate::model::prediction::{Label, PredictionResult};
use crate::shared::constants::MODEL_FORMAT_VERSION;
use crate::shared::error::PredictionError;

const LEAF: i64 = -1;

/// Class id the training labels used for authentic media.
const REAL_CLASS: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    value: Vec<Vec<f64>>,
}

impl DecisionTree {
    pub fn new(
        children_left: Vec<i64>,
        children_right: Vec<i64>,
        feature: Vec<i64>,
        threshold: Vec<f64>,
        value: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            children_left,
            children_right,
            feature,
            threshold,
            value,
        }
    }

    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    /// Checks array lengths and node references. Children must come after
    /// their parent, which also rules out cycles.
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(format!("node arrays differ in length (expected {n})"));
        }

        for i in 0..n {
            let weights = &self.value[i];
            if weights.len() != n_classes {
                return Err(format!(
                    "node {i} has {} class weights, expected {n_classes}",
                    weights.len()
                ));
            }

            if self.children_left[i] == LEAF {
                let invalid = weights.iter().any(|&w| w.is_nan() || w < 0.0);
                if invalid || weights.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {i} has no positive class weight"));
                }
                continue;
            }

            for child in [self.children_left[i], self.children_right[i]] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(format!("node {i} has invalid child {child}"));
                }
            }
            if self.feature[i] < 0 || self.feature[i] >= n_features as i64 {
                return Err(format!(
                    "node {i} splits on feature {} of {n_features}",
                    self.feature[i]
                ));
            }
        }
        Ok(())
    }

    /// Class weights of the leaf `x` falls into.
    fn leaf_weights(&self, x: &Array1<f64>) -> &[f64] {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            node = if x[self.feature[node] as usize] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.value[node]
    }
}

/// On-disk form of `classifier.json`.
#[derive(Deserialize)]
struct ClassifierFile {
    format_version: u32,
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ClassifierFile")]
pub struct RandomForest {
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(
        classes: Vec<i64>,
        n_features: usize,
        trees: Vec<DecisionTree>,
    ) -> Result<Self, String> {
        if classes.is_empty() {
            return Err("forest has no classes".into());
        }
        if trees.is_empty() {
            return Err("forest has no trees".into());
        }
        for (t, tree) in trees.iter().enumerate() {
            tree.validate(n_features, classes.len())
                .map_err(|e| format!("tree {t}: {e}"))?;
        }
        Ok(Self {
            classes,
            n_features,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Mean over trees of each tree's normalized leaf distribution.
    pub fn predict_proba(&self, x: &Array1<f64>) -> Result<Array1<f64>, PredictionError> {
        if x.len() != self.n_features {
            return Err(PredictionError::FeatureDimensionMismatch {
                expected: self.n_features,
                actual: x.len(),
            });
        }

        let mut proba = Array1::<f64>::zeros(self.classes.len());
        for tree in &self.trees {
            let weights = tree.leaf_weights(x);
            let total: f64 = weights.iter().sum();
            for (p, w) in proba.iter_mut().zip(weights) {
                *p += w / total;
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    /// Most probable class (lowest index on ties) and its probability.
    pub fn predict(&self, x: &Array1<f64>) -> Result<PredictionResult, PredictionError> {
        let proba = self.predict_proba(x)?;
        let (index, confidence) = proba
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        let label = if self.classes[index] == REAL_CLASS {
            Label::Real
        } else {
            Label::Deepfake
        };
        Ok(PredictionResult { label, confidence })
    }
}

impl TryFrom<ClassifierFile> for RandomForest {
    type Error = String;

    fn try_from(file: ClassifierFile) -> Result<Self, Self::Error> {
        if file.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {MODEL_FORMAT_VERSION})",
                file.format_version
            ));
        }
        Self::new(file.classes, file.n_features, file.trees)
    }
}
