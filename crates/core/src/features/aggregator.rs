//! Temporal summary of per-frame feature vectors.

use ndarray::{s, Array1};

use crate::shared::error::PredictionError;

/// Streaming element-wise mean and population standard deviation
/// (Welford's algorithm). Frame vectors are folded in one at a time and
/// never buffered.
#[derive(Debug, Default)]
pub struct TemporalAggregator {
    count: usize,
    mean: Array1<f64>,
    m2: Array1<f64>,
}

impl TemporalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors folded in so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn push(&mut self, vector: &Array1<f64>) -> Result<(), PredictionError> {
        if self.count == 0 {
            self.mean = Array1::zeros(vector.len());
            self.m2 = Array1::zeros(vector.len());
        } else if vector.len() != self.mean.len() {
            return Err(PredictionError::FeatureDimensionMismatch {
                expected: self.mean.len(),
                actual: vector.len(),
            });
        }

        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), &x) in self
            .mean
            .iter_mut()
            .zip(self.m2.iter_mut())
            .zip(vector.iter())
        {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
        Ok(())
    }

    /// `[mean ++ std]`, twice the frame vector length. Fails with
    /// `NoFaceDetected` when nothing was pushed.
    pub fn finish(self) -> Result<Array1<f64>, PredictionError> {
        if self.count == 0 {
            return Err(PredictionError::NoFaceDetected);
        }
        let n = self.count as f64;
        let len = self.mean.len();
        let mut out = Array1::zeros(2 * len);
        out.slice_mut(s![..len]).assign(&self.mean);
        out.slice_mut(s![len..])
            .assign(&self.m2.mapv(|m2| (m2 / n).max(0.0).sqrt()));
        Ok(out)
    }
}

/// Aggregates a whole sequence at once.
pub fn aggregate<'a>(
    vectors: impl IntoIterator<Item = &'a Array1<f64>>,
) -> Result<Array1<f64>, PredictionError> {
    let mut aggregator = TemporalAggregator::new();
    for v in vectors {
        aggregator.push(v)?;
    }
    aggregator.finish()
}
