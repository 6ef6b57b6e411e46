use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::landmark_detector::{DetectionMode, LandmarkDetectorFactory};
use crate::features::aggregator::TemporalAggregator;
use crate::features::normalizer::normalize;
use crate::model::prediction::PredictionResult;
use crate::model::pretrained_model::PretrainedModel;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::sampling::frame_sampler::FrameSampler;
use crate::shared::config::PipelineConfig;
use crate::shared::constants::REDUCER_FILE_NAME;
use crate::shared::error::PredictionError;
use crate::shared::media_input::{MediaInput, MediaKind};
use crate::video::domain::video_reader::VideoReaderFactory;

/// Media in, verdict out: sample → landmarks → normalize → aggregate →
/// reduce → classify.
///
/// Holds only shared, read-only state; readers and detectors are created
/// per call and dropped before `execute` returns, so one instance serves
/// concurrent requests.
pub struct PredictMediaUseCase {
    model: Arc<PretrainedModel>,
    readers: Box<dyn VideoReaderFactory>,
    detectors: Box<dyn LandmarkDetectorFactory>,
    config: PipelineConfig,
}

impl PredictMediaUseCase {
    /// Fails with `ModelLoad` when the model does not accept the aggregate
    /// vector `config.landmark_count` landmarks produce.
    pub fn new(
        model: Arc<PretrainedModel>,
        readers: Box<dyn VideoReaderFactory>,
        detectors: Box<dyn LandmarkDetectorFactory>,
        config: PipelineConfig,
    ) -> Result<Self, PredictionError> {
        if model.input_dim() != config.aggregate_len() {
            return Err(PredictionError::model_load(
                REDUCER_FILE_NAME,
                format!(
                    "model expects {} features but {} landmarks produce {}",
                    model.input_dim(),
                    config.landmark_count,
                    config.aggregate_len()
                ),
            ));
        }
        Ok(Self {
            model,
            readers,
            detectors,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn execute(
        &self,
        input: &MediaInput,
        logger: &mut dyn PipelineLogger,
    ) -> Result<PredictionResult, PredictionError> {
        let reader = self.readers.create(input.kind());
        let mut sampler = FrameSampler::open(reader, input, self.config.target_sample_rate)?;
        let expected = sampler.expected_samples();

        let mode = match input.kind() {
            MediaKind::StillImage => DetectionMode::StillImage,
            MediaKind::Video => DetectionMode::Video,
        };
        let mut detector = self
            .detectors
            .create(mode)
            .map_err(|e| PredictionError::Detection(e.to_string()))?;

        let frame_len = 2 * self.config.landmark_count;
        let mut aggregator = TemporalAggregator::new();
        let mut sampled = 0;
        let mut frames = sampler.frames();

        loop {
            let t0 = Instant::now();
            let Some(frame) = frames.next() else {
                break;
            };
            let frame = frame?;
            logger.timing("decode", elapsed_ms(t0));
            sampled += 1;

            let t0 = Instant::now();
            let landmarks = detector
                .detect(&frame)
                .map_err(|e| PredictionError::Detection(e.to_string()))?;
            logger.timing("landmarks", elapsed_ms(t0));

            if let Some(landmarks) = landmarks {
                let features = normalize(&landmarks);
                if features.len() != frame_len {
                    return Err(PredictionError::FeatureDimensionMismatch {
                        expected: frame_len,
                        actual: features.len(),
                    });
                }
                aggregator.push(&features)?;
            } else {
                log::trace!("No face in frame {}", frame.index());
            }
            logger.progress(sampled, expected);
        }

        logger.metric("frames_sampled", sampled as f64);
        logger.metric("faces_found", aggregator.count() as f64);
        log::debug!(
            "{}: {} of {sampled} sampled frames had a face",
            input.path().display(),
            aggregator.count()
        );

        let t0 = Instant::now();
        let aggregate = aggregator.finish()?;
        let result = self.model.predict(&aggregate)?;
        logger.timing("classify", elapsed_ms(t0));
        logger.info(&format!("{}: {result}", input.path().display()));

        Ok(result)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
