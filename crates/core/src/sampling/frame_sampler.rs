use std::path::{Path, PathBuf};

use crate::shared::constants::FALLBACK_NATIVE_FPS;
use crate::shared::error::PredictionError;
use crate::shared::frame::Frame;
use crate::shared::media_input::{MediaInput, MediaKind};
use crate::shared::media_metadata::MediaMetadata;
use crate::video::domain::video_reader::{FrameResult, VideoReader};

/// Source frames between two samples for a video recorded at `native_fps`
/// and analyzed at `target_sample_rate` frames per second.
///
/// A non-positive native rate means the container did not report one and
/// [`FALLBACK_NATIVE_FPS`] is assumed. Halfway ratios round to even.
/// Never returns less than 1.
pub fn sampling_stride(native_fps: f64, target_sample_rate: f64) -> usize {
    let native = if native_fps > 0.0 {
        native_fps
    } else {
        FALLBACK_NATIVE_FPS
    };
    let stride = (native / target_sample_rate).round_ties_even();
    if stride.is_finite() && stride >= 1.0 {
        stride as usize
    } else {
        1
    }
}

/// Turns one [`MediaInput`] into a finite, single-pass sequence of frames.
///
/// Owns the reader for the lifetime of the request and closes it on drop.
pub struct FrameSampler {
    reader: Box<dyn VideoReader>,
    metadata: MediaMetadata,
    stride: usize,
    path: PathBuf,
}

impl FrameSampler {
    /// Opens `input` with `reader`. Still images always use stride 1.
    pub fn open(
        mut reader: Box<dyn VideoReader>,
        input: &MediaInput,
        target_sample_rate: f64,
    ) -> Result<Self, PredictionError> {
        let metadata = reader
            .open(input.path())
            .map_err(|e| PredictionError::unreadable(input.path(), e))?;

        let stride = match input.kind() {
            MediaKind::StillImage => 1,
            MediaKind::Video => sampling_stride(metadata.fps, target_sample_rate),
        };

        log::debug!(
            "Sampling {} ({}x{}, {:.2} fps) every {stride} frame(s)",
            input.path().display(),
            metadata.width,
            metadata.height,
            metadata.fps,
        );

        Ok(Self {
            reader,
            metadata,
            stride,
            path: input.path().to_path_buf(),
        })
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Upper bound on the number of frames [`frames`](Self::frames) yields,
    /// or 0 when the container does not report a frame count.
    pub fn expected_samples(&self) -> usize {
        self.metadata.total_frames.div_ceil(self.stride)
    }

    /// Lazily yields the sampled frames. A decode failure ends the sequence
    /// with `UnreadableMedia`, as does a source that yields no frames at all.
    pub fn frames(&mut self) -> SampledFrames<'_> {
        SampledFrames {
            inner: self.reader.frames(self.stride),
            path: self.path.as_path(),
            yielded: 0,
            finished: false,
        }
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.reader.close();
    }
}

pub struct SampledFrames<'a> {
    inner: Box<dyn Iterator<Item = FrameResult> + 'a>,
    path: &'a Path,
    yielded: usize,
    finished: bool,
}

impl Iterator for SampledFrames<'_> {
    type Item = Result<Frame, PredictionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(Ok(frame)) => {
                self.yielded += 1;
                Some(Ok(frame))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(PredictionError::unreadable(self.path, e)))
            }
            None => {
                self.finished = true;
                (self.yielded == 0).then(|| {
                    Err(PredictionError::unreadable(
                        self.path,
                        "no decodable frames",
                    ))
                })
            }
        }
    }
}
