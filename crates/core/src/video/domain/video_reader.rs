use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::media_input::MediaKind;
use crate::shared::media_metadata::MediaMetadata;

pub type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Reads frames from a video or image source.
///
/// Implementations handle I/O details (codec, container format, etc.)
/// while the pipeline works with the abstract `Frame` and `MediaMetadata`
/// types.
pub trait VideoReader: Send {
    /// Opens a video or image file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>>;

    /// Returns a lazy iterator over every `stride`-th frame in decode order,
    /// starting with frame 0. Skipped frames are never converted to RGB.
    /// Each yielded frame keeps its index in the source.
    fn frames(&mut self, stride: usize) -> Box<dyn Iterator<Item = FrameResult> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}

/// Chooses a reader for a kind of media. One reader is created per input.
pub trait VideoReaderFactory: Send + Sync {
    fn create(&self, kind: MediaKind) -> Box<dyn VideoReader>;
}
