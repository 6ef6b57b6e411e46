use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;

/// Whether consecutive frames belong to one continuous shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionMode {
    /// Every frame is searched from scratch.
    StillImage,
    /// The previous face may seed the search in the next frame.
    Video,
}

/// Domain interface for dense face landmark extraction.
///
/// Returns the landmarks of the first detected face, or `None` when the frame
/// has no face. Implementations may be stateful (tracking across frames),
/// hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>>;
}

/// Builds a fresh detector for each media input so tracking state never
/// leaks between requests.
pub trait LandmarkDetectorFactory: Send + Sync {
    fn create(
        &self,
        mode: DetectionMode,
    ) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>>;
}
