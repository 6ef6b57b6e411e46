use std::path::PathBuf;

/// What a reader learned about a source when opening it.
///
/// Still images are described as single-frame media with `fps == 0.0`.
/// `width` and `height` describe frames as the reader yields them, which is
/// after `rotation` has been applied.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count reported by the container; 0 when unknown.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
    /// Clockwise degrees (0, 90, 180 or 270) the stored frames were turned
    /// to bring them upright.
    pub rotation: u32,
}
