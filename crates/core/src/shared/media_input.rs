use std::path::{Path, PathBuf};

use crate::shared::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    StillImage,
    Video,
}

/// A file handed to the pipeline for one prediction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaInput {
    path: PathBuf,
    kind: MediaKind,
}

impl MediaInput {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Classifies by extension. Anything that is not a known image extension
    /// is handed to the video decoder, which decides whether it is readable.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = if has_extension(&path, IMAGE_EXTENSIONS) {
            MediaKind::StillImage
        } else {
            MediaKind::Video
        };
        Self { path, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// True when the file name carries one of the supported image or video
/// extensions (case-insensitive).
pub fn is_supported_extension(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS) || has_extension(path, VIDEO_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("face.jpg", MediaKind::StillImage)]
    #[case("face.JPEG", MediaKind::StillImage)]
    #[case("face.png", MediaKind::StillImage)]
    #[case("face.bmp", MediaKind::StillImage)]
    #[case("face.webp", MediaKind::StillImage)]
    #[case("face.gif", MediaKind::StillImage)]
    #[case("clip.mp4", MediaKind::Video)]
    #[case("clip.MOV", MediaKind::Video)]
    #[case("clip.mkv", MediaKind::Video)]
    #[case("clip.unknown", MediaKind::Video)]
    #[case("no_extension", MediaKind::Video)]
    fn test_from_path_kind(#[case] name: &str, #[case] expected: MediaKind) {
        assert_eq!(MediaInput::from_path(name).kind(), expected);
    }

    #[rstest]
    #[case("a.mp4", true)]
    #[case("a.avi", true)]
    #[case("a.Png", true)]
    #[case("a.tiff", false)]
    #[case("a.exe", false)]
    #[case("mp4", false)]
    fn test_is_supported_extension(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_supported_extension(Path::new(name)), expected);
    }

    #[test]
    fn test_path_is_preserved() {
        let input = MediaInput::new("/uploads/x.mov", MediaKind::Video);
        assert_eq!(input.path(), Path::new("/uploads/x.mov"));
    }
}
