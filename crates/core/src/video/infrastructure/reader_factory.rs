use crate::shared::media_input::MediaKind;
use crate::video::domain::video_reader::{VideoReader, VideoReaderFactory};
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::image_file_reader::ImageFileReader;

/// Picks the ffmpeg-backed reader matching the kind of media.
#[derive(Default)]
pub struct FfmpegReaderFactory;

impl VideoReaderFactory for FfmpegReaderFactory {
    fn create(&self, kind: MediaKind) -> Box<dyn VideoReader> {
        match kind {
            MediaKind::StillImage => Box::new(ImageFileReader::new()),
            MediaKind::Video => Box::new(FfmpegReader::new()),
        }
    }
}
