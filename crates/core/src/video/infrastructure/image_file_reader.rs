use std::path::Path;

use image::metadata::Orientation;
use image::{ImageDecoder, ImageReader};

use super::rgb::{extract_rgb_pixels, orient_rgb, orientation_rotation, rgb_scaler};
use crate::shared::frame::Frame;
use crate::shared::media_metadata::MediaMetadata;
use crate::video::domain::video_reader::{FrameResult, VideoReader};

/// Adapts a single image file to the [`VideoReader`] interface.
///
/// Treats the image as a one-frame source with `fps=0` and `total_frames=1`.
/// Animated formats (GIF) contribute only their first frame. The stride
/// passed to [`VideoReader::frames`] is irrelevant for a single frame.
///
/// Uses ffmpeg for decoding, which is significantly faster than the pure-Rust
/// `image` crate for large images (e.g. 4032x3024 JPEG). The `image` crate
/// only reads the EXIF orientation, which is applied to the decoded pixels.
pub struct ImageFileReader {
    frame: Option<Frame>,
}

// Safety: ImageFileReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for ImageFileReader {}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { frame: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_first_frame(
    ictx: &mut ffmpeg_next::format::context::Input,
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
) -> Result<Frame, Box<dyn std::error::Error>> {
    for (stream, packet) in ictx.packets() {
        if stream.index() != video_stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        if let Some(frame) = try_receive_frame(decoder, scaler)? {
            return Ok(frame);
        }
    }

    // Flush decoder for formats that buffer the single frame
    let _ = decoder.send_eof();
    try_receive_frame(decoder, scaler)?.ok_or_else(|| "Failed to decode image".into())
}

/// EXIF orientation of the file. Formats the `image` crate cannot parse are
/// treated as upright.
fn exif_orientation(path: &Path) -> Orientation {
    let read = || -> Result<Orientation, Box<dyn std::error::Error>> {
        let mut decoder = ImageReader::open(path)?
            .with_guessed_format()?
            .into_decoder()?;
        Ok(decoder.orientation()?)
    };
    read().unwrap_or_else(|e| {
        log::debug!("No orientation for {}: {e}", path.display());
        Orientation::NoTransforms
    })
}

fn try_receive_frame(
    decoder: &mut ffmpeg_next::decoder::Video,
    scaler: &mut ffmpeg_next::software::scaling::Context,
) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    if decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
    scaler.run(&decoded, &mut rgb_frame)?;
    let (width, height) = (decoder.width(), decoder.height());
    let pixels = extract_rgb_pixels(&rgb_frame, width, height);
    Ok(Some(Frame::new(pixels, width, height, 0)))
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No image data found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let mut decoder = codec_ctx.decoder().video()?;
        let mut scaler = rgb_scaler(&decoder)?;

        let stored = decode_first_frame(&mut ictx, &mut decoder, &mut scaler, video_stream_index)?;
        let orientation = exif_orientation(path);
        let (pixels, width, height) = orient_rgb(
            stored.data().to_vec(),
            stored.width(),
            stored.height(),
            orientation,
        )?;
        let frame = Frame::new(pixels, width, height, 0);

        let metadata = MediaMetadata {
            width: frame.width(),
            height: frame.height(),
            fps: 0.0,
            total_frames: 1,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
            rotation: orientation_rotation(orientation),
        };
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(&mut self, _stride: usize) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        if self.frame.is_none() {
            return Box::new(std::iter::once(Err("ImageFileReader: not opened".into())));
        }
        Box::new(self.frame.take().into_iter().map(Ok))
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
