use std::path::Path;

use ffmpeg_next::codec::packet::side_data::Type as SideDataType;
use ffmpeg_next::util::frame::video::Video;
use image::metadata::Orientation;

use super::rgb::{extract_rgb_pixels, orient_rgb, rgb_scaler, rotation_orientation};
use crate::shared::frame::Frame;
use crate::shared::media_metadata::MediaMetadata;
use crate::video::domain::video_reader::{FrameResult, VideoReader};

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Every packet is decoded, since inter-coded frames depend on their
/// neighbours, but only frames on the sampling stride are converted to RGB.
/// Streams carrying a display rotation (portrait phone footage) are turned
/// upright after conversion.
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
    rotation: u32,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
            rotation: 0,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rotation = extract_rotation(&stream);
        let (width, height) = match rotation {
            90 | 270 => (decoder.height(), decoder.width()),
            _ => (decoder.width(), decoder.height()),
        };
        if rotation != 0 {
            log::debug!("{} is stored rotated by {rotation} degrees", path.display());
        }

        let metadata = MediaMetadata {
            width,
            height,
            fps: stream_fps(&stream),
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
            rotation,
        };

        self.video_stream_index = video_stream_index;
        self.rotation = rotation;
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(&mut self, stride: usize) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        let video_stream_index = self.video_stream_index;
        let orientation = rotation_orientation(self.rotation);
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        match FfmpegFrameIter::new(ictx, video_stream_index, stride.max(1), orientation) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
        self.rotation = 0;
    }
}

/// Frame rate from the stream's base rate, falling back to the average rate.
/// Returns 0.0 when the container reports neither.
fn stream_fps(stream: &ffmpeg_next::format::stream::Stream) -> f64 {
    [stream.rate(), stream.avg_frame_rate()]
        .into_iter()
        .find(|r| r.numerator() > 0 && r.denominator() > 0)
        .map(|r| r.numerator() as f64 / r.denominator() as f64)
        .unwrap_or(0.0)
}

/// Clockwise degrees (0, 90, 180 or 270) that bring the stream's frames
/// upright. Reads the display matrix side data, then the legacy `rotate`
/// tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> u32 {
    let from_matrix = stream
        .side_data()
        .filter(|side_data| side_data.kind() == SideDataType::DisplayMatrix)
        .find_map(|side_data| parse_display_matrix(side_data.data()));
    if let Some(angle) = from_matrix {
        return normalize_rotation(angle);
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|tag| tag.trim().parse::<i32>().ok())
        .map(normalize_rotation)
        .unwrap_or(0)
}

/// Clockwise display angle in degrees from a 3x3 display matrix: nine
/// little-endian 16.16 fixed-point `i32`s in row-major order. The angle is
/// `atan2(m[1], m[0])`, the inverse of the counter-clockwise angle libavutil
/// reports.
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }
    let m0 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m1 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;
    if m0 == 0.0 && m1 == 0.0 {
        return None;
    }
    Some(m1.atan2(m0).to_degrees().round() as i32)
}

/// Snaps an angle to the nearest quarter turn in `0..360`.
fn normalize_rotation(angle: i32) -> u32 {
    match angle.rem_euclid(360) {
        45..=134 => 90,
        135..=224 => 180,
        225..=315 => 270,
        _ => 0,
    }
}

/// Lazy iterator that decodes one frame at a time, so at most the current
/// frame is held in memory.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    orientation: Orientation,
    video_stream_index: usize,
    stride: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl<'a> FfmpegFrameIter<'a> {
    fn new(
        ictx: &'a mut ffmpeg_next::format::context::Input,
        video_stream_index: usize,
        stride: usize,
        orientation: Orientation,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .stream(video_stream_index)
            .ok_or("Video stream disappeared after open")?;
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let scaler = rgb_scaler(&decoder)?;

        Ok(Self {
            width: decoder.width(),
            height: decoder.height(),
            orientation,
            ictx,
            decoder,
            scaler,
            video_stream_index,
            stride,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn receive_decoded(&mut self) -> Option<Video> {
        let mut decoded = Video::empty();
        self.decoder.receive_frame(&mut decoded).ok().map(|_| decoded)
    }

    /// Sends the next packet of the video stream to the decoder, or EOF once
    /// the container is exhausted.
    fn feed_decoder(&mut self) {
        for (stream, packet) in self.ictx.packets() {
            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_ok() {
                return;
            }
        }
        let _ = self.decoder.send_eof();
        self.flushing = true;
    }

    fn convert(&mut self, decoded: &Video, index: usize) -> FrameResult {
        let mut rgb_frame = Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let (pixels, width, height) =
            orient_rgb(pixels, self.width, self.height, self.orientation)?;
        Ok(Frame::new(pixels, width, height, index))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.receive_decoded() {
                Some(decoded) => {
                    let index = self.frame_index;
                    self.frame_index += 1;
                    if index % self.stride != 0 {
                        continue;
                    }
                    return Some(self.convert(&decoded, index));
                }
                None if self.flushing => self.done = true,
                None => self.feed_decoder(),
            }
        }
        None
    }
}
