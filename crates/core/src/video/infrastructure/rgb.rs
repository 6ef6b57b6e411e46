//! Decoder-to-RGB helpers shared by the ffmpeg-backed readers, including
//! uprighting of rotated sources.

use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use image::metadata::Orientation;
use image::{DynamicImage, RgbImage};

/// Scaler converting the decoder's native pixel format to RGB24 at the same
/// resolution.
pub(super) fn rgb_scaler(
    decoder: &ffmpeg_next::decoder::Video,
) -> Result<scaling::Context, ffmpeg_next::Error> {
    scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        scaling::Flags::BILINEAR,
    )
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This strips that padding to produce a tightly-packed pixel buffer.
pub(super) fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

/// Transform that turns a frame stored with a clockwise `rotation` (0, 90,
/// 180 or 270 degrees) upright.
pub(super) fn rotation_orientation(rotation: u32) -> Orientation {
    match rotation {
        90 => Orientation::Rotate90,
        180 => Orientation::Rotate180,
        270 => Orientation::Rotate270,
        _ => Orientation::NoTransforms,
    }
}

/// Clockwise rotation part of an EXIF orientation. Mirroring is ignored.
pub(super) fn orientation_rotation(orientation: Orientation) -> u32 {
    match orientation {
        Orientation::Rotate90 | Orientation::Rotate90FlipH => 90,
        Orientation::Rotate180 | Orientation::FlipVertical => 180,
        Orientation::Rotate270 | Orientation::Rotate270FlipH => 270,
        _ => 0,
    }
}

/// Applies `orientation` to a tightly packed RGB buffer. Returns the new
/// buffer with its width and height, which are swapped by quarter turns.
pub(super) fn orient_rgb(
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    orientation: Orientation,
) -> Result<(Vec<u8>, u32, u32), Box<dyn std::error::Error>> {
    if matches!(orientation, Orientation::NoTransforms) {
        return Ok((pixels, width, height));
    }
    let buffer = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| format!("RGB buffer does not hold a {width}x{height} frame"))?;
    let mut image = DynamicImage::ImageRgb8(buffer);
    image.apply_orientation(orientation);
    let upright = image.into_rgb8();
    let (width, height) = upright.dimensions();
    Ok((upright.into_raw(), width, height))
}
