//! Dense face landmarks from the MediaPipe face mesh via ONNX Runtime.
//!
//! A face is located with BlazeFace (or, in video mode, with the landmarks
//! of the previous frame), a padded square around it is resized to the mesh
//! input, and the mesh returns 468 points in crop pixels plus a face
//! presence logit.
use std::path::Path;

use ndarray::Array4;

use super::blazeface::BlazeFace;
use super::execution_provider::load_session;
use super::math::{sigmoid, ScoredBox};
use crate::detection::domain::landmark_detector::{DetectionMode, LandmarkDetector};
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::config::PipelineConfig;
use crate::shared::frame::Frame;

/// Face mesh input resolution.
const MESH_INPUT_SIZE: u32 = 192;

/// Fraction of the face box added around it before cropping.
const CROP_PADDING: f64 = 0.25;

/// Crops smaller than this many pixels are not worth running the mesh on.
const MIN_CROP_SIZE: f64 = 8.0;

/// Values per landmark in the mesh output (x, y, z).
const COORDS_PER_LANDMARK: usize = 3;

/// Thresholds for [`OnnxFaceMeshDetector`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub max_faces: usize,
    pub detection_confidence: f64,
    pub tracking_confidence: f64,
}

impl From<&PipelineConfig> for DetectorSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_faces: config.max_faces,
            detection_confidence: config.detection_confidence,
            tracking_confidence: config.tracking_confidence,
        }
    }
}

/// Square region of the frame fed to the mesh, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CropRect {
    x: f64,
    y: f64,
    size: f64,
}

/// Carries the face region from one video frame to the next.
///
/// The region is consumed by every lookup, so it survives only while each
/// frame re-arms it with a presence at or above the tracking threshold.
/// A disabled tracker (still images) never holds a region.
#[derive(Clone, Debug, PartialEq)]
struct RoiTracker {
    enabled: bool,
    min_presence: f64,
    roi: Option<ScoredBox>,
}

impl RoiTracker {
    fn new(enabled: bool, min_presence: f64) -> Self {
        Self {
            enabled,
            min_presence,
            roi: None,
        }
    }

    fn take(&mut self) -> Option<ScoredBox> {
        self.roi.take()
    }

    /// Records the landmark bounds `(x1, y1, x2, y2)` of the current frame.
    fn update(&mut self, bounds: Option<(f64, f64, f64, f64)>, presence: f64) {
        self.roi = if self.enabled && presence >= self.min_presence {
            bounds.map(|(x1, y1, x2, y2)| ScoredBox {
                x1,
                y1,
                x2,
                y2,
                score: presence,
            })
        } else {
            None
        };
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TensorLayout {
    Nchw,
    Nhwc,
}

pub struct OnnxFaceMeshDetector {
    face_detector: BlazeFace,
    mesh: ort::session::Session,
    layout: TensorLayout,
    settings: DetectorSettings,
    tracker: RoiTracker,
}

impl OnnxFaceMeshDetector {
    pub fn new(
        detection_model: &Path,
        mesh_model: &Path,
        settings: DetectorSettings,
        mode: DetectionMode,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let face_detector = BlazeFace::new(detection_model)?;
        let mesh = load_session(mesh_model)?;

        // Converted TFLite graphs keep NHWC; fall back to NCHW otherwise.
        let layout = mesh
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    (shape.len() == 4 && shape[3] == 3).then_some(TensorLayout::Nhwc)
                } else {
                    None
                }
            })
            .unwrap_or(TensorLayout::Nchw);

        Ok(Self {
            face_detector,
            mesh,
            layout,
            settings,
            tracker: RoiTracker::new(mode == DetectionMode::Video, settings.tracking_confidence),
        })
    }

    fn search_region(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<ScoredBox>, Box<dyn std::error::Error>> {
        if let Some(roi) = self.tracker.take() {
            return Ok(Some(roi));
        }
        let faces = self.face_detector.detect(
            frame,
            self.settings.detection_confidence,
            self.settings.max_faces,
        )?;
        Ok(faces.into_iter().next())
    }

    /// Runs the mesh on `crop`. Returns raw crop-space coordinates and the
    /// face presence probability.
    fn run_mesh(
        &mut self,
        frame: &Frame,
        crop: &CropRect,
    ) -> Result<(Vec<f32>, f64), Box<dyn std::error::Error>> {
        let tensor = crop_tensor(frame, crop, MESH_INPUT_SIZE, self.layout);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.mesh.run(ort::inputs![input_value])?;

        // landmarks: [1, 1404] or [1, 1, 1, 1404]; face flag: [1, 1] logit
        if outputs.len() < 2 {
            return Err(
                format!("Face mesh model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let logit = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .ok_or("Face mesh presence output is empty")?;

        Ok((coords, sigmoid(logit) as f64))
    }
}

impl LandmarkDetector for OnnxFaceMeshDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>> {
        let Some(roi) = self.search_region(frame)? else {
            return Ok(None);
        };
        let Some(crop) = square_crop(&roi, frame.width(), frame.height(), CROP_PADDING) else {
            return Ok(None);
        };

        let (coords, presence) = self.run_mesh(frame, &crop)?;
        if presence < self.settings.detection_confidence {
            log::trace!("Frame {}: face presence {presence:.3} too low", frame.index());
            return Ok(None);
        }

        let normalized = crop_to_frame(&coords, &crop, frame.width(), frame.height());
        let landmarks = LandmarkSet::from_normalized(&normalized, frame.width(), frame.height());

        self.tracker.update(landmarks.bounds(), presence);
        Ok(Some(landmarks))
    }
}

/// Pads `roi` by `pad_ratio`, squares it around its centre and clamps it to
/// the frame. Returns `None` when too little of it remains.
fn square_crop(roi: &ScoredBox, frame_w: u32, frame_h: u32, pad_ratio: f64) -> Option<CropRect> {
    let size = roi.width().max(roi.height()) * (1.0 + pad_ratio);
    let center_x = roi.x1 + roi.width() / 2.0;
    let center_y = roi.y1 + roi.height() / 2.0;

    let mut x = center_x - size / 2.0;
    let mut y = center_y - size / 2.0;
    let mut s = size;

    if x < 0.0 {
        s += x;
        x = 0.0;
    }
    if y < 0.0 {
        s += y;
        y = 0.0;
    }
    s = s.min(frame_w as f64 - x).min(frame_h as f64 - y);

    (s >= MIN_CROP_SIZE).then_some(CropRect { x, y, size: s })
}

/// Nearest-neighbour resample of `crop` to `size × size`, scaled to [0,1].
fn crop_tensor(frame: &Frame, crop: &CropRect, size: u32, layout: TensorLayout) -> Array4<f32> {
    let src = frame.as_ndarray();
    let max_x = frame.width() as usize - 1;
    let max_y = frame.height() as usize - 1;
    let s = size as usize;
    let step = crop.size / s as f64;

    let mut tensor = match layout {
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
    };

    for y in 0..s {
        let src_y = ((crop.y + (y as f64 + 0.5) * step) as usize).min(max_y);
        for x in 0..s {
            let src_x = ((crop.x + (x as f64 + 0.5) * step) as usize).min(max_x);
            for c in 0..3 {
                let v = src[[src_y, src_x, c]] as f32 / 255.0;
                match layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                }
            }
        }
    }

    tensor
}

/// Maps mesh output (crop pixels at mesh resolution, `x, y, z` triples) to
/// normalized frame coordinates. The depth channel is dropped.
fn crop_to_frame(coords: &[f32], crop: &CropRect, frame_w: u32, frame_h: u32) -> Vec<(f64, f64)> {
    let scale = crop.size / MESH_INPUT_SIZE as f64;
    coords
        .chunks_exact(COORDS_PER_LANDMARK)
        .map(|p| {
            let x = crop.x + p[0] as f64 * scale;
            let y = crop.y + p[1] as f64 * scale;
            (x / frame_w as f64, y / frame_h as f64)
        })
        .collect()
}
