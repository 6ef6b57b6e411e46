//! BlazeFace short-range face detector used to seed the face mesh.
use std::path::Path;

use super::execution_provider::load_session;
use super::math::{nms, sigmoid, ScoredBox};
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12).
const REGRESSOR_STRIDE: usize = 16;

/// Face boxes from an ONNX BlazeFace session, in frame pixels.
pub struct BlazeFace {
    session: ort::session::Session,
    anchors: Vec<[f32; 2]>,
}

impl BlazeFace {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
            anchors: generate_anchors(),
        })
    }

    /// Faces scoring at least `confidence`, after NMS, best first, at most
    /// `max_faces` of them.
    pub fn detect(
        &mut self,
        frame: &Frame,
        confidence: f64,
        max_faces: usize,
    ) -> Result<Vec<ScoredBox>, Box<dyn std::error::Error>> {
        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let raw = decode_boxes(
            &self.anchors,
            reg_data,
            score_data,
            confidence,
            frame.width(),
            frame.height(),
        );
        let mut kept = nms(raw, NMS_IOU_THRESH);
        kept.truncate(max_faces);
        Ok(kept)
    }
}

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

/// Decode anchor-relative regressions into frame-space boxes, dropping
/// anchors below `confidence`.
fn decode_boxes(
    anchors: &[[f32; 2]],
    reg_data: &[f32],
    score_data: &[f32],
    confidence: f64,
    fw: u32,
    fh: u32,
) -> Vec<ScoredBox> {
    let mut boxes = Vec::new();
    let size = INPUT_SIZE as f32;

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }

        let anchor = anchors[i];
        let cx = anchor[0] + reg_data[offset] / size;
        let cy = anchor[1] + reg_data[offset + 1] / size;
        let w = reg_data[offset + 2] / size;
        let h = reg_data[offset + 3] / size;

        boxes.push(ScoredBox {
            x1: ((cx - w / 2.0) * fw as f32).max(0.0) as f64,
            y1: ((cy - h / 2.0) * fh as f32).max(0.0) as f64,
            x2: ((cx + w / 2.0) * fw as f32).min(fw as f32) as f64,
            y2: ((cy + h / 2.0) * fh as f32).min(fh as f32) as f64,
            score: score as f64,
        });
    }

    boxes
}

/// Generate BlazeFace anchors for the short-range model.
///
/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}
