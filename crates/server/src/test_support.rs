//! Route-test fixtures: an in-memory database and a predictor wired to stub
//! media and landmark stages.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use ndarray::{Array1, Array2};
use tower::ServiceExt;

use deepcheck_core::detection::domain::landmark_detector::{
    DetectionMode, LandmarkDetector, LandmarkDetectorFactory,
};
use deepcheck_core::detection::domain::landmark_set::LandmarkSet;
use deepcheck_core::model::linear_projection::LinearProjection;
use deepcheck_core::model::pretrained_model::PretrainedModel;
use deepcheck_core::model::random_forest::{DecisionTree, RandomForest};
use deepcheck_core::pipeline::predict_media_use_case::PredictMediaUseCase;
use deepcheck_core::shared::config::PipelineConfig;
use deepcheck_core::shared::frame::Frame;
use deepcheck_core::shared::media_input::MediaKind;
use deepcheck_core::shared::media_metadata::MediaMetadata;
use deepcheck_core::video::domain::video_reader::{FrameResult, VideoReader, VideoReaderFactory};

use crate::domain::users::memory_pool;
use crate::AppState;

pub const SECRET: &[u8] = b"test-secret";

const LANDMARKS: usize = 4;
const FRAME_SIZE: u32 = 8;
const VIDEO_FRAMES: usize = 60;

/// Uploaded bytes steer the stubs: `corrupt...` fails to open and
/// `noface...` decodes to dark frames the detector finds no face in.
pub const CORRUPT_MEDIA: &[u8] = b"corrupt";
pub const FACELESS_MEDIA: &[u8] = b"noface";

struct StubReader {
    frames: usize,
    fill: u8,
}

impl VideoReader for StubReader {
    fn open(&mut self, path: &Path) -> Result<MediaMetadata, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        if bytes.starts_with(CORRUPT_MEDIA) {
            return Err("invalid data found when processing input".into());
        }
        if bytes.starts_with(FACELESS_MEDIA) {
            self.fill = 0;
        }
        Ok(MediaMetadata {
            width: FRAME_SIZE,
            height: FRAME_SIZE,
            fps: 30.0,
            total_frames: self.frames,
            codec: "stub".into(),
            source_path: Some(path.to_path_buf()),
            rotation: 0,
        })
    }

    fn frames(&mut self, stride: usize) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        let fill = self.fill;
        let len = (FRAME_SIZE * FRAME_SIZE * 3) as usize;
        Box::new(
            (0..self.frames)
                .step_by(stride.max(1))
                .map(move |i| Ok(Frame::new(vec![fill; len], FRAME_SIZE, FRAME_SIZE, i))),
        )
    }

    fn close(&mut self) {}
}

struct StubReaderFactory;

impl VideoReaderFactory for StubReaderFactory {
    fn create(&self, kind: MediaKind) -> Box<dyn VideoReader> {
        let frames = match kind {
            MediaKind::StillImage => 1,
            MediaKind::Video => VIDEO_FRAMES,
        };
        Box::new(StubReader { frames, fill: 255 })
    }
}

struct StubDetector;

impl LandmarkDetector for StubDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, Box<dyn std::error::Error>> {
        if frame.data().first() == Some(&0) {
            return Ok(None);
        }
        let wobble = (frame.index() % 3) as f64;
        Ok(Some(LandmarkSet::new(vec![
            (1.0, 1.0),
            (6.0, 2.0),
            (3.0, 5.0 + wobble),
            (7.0, 7.0),
        ])))
    }
}

struct StubDetectorFactory;

impl LandmarkDetectorFactory for StubDetectorFactory {
    fn create(
        &self,
        _mode: DetectionMode,
    ) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
        Ok(Box::new(StubDetector))
    }
}

/// One-leaf forest that always answers REAL with probability 0.75.
fn stub_model() -> PretrainedModel {
    let input_dim = LANDMARKS * 4;
    let mut components = Array2::<f64>::zeros((1, input_dim));
    components[[0, 0]] = 1.0;
    let reducer = LinearProjection::new(Array1::zeros(input_dim), components).unwrap();
    let tree = DecisionTree::new(vec![-1], vec![-1], vec![-2], vec![-2.0], vec![vec![1.0, 3.0]]);
    let classifier = RandomForest::new(vec![0, 1], 1, vec![tree]).unwrap();
    PretrainedModel::new(reducer, classifier).unwrap()
}

pub fn stub_predictor() -> PredictMediaUseCase {
    let config = PipelineConfig {
        landmark_count: LANDMARKS,
        ..PipelineConfig::default()
    };
    PredictMediaUseCase::new(
        Arc::new(stub_model()),
        Box::new(StubReaderFactory),
        Box::new(StubDetectorFactory),
        config,
    )
    .unwrap()
}

pub async fn test_state(require_auth: bool, upload_dir: &Path) -> Arc<AppState> {
    Arc::new(AppState {
        db: memory_pool().await,
        predictor: Arc::new(stub_predictor()),
        jwt_secret: SECRET.to_vec(),
        require_auth,
        secure_cookies: false,
        upload_dir: upload_dir.to_path_buf(),
    })
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Signs up and logs in, returning the `session=<token>` cookie pair.
pub async fn login_cookie(app: &Router, email: &str, password: &str) -> String {
    let credentials = serde_json::json!({ "email": email, "password": password });
    send(app, json_request("/signup", credentials.clone())).await;
    let response = send(app, json_request("/login", credentials)).await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

const BOUNDARY: &str = "deepcheck-test-boundary";

/// Multipart upload with a single field.
pub fn multipart_request(
    field: &str,
    file_name: &str,
    content: &[u8],
    cookie: Option<&str>,
) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post("/upload").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}
