pub const FACE_DETECTION_MODEL_NAME: &str = "face_detection_short_range.onnx";
pub const FACE_MESH_MODEL_NAME: &str = "face_landmark.onnx";

/// Landmarks produced by the MediaPipe face mesh (without iris refinement).
pub const FACE_MESH_LANDMARK_COUNT: usize = 468;

pub const REDUCER_FILE_NAME: &str = "reducer.json";
pub const CLASSIFIER_FILE_NAME: &str = "classifier.json";
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Assumed when a container does not report its frame rate.
pub const FALLBACK_NATIVE_FPS: f64 = 30.0;

/// Added to the per-axis standard deviation before dividing.
pub const NORMALIZATION_EPSILON: f64 = 1e-6;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];
