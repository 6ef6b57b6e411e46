//! Media upload and prediction (/upload)

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        DefaultBodyLimit, Multipart, State,
    },
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use deepcheck_core::model::prediction::{Label, PredictionResult};
use deepcheck_core::pipeline::pipeline_logger::NullPipelineLogger;
use deepcheck_core::pipeline::predict_media_use_case::PredictMediaUseCase;
use deepcheck_core::shared::media_input::{is_supported_extension, MediaInput};

use super::auth::authenticate;
use crate::error::ApiError;
use crate::AppState;

pub const MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;
const FILE_FIELD: &str = "file";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    label: Label,
    /// Percent, two decimals.
    confidence: f64,
}

/// POST /upload - multipart field `file`
async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    if state.require_auth {
        authenticate(&headers, &state.jwt_secret)?;
    }

    let upload = read_file_field(&mut multipart, &state.upload_dir).await?;

    let predictor = Arc::clone(&state.predictor);
    let result = tokio::task::spawn_blocking(move || predict_upload(&predictor, upload))
        .await
        .map_err(|e| ApiError::internal("prediction task", e))??;

    log::info!("Upload classified as {result}");
    Ok(Json(UploadResponse {
        success: true,
        label: result.label,
        confidence: result.confidence_percent(),
    }))
}

/// Finds the `file` field and streams its content into a new file in
/// `upload_dir`. The extension is checked before the body is read.
async fn read_file_field(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> Result<NamedTempFile, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest("No selected file".into()));
        }
        let extension = supported_extension(&file_name)
            .ok_or_else(|| ApiError::BadRequest("Invalid file type".into()))?;

        let upload = create_upload_file(upload_dir, &extension)?;
        let written = stream_to_file(&mut field, &upload).await?;
        log::debug!("Received {written} byte .{extension} upload");
        return Ok(upload);
    }
    Err(ApiError::BadRequest("No file part".into()))
}

/// Uniquely named file that is removed when dropped.
fn create_upload_file(upload_dir: &Path, extension: &str) -> Result<NamedTempFile, ApiError> {
    tempfile::Builder::new()
        .prefix(&format!("{}_", Uuid::new_v4().simple()))
        .suffix(&format!(".{extension}"))
        .tempfile_in(upload_dir)
        .map_err(|e| ApiError::internal("creating upload file", e))
}

/// Copies the field to `upload` chunk by chunk. Returns the bytes written.
async fn stream_to_file(field: &mut Field<'_>, upload: &NamedTempFile) -> Result<u64, ApiError> {
    let write_error = |e: std::io::Error| ApiError::internal("writing upload file", e);
    let handle = upload.as_file().try_clone().map_err(write_error)?;
    let mut file = tokio::fs::File::from_std(handle);

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await.map_err(write_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_error)?;
    Ok(written)
}

fn supported_extension(file_name: &str) -> Option<String> {
    let path = Path::new(file_name);
    if !is_supported_extension(path) {
        return None;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// Runs the pipeline on a stored upload and removes the file again,
/// whatever the outcome.
fn predict_upload(
    predictor: &PredictMediaUseCase,
    upload: NamedTempFile,
) -> Result<PredictionResult, ApiError> {
    let input = MediaInput::from_path(upload.path());
    let result = predictor.execute(&input, &mut NullPipelineLogger);
    drop(upload);
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use axum::extract::FromRequest;
    use crate::test_support::{
        body_json, login_cookie, multipart_request, send, stub_predictor, test_state,
        CORRUPT_MEDIA, FACELESS_MEDIA,
    };
    use rstest::rstest;

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_upload_video_with_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(true, dir.path()).await);
        let cookie = login_cookie(&app, "a@example.org", "pw").await;

        let response = send(
            &app,
            multipart_request("file", "clip.MP4", b"video bytes", Some(&cookie)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["label"], "REAL");
        assert_eq!(body["confidence"], 75.0);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_upload_image_without_auth_requirement() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(false, dir.path()).await);

        let response = send(&app, multipart_request("file", "face.png", b"png", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["label"], "REAL");
    }

    #[tokio::test]
    async fn test_upload_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(true, dir.path()).await);

        let response = send(&app, multipart_request("file", "clip.mp4", b"x", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[rstest]
    #[case("file", "notes.txt", "Invalid file type")]
    #[case("file", "clip", "Invalid file type")]
    #[case("file", "", "No selected file")]
    #[case("attachment", "clip.mp4", "No file part")]
    #[tokio::test]
    async fn test_upload_bad_request(
        #[case] field: &str,
        #[case] file_name: &str,
        #[case] message: &str,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(false, dir.path()).await);

        let response = send(&app, multipart_request(field, file_name, b"x", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], message);
    }

    #[rstest]
    #[case(CORRUPT_MEDIA)]
    #[case(FACELESS_MEDIA)]
    #[tokio::test]
    async fn test_unusable_media_is_unprocessable(#[case] content: &[u8]) {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(false, dir.path()).await);

        let response = send(&app, multipart_request("file", "clip.mov", content, None)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["success"], false);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_predict_upload_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = create_upload_file(dir.path(), "mp4").unwrap();
        std::fs::write(upload.path(), b"video").unwrap();

        let result = predict_upload(&stub_predictor(), upload).unwrap();
        assert_eq!(result.label, Label::Real);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_failed_prediction_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = create_upload_file(dir.path(), "mp4").unwrap();
        std::fs::write(upload.path(), CORRUPT_MEDIA).unwrap();

        let err = predict_upload(&stub_predictor(), upload).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_upload_file_name_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let upload = create_upload_file(dir.path(), "webm").unwrap();
        assert_eq!(upload.path().parent(), Some(dir.path()));
        assert_eq!(upload.path().extension().unwrap(), "webm");
    }

    #[test]
    fn test_missing_upload_dir_is_internal() {
        let err = create_upload_file(Path::new("/nonexistent/uploads"), "mp4").unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_file_field_is_written_to_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let content: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let request = multipart_request("file", "clip.mp4", &content, None);
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();

        let upload = read_file_field(&mut multipart, dir.path()).await.unwrap();
        assert_eq!(std::fs::read(upload.path()).unwrap(), content);
        drop(upload);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_rejected_field_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request("file", "notes.txt", b"text", None);
        let mut multipart = Multipart::from_request(request, &()).await.unwrap();

        let err = read_file_field(&mut multipart, dir.path()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(dir_is_empty(dir.path()));
    }

    #[rstest]
    #[case("clip.MKV", Some("mkv"))]
    #[case("face.jpeg", Some("jpeg"))]
    #[case("archive.tar.gz", None)]
    #[case("noext", None)]
    fn test_supported_extension(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(supported_extension(name).as_deref(), expected);
    }
}
