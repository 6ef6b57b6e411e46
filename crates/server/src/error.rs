//! Route errors and their JSON failure body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use deepcheck_core::shared::error::PredictionError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Conflict(String),
    #[error("Upload too large")]
    PayloadTooLarge,
    #[error("{0}")]
    Unprocessable(String),
    /// Detail goes to the log; clients see a generic message.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{context}: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            log::error!("{detail}");
        }
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        match e {
            PredictionError::UnreadableMedia { .. } | PredictionError::NoFaceDetected => {
                Self::Unprocessable(user_message(&e).to_string())
            }
            other => Self::Internal(format!("prediction failed ({}): {other}", other.kind())),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::internal("database error", e)
    }
}

/// Client-facing text for the failures the uploader can act on. Paths of
/// temporary files stay out of responses.
fn user_message(e: &PredictionError) -> &'static str {
    match e {
        PredictionError::NoFaceDetected => "No face detected in the uploaded media",
        _ => "The uploaded file could not be read as an image or video",
    }
}
