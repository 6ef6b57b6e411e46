//! Signup, login and session endpoints

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header::CONTENT_TYPE, header::SET_COOKIE, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::users;
use crate::error::ApiError;
use crate::services::password::{hash_password, verify_password};
use crate::services::session::{self, CLEAR_SESSION_COOKIE, SESSION_COOKIE_NAME};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout).post(logout))
        .route("/me", get(me))
}

/// Validates the session cookie and returns the user id.
pub fn authenticate(headers: &HeaderMap, secret: &[u8]) -> Result<i64, ApiError> {
    let jar = CookieJar::from_headers(headers);
    let token = jar
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value())
        .ok_or(ApiError::Unauthorized)?;

    session::validate_token(token, secret).map_err(|e| {
        log::debug!("Session rejected: {e}");
        ApiError::Unauthorized
    })
}

/// Extractor for routes that always need a signed-in user.
pub struct AuthUser(pub i64);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.jwt_secret).map(AuthUser)
    }
}

#[derive(Deserialize)]
struct CredentialsBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// Email and password from a JSON or urlencoded form body. The email is
/// trimmed and lowercased.
pub struct Credentials {
    email: String,
    password: String,
}

impl<S: Send + Sync> FromRequest<S> for Credentials {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let body = if is_json {
            Json::<CredentialsBody>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
                .0
        } else {
            Form::<CredentialsBody>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
                .0
        };

        let email = body.email.trim().to_lowercase();
        if email.is_empty() || body.password.is_empty() {
            return Err(ApiError::BadRequest("Email and password required".into()));
        }
        Ok(Self {
            email,
            password: body.password,
        })
    }
}

/// POST /signup
async fn signup(
    State(state): State<Arc<AppState>>,
    credentials: Credentials,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let duplicate = || ApiError::Conflict("User already exists".into());

    if users::find_by_email(&state.db, &credentials.email)
        .await?
        .is_some()
    {
        return Err(duplicate());
    }

    let password = credentials.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal("password hashing task", e))?;

    let id = users::create_user(&state.db, &credentials.email, &hash)
        .await?
        .ok_or_else(duplicate)?;
    log::info!("Created user {id}");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": id, "email": credentials.email })),
    ))
}

/// POST /login - sets the session cookie
async fn login(
    State(state): State<Arc<AppState>>,
    credentials: Credentials,
) -> Result<Response, ApiError> {
    let user = users::find_by_email(&state.db, &credentials.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let password = credentials.password;
    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::internal("password check task", e))?;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let token = session::create_token(user.id, &state.jwt_secret)
        .map_err(|e| ApiError::internal("session token", e))?;
    let cookie = HeaderValue::from_str(&session::session_cookie(&token, state.secure_cookies))
        .map_err(|e| ApiError::internal("session cookie", e))?;

    let mut response = Json(json!({ "success": true, "email": user.email })).into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

/// GET|POST /logout
async fn logout() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, HeaderValue::from_static(CLEAR_SESSION_COOKIE));
    response
}

/// GET /me
async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    // A valid token for a user that no longer exists is still unauthorized.
    let user = users::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({
        "success": true,
        "id": user.id,
        "email": user.email,
        "created_at": user.created_at,
    })))
}
