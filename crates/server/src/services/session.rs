//! Session tokens: HS256 JWTs carried in the `session` cookie.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SESSION_COOKIE_NAME: &str = "session";
pub const SESSION_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

pub fn create_token(user_id: i64, secret: &[u8]) -> Result<String, SessionError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::hours(SESSION_EXPIRY_HOURS)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(SessionError::Signing)
}

/// Returns the user id the token was issued for.
pub fn validate_token(token: &str, secret: &[u8]) -> Result<i64, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation).map_err(
        |e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::InvalidToken,
        },
    )?;

    data.claims
        .sub
        .parse::<i64>()
        .map_err(|_| SessionError::InvalidToken)
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    format!(
        "{SESSION_COOKIE_NAME}={token}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        if secure { " Secure;" } else { "" },
        SESSION_EXPIRY_HOURS * 60 * 60
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub const CLEAR_SESSION_COOKIE: &str = "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0";
