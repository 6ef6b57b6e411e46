pub mod auth;
pub mod upload;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .merge(auth::routes())
        .merge(upload::routes())
        .with_state(state)
}

async fn ping() -> &'static str {
    "pong"
}
