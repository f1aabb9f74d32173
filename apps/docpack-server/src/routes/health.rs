//! Health check endpoint

use axum::{routing::get, Router};

use crate::state::AppState;

pub async fn health_check() -> &'static str {
    "ok"
}

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(health_check))
}
