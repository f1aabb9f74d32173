//! Docpack Server Library
//!
//! Fills DOCX templates from a single spreadsheet record and hands the
//! results back as one ZIP archive.
//!
//! # Modules
//!
//! - `record`: record extraction from `.xlsx`, `.csv` and Google Sheets
//! - `catalog`: the static template catalog
//! - `render`: template rendering, PDF conversion and archive building
//! - `routes`: HTTP endpoints

pub mod catalog;
pub mod config;
pub mod error;
pub mod instruction;
pub mod record;
pub mod render;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let body_limit = state.config().server.max_upload_bytes;

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::index::router())
        .merge(routes::catalog::router())
        .merge(routes::downloads::router())
        .merge(routes::inspect::router())
        .merge(routes::generate::router())
        .merge(routes::health::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
