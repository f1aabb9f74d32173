//! Error types for the docpack server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::{CatalogError, SelectionError};
use crate::instruction::InstructionError;
use crate::record::ExtractError;
use crate::render::RenderError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A static file the deployment is expected to ship is missing
    #[error("Missing asset: {0}")]
    MissingAsset(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("{0}")]
    NoMatchingTemplates(#[from] SelectionError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Instruction error: {0}")]
    Instruction(#[from] InstructionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut include = None;
        let mut available = None;

        let (status, error_type, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Extract(e) => {
                tracing::info!("Rejected input: {}", e);
                (StatusCode::BAD_REQUEST, "invalid_input", e.to_string())
            }
            AppError::NoMatchingTemplates(e) => {
                include = Some(e.requested.clone());
                available = Some(e.available.clone());
                (
                    StatusCode::BAD_REQUEST,
                    "no_matching_templates",
                    "No template matches the include list".to_string(),
                )
            }
            AppError::MissingAsset(msg) => {
                tracing::error!("Missing asset: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "missing_asset",
                    msg.clone(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Catalog(e) => {
                tracing::error!("Catalog error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "catalog_error",
                    "Template catalog error".to_string(),
                )
            }
            AppError::Render(e) => {
                tracing::error!("Render error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "render_error",
                    "Failed to build the archive".to_string(),
                )
            }
            AppError::Instruction(e) => {
                tracing::error!("Instruction error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "instruction_error",
                    "Failed to build the instruction".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
            include,
            available,
        });

        (status, body).into_response()
    }
}
