//! Static downloads: per-kit spreadsheet templates and the instruction

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::instruction::{build_instruction_docx, find_instruction_file, DOWNLOAD_NAME};
use crate::state::AppState;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Kit id -> spreadsheet file inside the kits directory
const KITS: [(&str, &str); 4] = [
    ("kit1", "First шаблон.xlsx"),
    ("kit2", "Менеджмент УП экономика шаблон.xlsx"),
    ("kit3", "Реклама, лингвистика, журналистика, ГМУ шаблон.xlsx"),
    ("kit4", "docx11 шаблон.xlsx"),
];

#[derive(Debug, Deserialize)]
pub struct KitQuery {
    pub kit: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/template", get(download_kit))
        .route("/instruction", get(download_instruction))
}

fn kit_file(kit: &str) -> Option<&'static str> {
    KITS.iter().find(|(id, _)| *id == kit).map(|(_, file)| *file)
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name
fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|ch| if (ch.is_ascii_graphic() && ch != '"') || ch == ' ' { ch } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Serve the spreadsheet template for a kit
async fn download_kit(
    State(state): State<AppState>,
    Query(query): Query<KitQuery>,
) -> Result<Response> {
    let kit = query.kit.as_deref().unwrap_or("").trim();
    let file = kit_file(kit).ok_or_else(|| AppError::BadRequest(format!("Unknown kit: {:?}", kit)))?;

    let path = state.config().assets.kits_dir.join(file);
    if !path.is_file() {
        return Err(AppError::MissingAsset(format!(
            "Template for kit {} not found at {}",
            kit,
            path.display()
        )));
    }

    let bytes = tokio::fs::read(&path).await?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    tracing::debug!(kit, file, size = bytes.len(), "Serving kit template");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(header::CONTENT_DISPOSITION, attachment(file))
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Serve the instruction file, generating one when none is deployed
async fn download_instruction(State(state): State<AppState>) -> Result<Response> {
    let bytes = match find_instruction_file(&state.config().assets.base_dir) {
        Some(path) => {
            tracing::debug!("Serving instruction from {}", path.display());
            tokio::fs::read(&path).await?
        }
        None => {
            tracing::debug!("No instruction file deployed, generating one");
            build_instruction_docx(state.catalog())?
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, DOCX_MIME)
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(header::CONTENT_DISPOSITION, attachment(DOWNLOAD_NAME))
        .header(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axum::http::StatusCode;
    use zip::ZipArchive;

    use super::*;
    use crate::routes::test_support::{fixture, KIT1_BYTES};

    #[tokio::test]
    async fn test_kit_is_served_byte_for_byte() {
        let fixture = fixture();
        let response = fixture.server.get("/template").add_query_param("kit", "kit1").await;

        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), KIT1_BYTES);
        assert_eq!(
            response.header("content-type"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        let disposition = response.header("content-disposition");
        let disposition = disposition.to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"First ______.xlsx\""));
        assert!(disposition.ends_with("filename*=UTF-8''First%20%D1%88%D0%B0%D0%B1%D0%BB%D0%BE%D0%BD.xlsx"));
    }

    #[tokio::test]
    async fn test_unknown_kit_is_bad_request() {
        let fixture = fixture();
        let response = fixture.server.get("/template").add_query_param("kit", "kit9").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let response = fixture.server.get("/template").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_kit_file_is_server_error() {
        let fixture = fixture();
        let response = fixture.server.get("/template").add_query_param("kit", "kit2").await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "missing_asset");
    }

    #[tokio::test]
    async fn test_generated_instruction() {
        let fixture = fixture();
        let response = fixture.server.get("/instruction").await;

        response.assert_status_ok();
        assert_eq!(response.header("cache-control"), "no-store, no-cache, must-revalidate");
        assert_eq!(response.header("content-type"), DOCX_MIME);

        let bytes = response.as_bytes().to_vec();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.file_names().any(|name| name == "word/document.xml"));
    }

    #[tokio::test]
    async fn test_deployed_instruction_wins() {
        let fixture = fixture();
        std::fs::write(fixture.dir.path().join("инструкция.docx"), b"custom").unwrap();

        let response = fixture.server.get("/instruction").await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), b"custom");
        assert!(response
            .header("content-disposition")
            .to_str()
            .unwrap()
            .contains("filename=\"instruction.docx\""));
    }

    #[test]
    fn test_attachment_header() {
        assert_eq!(
            attachment("a\"b.docx"),
            "attachment; filename=\"a_b.docx\"; filename*=UTF-8''a%22b.docx"
        );
    }
}
