//! Document generation: record + selected templates -> ZIP archive

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Router,
};

use super::form::{extract_record, SourceForm};
use crate::error::{AppError, Result};
use crate::render::{build_archive, Archive};
use crate::state::AppState;

pub const ARCHIVE_NAME: &str = "generated_docs.zip";

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

async fn generate(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = SourceForm::from_multipart(multipart).await?;
    let extraction = extract_record(&state, &form).await?;

    let worker = state.clone();
    let include = form.include.clone();
    let record = extraction.record;
    let archive = tokio::task::spawn_blocking(move || -> Result<Archive> {
        let templates = worker.catalog().select(include.as_deref())?;
        Ok(build_archive(
            worker.engine(),
            worker.converter().as_ref(),
            &templates,
            &record,
        )?)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Generation task failed: {}", e)))??;

    tracing::info!(
        entries = archive.entries.len(),
        failures = archive.failures(),
        size = archive.bytes.len(),
        "Archive generated"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, archive.bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", ARCHIVE_NAME),
        )
        .body(Body::from(archive.bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use zip::ZipArchive;

    use crate::record::tests::build_xlsx;
    use crate::routes::test_support::fixture;

    const CSV: &str = "ФИО;Группа\n;\nИванов Иван Иванович;Изу-101\n";

    fn csv_form(include: Option<&str>) -> MultipartForm {
        let form = MultipartForm::new()
            .add_part(
                "table_file",
                Part::bytes(CSV.as_bytes().to_vec()).file_name("student.csv"),
            )
            .add_text("header_row", "1");
        match include {
            Some(include) => form.add_text("include", include),
            None => form,
        }
    }

    fn entries(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_generate_zip_with_error_stub() {
        let fixture = fixture();
        let response = fixture.server.post("/generate").multipart(csv_form(None)).await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/zip");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"generated_docs.zip\""
        );

        let bytes = response.as_bytes().to_vec();
        assert_eq!(
            entries(&bytes),
            vec![
                "001_Иванов Иван Иванович/Дневник_Иванов Иван Иванович_Изу-101.docx",
                "001_Иванов Иван Иванович/Отчёт_Иванов Иван Иванович.pdf",
                "001_Иванов Иван Иванович/Сломан_{ФИО}.docx.ERROR.txt",
            ]
        );

        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut stub = String::new();
        archive
            .by_name("001_Иванов Иван Иванович/Сломан_{ФИО}.docx.ERROR.txt")
            .unwrap()
            .read_to_string(&mut stub)
            .unwrap();
        assert!(stub.starts_with("Error (input/second/Сломан.docx): TemplateError: "));
    }

    #[tokio::test]
    async fn test_generate_respects_include() {
        let fixture = fixture();
        let response = fixture
            .server
            .post("/generate")
            .multipart(csv_form(Some(" INPUT_FIRST_ДНЕВНИК ,")))
            .await;

        response.assert_status_ok();
        assert_eq!(
            entries(response.as_bytes()),
            vec!["001_Иванов Иван Иванович/Дневник_Иванов Иван Иванович_Изу-101.docx"]
        );
    }

    #[tokio::test]
    async fn test_generate_include_without_match() {
        let fixture = fixture();
        let response = fixture
            .server
            .post("/generate")
            .multipart(csv_form(Some("zzz, aaa")))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["include"], serde_json::json!(["aaa", "zzz"]));
        assert_eq!(
            body["available"],
            serde_json::json!(["input_first_дневник", "input_first_отчёт", "input_second_сломан"])
        );
    }

    #[tokio::test]
    async fn test_generate_is_deterministic() {
        let fixture = fixture();
        let first = fixture.server.post("/generate").multipart(csv_form(None)).await;
        let second = fixture.server.post("/generate").multipart(csv_form(None)).await;
        assert_eq!(entries(first.as_bytes()), entries(second.as_bytes()));
    }

    #[tokio::test]
    async fn test_generate_from_xlsx_without_name_uses_record_folder() {
        let fixture = fixture();
        let xlsx = build_xlsx(&[Some(vec!["Группа"]), Some(vec!["Изу-101"])]);
        let form = MultipartForm::new()
            .add_part("table_file", Part::bytes(xlsx).file_name("g.xlsx"))
            .add_text("include", "input_first_дневник");

        let response = fixture.server.post("/generate").multipart(form).await;
        response.assert_status_ok();
        assert_eq!(
            entries(response.as_bytes()),
            vec!["001_record/Дневник__Изу-101.docx"]
        );
    }

    #[tokio::test]
    async fn test_generate_without_source() {
        let fixture = fixture();
        let form = MultipartForm::new()
            .add_text("gsheet_url", "  ")
            .add_part("table_file", Part::bytes(Vec::new()).file_name(""));
        let response = fixture.server.post("/generate").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}
