//! Multipart form shared by `/inspect` and `/generate`

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::{AppError, Result};
use crate::record::{extract_from_export, extract_from_upload, Extraction, LayoutMode};
use crate::state::AppState;

/// Uploaded spreadsheet
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// Fields accepted by the record endpoints
pub struct SourceForm {
    pub table_file: Option<Upload>,
    pub gsheet_url: Option<String>,
    /// 1-based header row
    pub header_row: usize,
    pub include: Option<String>,
}

impl Default for SourceForm {
    fn default() -> Self {
        Self {
            table_file: None,
            gsheet_url: None,
            header_row: 1,
            include: None,
        }
    }
}

impl SourceForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = SourceForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!("Failed to read multipart field: {}", e);
            AppError::BadRequest(format!("Failed to read form: {}", e))
        })? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "table_file" => {
                    let filename = field.file_name().unwrap_or("").trim().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?;
                    // Browsers send an empty part when no file is chosen
                    if !filename.is_empty() {
                        tracing::debug!("Received table file '{}' ({} bytes)", filename, data.len());
                        form.table_file = Some(Upload { filename, data });
                    }
                }
                "gsheet_url" | "header_row" | "include" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
                    form.set_text(&name, value)?;
                }
                other => tracing::debug!("Ignoring form field '{}'", other),
            }
        }

        Ok(form)
    }

    fn set_text(&mut self, name: &str, value: String) -> Result<()> {
        match name {
            "gsheet_url" => self.gsheet_url = Some(value.trim().to_string()).filter(|v| !v.is_empty()),
            "header_row" => self.header_row = parse_header_row(&value)?,
            "include" => self.include = Some(value),
            _ => {}
        }
        Ok(())
    }
}

fn parse_header_row(value: &str) -> Result<usize> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(1);
    }
    let row: i64 = value
        .parse()
        .map_err(|_| AppError::BadRequest(format!("header_row must be an integer, got {:?}", value)))?;
    Ok(usize::try_from(row.max(1)).unwrap_or(1))
}

/// Extract the record from the sheet URL if given, otherwise from the file
pub async fn extract_record(state: &AppState, form: &SourceForm) -> Result<Extraction> {
    let header_row = form.header_row;

    let mut extraction = if let Some(url) = form.gsheet_url.as_deref() {
        let (sheet, csv) = state.sheets().fetch_csv(url).await?;
        tokio::task::spawn_blocking(move || extract_from_export(&sheet, &csv, header_row))
            .await
            .map_err(|e| AppError::Internal(format!("Extraction task failed: {}", e)))??
    } else if let Some(upload) = form.table_file.as_ref() {
        let filename = upload.filename.clone();
        let data = upload.data.clone();
        tokio::task::spawn_blocking(move || extract_from_upload(&data, &filename, header_row))
            .await
            .map_err(|e| AppError::Internal(format!("Extraction task failed: {}", e)))??
    } else {
        return Err(AppError::BadRequest(
            "Provide a Google Sheet URL or upload a table file".to_string(),
        ));
    };

    extraction.meta.score = match (&extraction.meta.mode, &extraction.columns) {
        (LayoutMode::Wide, Some(columns)) => state.catalog().score_columns(columns),
        _ => {
            let keys: Vec<&str> = extraction.record.iter().map(|(k, _)| k).collect();
            state.catalog().score_columns(&keys)
        }
    };

    tracing::info!(
        source = ?extraction.meta.source,
        mode = ?extraction.meta.mode,
        fields = extraction.record.len(),
        score = extraction.meta.score,
        "Record extracted"
    );
    Ok(extraction)
}
