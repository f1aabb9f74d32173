//! Public Google Sheets input
//!
//! The sheet is downloaded through its CSV export endpoint and then handled
//! exactly like an uploaded `.csv` file.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::config::DEFAULT_EXPORT_BASE;

use super::{extract_from_upload, ExtractError, Extraction, Result, SourceKind};

/// Spreadsheet and sheet (tab) identifiers parsed from a sharing URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub spreadsheet_id: String,
    pub gid: u64,
}

impl SheetRef {
    pub fn parse(url: &str) -> Result<Self> {
        static ID_RE: OnceLock<Regex> = OnceLock::new();
        static GID_RE: OnceLock<Regex> = OnceLock::new();
        let id_re = ID_RE.get_or_init(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9\-_]+)").unwrap());
        let gid_re = GID_RE.get_or_init(|| Regex::new(r"[#&?]gid=([0-9]+)").unwrap());

        let spreadsheet_id = id_re
            .captures(url)
            .map(|c| c[1].to_string())
            .ok_or(ExtractError::InvalidSheetUrl)?;
        let gid = gid_re
            .captures(url)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0);

        Ok(Self { spreadsheet_id, gid })
    }
}

/// CSV export URL for a sheet under `base`
pub fn export_url(base: &str, sheet: &SheetRef) -> String {
    format!(
        "{}/{}/export?format=csv&gid={}",
        base, sheet.spreadsheet_id, sheet.gid
    )
}

/// HTTP client for sheet exports
#[derive(Clone)]
pub struct SheetClient {
    client: reqwest::Client,
    export_base: String,
}

impl SheetClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_export_base(timeout, DEFAULT_EXPORT_BASE)
    }

    pub fn with_export_base(timeout: Duration, export_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}, using defaults", e);
                reqwest::Client::new()
            });
        Self {
            client,
            export_base: export_base.into(),
        }
    }

    /// Download the CSV export of the sheet behind `url`
    pub async fn fetch_csv(&self, url: &str) -> Result<(SheetRef, Vec<u8>)> {
        let sheet = SheetRef::parse(url)?;
        let export = export_url(&self.export_base, &sheet);
        tracing::info!(spreadsheet_id = %sheet.spreadsheet_id, gid = sheet.gid, "Fetching Google Sheet export");

        let response = self
            .client
            .get(&export)
            .send()
            .await
            .map_err(|e| ExtractError::SheetFetch(e.to_string()))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(ExtractError::SheetStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExtractError::SheetFetch(e.to_string()))?;
        Ok((sheet, body.to_vec()))
    }
}

/// Run a downloaded export through the regular CSV extraction path
pub fn extract_from_export(sheet: &SheetRef, csv: &[u8], header_row: usize) -> Result<Extraction> {
    let mut extraction = extract_from_upload(csv, "gs.csv", header_row)?;
    extraction.meta.source = SourceKind::Gsheet;
    extraction.meta.gid = Some(sheet.gid);
    Ok(extraction)
}
