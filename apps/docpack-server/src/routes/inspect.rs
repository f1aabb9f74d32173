//! Record preview: shows what would be filled into the templates

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::form::{extract_record, SourceForm};
use crate::catalog::REQUIRED_FIELDS;
use crate::error::Result;
use crate::record::{ExtractMeta, Extraction, LayoutMode, Record};
use crate::state::AppState;

/// Pairs shown for a key/value sheet
const PREVIEW_PAIRS: usize = 12;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum InspectResponse {
    Wide {
        columns: Vec<String>,
        preview: Record,
        missing: Vec<String>,
        meta: ExtractMeta,
    },
    Kv {
        columns: Vec<String>,
        preview_pairs: Vec<(String, String)>,
        missing: Vec<String>,
        meta: ExtractMeta,
    },
}

impl From<Extraction> for InspectResponse {
    fn from(extraction: Extraction) -> Self {
        let missing = REQUIRED_FIELDS
            .iter()
            .filter(|field| !extraction.record.contains_key(field))
            .map(|field| field.to_string())
            .collect();

        match extraction.meta.mode {
            LayoutMode::Wide => InspectResponse::Wide {
                columns: extraction.columns.unwrap_or_default(),
                preview: extraction.record,
                missing,
                meta: extraction.meta,
            },
            LayoutMode::Kv => InspectResponse::Kv {
                columns: Vec::new(),
                preview_pairs: extraction
                    .record
                    .iter()
                    .take(PREVIEW_PAIRS)
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                missing,
                meta: extraction.meta,
            },
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/inspect", post(inspect))
}

async fn inspect(State(state): State<AppState>, multipart: Multipart) -> Result<Json<InspectResponse>> {
    let form = SourceForm::from_multipart(multipart).await?;
    let extraction = extract_record(&state, &form).await?;
    Ok(Json(extraction.into()))
}
