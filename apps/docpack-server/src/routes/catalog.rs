//! Template catalog listing

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub items: Vec<CatalogItem>,
}

/// Create the catalog router
pub fn router() -> Router<AppState> {
    Router::new().route("/catalog", get(list_catalog))
}

/// List templates, optionally limited to a path prefix
async fn list_catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Json<CatalogResponse> {
    let items = state
        .catalog()
        .with_prefix(query.prefix.as_deref())
        .into_iter()
        .map(|template| CatalogItem {
            id: template.id.clone(),
            title: template.title(),
            path: template.path.clone(),
        })
        .collect();

    Json(CatalogResponse { items })
}
