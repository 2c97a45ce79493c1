//! Listing query.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use dss_core::{ListParams, ListQuery};
use serde::Serialize;
use uuid::Uuid;

/// Response body for GET /list.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub keys: Vec<Uuid>,
}

/// GET /list?limit=&sort_by=&order=&tag=...
///
/// Parameters are validated into a typed query before anything reaches the
/// catalog.
pub async fn list_files(
    State(state): State<AppState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    let Query(pairs) = pairs.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let params = ListParams::from_pairs(pairs);
    let query = ListQuery::from_params(&params, state.config.server.max_list_limit)?;

    let keys = state.metadata.list_file_keys(&query).await?;

    metrics::LIST_QUERIES.inc();
    tracing::debug!(
        limit = query.limit,
        sort_by = %query.sort_by,
        order = %query.order,
        tags = query.tags.len(),
        returned = keys.len(),
        "Listed files"
    );
    Ok(Json(ListResponse { keys }))
}
