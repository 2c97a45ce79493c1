//! Liveness probe.

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;

/// GET /heartbeat
///
/// Checks the blob root, then appends a heartbeat row. Both must succeed.
pub async fn heartbeat(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.storage.health_check().await?;
    let id = state.metadata.record_heartbeat().await?;

    metrics::HEARTBEATS.inc();
    tracing::debug!(heartbeat_id = id, "Heartbeat recorded");
    Ok(StatusCode::OK)
}
