//! File retrieval by key.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use dss_core::storage_name::display_name;
use dss_metadata::FileRow;
use dss_storage::StorageError;
use futures::StreamExt;
use uuid::Uuid;

/// GET /
///
/// A retrieval without a key.
pub async fn missing_key() -> ApiError {
    ApiError::BadRequest("missing file key".to_string())
}

/// GET /{key}
///
/// Streams the blob behind a key. A key that does not parse as a UUID was
/// never issued, so it is reported the same as an unknown one.
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    if key.is_empty() {
        return Err(missing_key().await);
    }
    let file_key = Uuid::parse_str(&key)
        .map_err(|_| ApiError::NotFound(format!("file {key} not found")))?;

    let row = state
        .metadata
        .get_file(file_key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file {file_key} not found")))?;

    let meta = state
        .storage
        .head(&row.storage_path)
        .await
        .map_err(|e| blob_error(&row, e))?;
    let stream = state
        .storage
        .get_stream(&row.storage_path)
        .await
        .map_err(|e| blob_error(&row, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.size));
    let disposition = content_disposition(&row);
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|e| ApiError::Internal(format!("invalid content disposition: {e}")))?,
    );
    if let Some(hash) = &row.hash
        && let Ok(etag) = HeaderValue::from_str(&format!("\"{hash}\""))
    {
        headers.insert(ETAG, etag);
    }

    metrics::DOWNLOADS.inc();
    tracing::debug!(
        key = %row.key,
        storage_path = %row.storage_path,
        size = meta.size,
        "Serving file"
    );

    let body = Body::from_stream(
        stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
    );
    Ok((StatusCode::OK, headers, body).into_response())
}

/// A row whose blob cannot be read is a server-side failure, never a 404.
fn blob_error(row: &FileRow, err: StorageError) -> ApiError {
    if matches!(err, StorageError::NotFound(_)) {
        metrics::ORPHANS_DETECTED.inc();
        tracing::error!(
            key = %row.key,
            storage_path = %row.storage_path,
            "Orphaned catalog row: blob is missing"
        );
        return ApiError::Internal(format!("blob missing for file {}", row.key));
    }
    ApiError::Internal(format!("failed to open blob for file {}: {err}", row.key))
}

/// Build an `attachment` disposition from the stored display name, falling
/// back to the storage name.
fn content_disposition(row: &FileRow) -> String {
    let name = row
        .original_name
        .as_deref()
        .and_then(display_name)
        .unwrap_or_else(|| row.storage_path.clone());

    if name.is_ascii() {
        return format!("attachment; filename=\"{name}\"");
    }

    // RFC 6266: ASCII fallback plus the UTF-8 name percent-encoded.
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        percent_encode(&name)
    )
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
