//! Multipart upload.
//!
//! The `file` field is streamed once through a [`TeeUpload`] into a staging
//! file. The catalog row is inserted before the staged blob is committed, so
//! a storage-name collision is settled by the catalog's unique constraint and
//! never overwrites an existing blob.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, StatusCode};
use dss_core::storage_name::display_name;
use dss_core::tag::normalize_tags;
use dss_metadata::NewFile;
use dss_storage::{StagedBlob, TeeUpload};
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// Multipart framing allowed on top of the file size ceiling when checking
/// `Content-Length` up front.
pub const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Largest raw `tag` field read before trimming.
const MAX_RAW_TAG_BYTES: usize = 4 * 1024;

const FILE_FIELD: &str = "file";
const TAG_FIELD: &str = "tag";

/// Response body for POST /upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: Uuid,
}

/// A staged file waiting for its catalog row.
struct PendingFile {
    blob: StagedBlob,
    storage_path: String,
    original_name: Option<String>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<PendingFile>,
    tags: Vec<String>,
}

impl UploadForm {
    async fn discard(self) {
        if let Some(file) = self.file {
            discard_blob(file.blob, &file.storage_path).await;
        }
    }
}

/// POST /upload
///
/// Form fields: one `file` (with a filename) and any number of `tag`.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let started = Instant::now();
    let result = store_upload(&state, &headers, multipart).await;
    match &result {
        Ok(_) => metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64()),
        Err(e) => metrics::record_upload_error(e.code()),
    }
    result
}

async fn store_upload(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let limit = state.config.server.max_upload_size;
    check_content_length(headers, limit)?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut form = UploadForm::default();
    if let Err(e) = read_fields(state, &mut multipart, limit, &mut form).await {
        form.discard().await;
        return Err(e);
    }

    let Some(file) = form.file else {
        return Err(ApiError::BadRequest("missing file field".to_string()));
    };
    let size = file.blob.size();
    let hash = file.blob.hash().to_hex();
    let PendingFile {
        blob,
        storage_path,
        original_name,
    } = file;

    let key = match catalog(state, &storage_path, original_name, form.tags, &hash, size).await {
        Ok(key) => key,
        Err(e) => {
            discard_blob(blob, &storage_path).await;
            return Err(e);
        }
    };

    if let Err(e) = blob.commit().await {
        metrics::ORPHANS_DETECTED.inc();
        tracing::error!(
            key = %key,
            storage_path = %storage_path,
            error = %e,
            "Blob commit failed after cataloging; row is orphaned"
        );
        return Err(ApiError::Internal(format!(
            "failed to commit blob for file {key}"
        )));
    }

    metrics::UPLOADS.inc();
    metrics::BYTES_UPLOADED.inc_by(size);
    tracing::info!(
        key = %key,
        storage_path = %storage_path,
        size,
        hash = %hash,
        "File stored"
    );

    Ok((StatusCode::CREATED, Json(UploadResponse { key })))
}

fn check_content_length(headers: &HeaderMap, limit: u64) -> ApiResult<()> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match declared {
        Some(len) if len > limit.saturating_add(MULTIPART_OVERHEAD) => Err(
            ApiError::PayloadTooLarge(format!("declared body of {len} bytes exceeds {limit}")),
        ),
        _ => Ok(()),
    }
}

async fn read_fields(
    state: &AppState,
    multipart: &mut Multipart,
    limit: u64,
    form: &mut UploadForm,
) -> ApiResult<()> {
    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(TAG_FIELD) => {
                let tag = read_tag(&mut field).await?;
                form.tags = normalize_tags(
                    form.tags
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(tag.as_str())),
                )?;
            }
            Some(FILE_FIELD) => {
                if form.file.is_some() {
                    return Err(ApiError::BadRequest(
                        "more than one file field".to_string(),
                    ));
                }
                let original = field
                    .file_name()
                    .filter(|name| !name.trim().is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("file field has no filename".into()))?;
                form.file = Some(stage_file(state, &mut field, &original, limit).await?);
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown upload field");
            }
        }
    }
    Ok(())
}

async fn read_tag(field: &mut Field<'_>) -> ApiResult<String> {
    let mut raw = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
        if raw.len() + chunk.len() > MAX_RAW_TAG_BYTES {
            return Err(ApiError::BadRequest("tag field too long".to_string()));
        }
        raw.extend_from_slice(&chunk);
    }
    String::from_utf8(raw).map_err(|_| ApiError::BadRequest("tag is not valid UTF-8".into()))
}

async fn stage_file(
    state: &AppState,
    field: &mut Field<'_>,
    original: &str,
    limit: u64,
) -> ApiResult<PendingFile> {
    let storage_path = state.names.generate(original);
    let upload = state.storage.put_stream(&storage_path).await?;
    let mut tee = TeeUpload::new(upload, limit);

    let streamed = async {
        while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
            tee.write(chunk).await?;
        }
        Ok::<(), ApiError>(())
    }
    .await;

    if let Err(e) = streamed {
        tracing::debug!(
            storage_path = %storage_path,
            bytes = tee.bytes_written(),
            error = %e,
            "Aborting staged upload"
        );
        if let Err(abort_err) = tee.abort().await {
            tracing::warn!(storage_path = %storage_path, error = %abort_err, "Failed to remove staging file");
        }
        return Err(e);
    }

    Ok(PendingFile {
        blob: tee.seal(),
        storage_path,
        original_name: display_name(original),
    })
}

/// Insert the catalog row. Takes plain fields so nothing borrowed from the
/// staged blob is held across the insert.
async fn catalog(
    state: &AppState,
    storage_path: &str,
    original_name: Option<String>,
    tags: Vec<String>,
    hash: &str,
    size: u64,
) -> ApiResult<Uuid> {
    let size_bytes = i64::try_from(size)
        .map_err(|_| ApiError::Internal("file size out of range".to_string()))?;
    let key = state
        .metadata
        .create_file(&NewFile {
            storage_path: storage_path.to_string(),
            original_name,
            tags,
            hash: Some(hash.to_string()),
            size_bytes,
        })
        .await?;
    Ok(key)
}

async fn discard_blob(blob: StagedBlob, storage_path: &str) {
    if let Err(e) = blob.abort().await {
        tracing::warn!(storage_path = %storage_path, error = %e, "Failed to remove staging file");
    }
}

fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("malformed multipart body: {}", err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::handler::Handler;
    use axum::http::HeaderValue;

    fn assert_handler<H: Handler<T, AppState>, T>(_: H) {}

    #[test]
    fn test_upload_file_is_a_routable_handler() {
        // Fails to compile if the handler future stops being Send.
        assert_handler(upload_file);
    }

    #[test]
    fn test_content_length_precheck() {
        let mut headers = HeaderMap::new();
        assert!(check_content_length(&headers, 10).is_ok());

        headers.insert(
            CONTENT_LENGTH,
            HeaderValue::from(10 + MULTIPART_OVERHEAD),
        );
        assert!(check_content_length(&headers, 10).is_ok());

        headers.insert(
            CONTENT_LENGTH,
            HeaderValue::from(11 + MULTIPART_OVERHEAD),
        );
        let err = check_content_length(&headers, 10).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_content_length_precheck_ignores_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert!(check_content_length(&headers, 10).is_ok());
    }
}
