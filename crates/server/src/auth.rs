//! Bearer token gate for protected routes.

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

const BEARER_PREFIX: &str = "bearer ";

/// Pull the credential out of an `Authorization: Bearer <token>` header.
///
/// The error is a short reason for the log line.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or("missing authorization header")?
        .to_str()
        .map_err(|_| "authorization header is not valid text")?;

    // RFC 6750: Authorization scheme is case-insensitive
    let scheme = value.get(..BEARER_PREFIX.len()).ok_or("unsupported scheme")?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return Err("unsupported scheme");
    }

    let token = &value[BEARER_PREFIX.len()..];
    if token.is_empty() {
        return Err("empty bearer token");
    }
    if token.to_ascii_lowercase().contains(BEARER_PREFIX) {
        return Err("repeated bearer prefix");
    }
    Ok(token)
}

/// Hash a token for storage lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn reject(reason: &str) -> ApiError {
    metrics::AUTH_FAILURES.inc();
    tracing::warn!(reason, "Authentication failed");
    ApiError::Unauthorized(reason.to_string())
}

/// Authentication middleware. Runs the wrapped route only for a known token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token_hash = match extract_bearer_token(req.headers()) {
        Ok(token) => hash_token(token),
        Err(reason) => return Err(reject(reason)),
    };

    let token = state
        .metadata
        .get_token_by_hash(&token_hash)
        .await
        .map_err(|e| ApiError::Internal(format!("token lookup failed: {e}")))?
        .ok_or_else(|| reject("unknown token"))?;
    tracing::debug!(
        token_id = token.id,
        description = token.description.as_deref().unwrap_or(""),
        "Authenticated request"
    );

    Ok(next.run(req).await)
}
