//! Access token initialization.

use anyhow::{Context, Result, bail};
use dss_core::config::AuthConfig;
use dss_metadata::{MetadataError, MetadataStore};

const BOOTSTRAP_DESCRIPTION: &str = "configured at startup";

/// Normalize a configured token hash: optional `sha256:` prefix, lowercase,
/// exactly 64 hex characters.
pub fn normalize_token_hash(raw: &str) -> Result<String> {
    // Lowercase to match auth::hash_token(), which emits lowercase hex.
    let hash = raw.trim();
    let hash = hash.strip_prefix("sha256:").unwrap_or(hash).to_lowercase();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid token hash {raw:?}: expected 64 hex chars");
    }
    Ok(hash)
}

/// Ensure every configured token hash exists. Returns how many were created.
pub async fn ensure_tokens(metadata: &dyn MetadataStore, config: &AuthConfig) -> Result<usize> {
    let hashes = config
        .token_hashes
        .iter()
        .map(|raw| normalize_token_hash(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut created = 0;
    for hash in &hashes {
        if metadata
            .token_exists(hash)
            .await
            .context("failed to look up configured token")?
        {
            tracing::debug!("Configured token already exists");
            continue;
        }
        match metadata.create_token(hash, Some(BOOTSTRAP_DESCRIPTION)).await {
            Ok(()) => created += 1,
            // Another instance inserted it first.
            Err(MetadataError::AlreadyExists(_)) => {}
            Err(e) => return Err(e).context("failed to create configured token"),
        }
    }

    if created > 0 {
        tracing::info!(created, "Configured access tokens created");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dss_metadata::SqliteStore;
    use dss_metadata::repos::TokenRepo;

    const HASH: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_normalize_token_hash() {
        assert_eq!(normalize_token_hash(HASH).unwrap(), HASH);
        assert_eq!(
            normalize_token_hash(&format!("sha256:{}", HASH.to_uppercase())).unwrap(),
            HASH
        );
        assert!(normalize_token_hash("abc").is_err());
        assert!(normalize_token_hash(&"z".repeat(64)).is_err());
    }

    #[tokio::test]
    async fn test_ensure_tokens_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("metadata.db"))
            .await
            .unwrap();
        let config = AuthConfig {
            token_hashes: vec![HASH.to_string(), format!("sha256:{HASH}")],
        };

        assert_eq!(ensure_tokens(&store, &config).await.unwrap(), 1);
        assert!(store.token_exists(HASH).await.unwrap());
        assert_eq!(ensure_tokens(&store, &config).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_tokens_rejects_invalid_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("metadata.db"))
            .await
            .unwrap();
        let config = AuthConfig {
            token_hashes: vec![HASH.to_string(), "not-a-hash".to_string()],
        };

        assert!(ensure_tokens(&store, &config).await.is_err());
        assert!(!store.token_exists(HASH).await.unwrap());
    }
}
