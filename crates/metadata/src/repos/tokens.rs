//! Token repository.

use crate::error::MetadataResult;
use crate::models::TokenRow;
use async_trait::async_trait;

/// Repository for token operations.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Store a token hash. Returns `AlreadyExists` if it is already present.
    async fn create_token(&self, token_hash: &str, description: Option<&str>)
    -> MetadataResult<()>;

    /// Whether a token with this hash exists.
    async fn token_exists(&self, token_hash: &str) -> MetadataResult<bool>;

    /// Get a token by hash.
    async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>>;
}
