//! Liveness record repository.

use crate::error::MetadataResult;
use async_trait::async_trait;

#[async_trait]
pub trait HeartbeatRepo: Send + Sync {
    /// Append a heartbeat row and return its id.
    async fn record_heartbeat(&self) -> MetadataResult<i64>;
}
