use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Action tag used when the caller does not name one.
pub const DEFAULT_ACTION: &str = "pitch";

/// One consumption event. Append-only; never updated or deleted by the gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub principal_id: String,
    pub action: String,
    pub ts_ms: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store join error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[cfg(feature = "store-sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store backend error: {message}")]
    Backend { message: String },
}

/// Durable log of usage events, keyed by principal.
///
/// Timestamps are assigned by the store at write time. Callers never supply
/// them; caller-supplied time would let a skewed clock manipulate the window.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Append one record for the principal with a store-assigned timestamp.
    async fn append(&self, principal_id: &str, action: &str) -> Result<(), StoreError>;

    /// Count records with `ts_ms >= since_ms`, optionally restricted to one
    /// action tag. The lower bound is inclusive; there is no upper bound.
    async fn count_since(
        &self,
        principal_id: &str,
        action: Option<&str>,
        since_ms: u64,
    ) -> Result<u64, StoreError>;

    /// Newest-first listing for auditing.
    async fn list_recent(
        &self,
        principal_id: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, StoreError>;

    /// Delete records strictly older than `cutoff_ms` and return how many
    /// were removed. Retention maintenance for operators; the gate itself
    /// never deletes.
    async fn prune_before(&self, cutoff_ms: u64) -> Result<u64, StoreError>;
}
