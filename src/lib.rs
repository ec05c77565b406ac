//! Per-principal rolling-window usage quotas.
//!
//! A [`QuotaGate`] answers "may this principal perform one more metered
//! action right now" by counting usage records in a trailing window, and
//! appends a record after the caller performs the action. Check and record
//! are deliberately separate operations composed by the caller; the gap
//! between them is not transactional (see [`QuotaGate::check`]).

pub mod config;
mod error;
pub mod limiter;
pub mod memory_store;
pub mod observability;
pub mod store;

#[cfg(feature = "store-sqlite")]
pub mod sqlite_store;

pub use config::QuotaConfig;
pub use error::QuotaError;
pub use limiter::{QuotaDecision, QuotaGate};
pub use memory_store::MemoryStore;
pub use observability::{GateMetrics, GateMetricsSnapshot};
pub use store::{DEFAULT_ACTION, StoreError, UsageRecord, UsageStore};

#[cfg(feature = "store-sqlite")]
pub use sqlite_store::SqliteStore;

pub type Result<T> = std::result::Result<T, QuotaError>;

pub trait Clock: Send + Sync {
    fn now_epoch_millis(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> u64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_else(|_| std::time::Duration::from_secs(0));
        now.as_millis() as u64
    }
}

/// Deterministic clock for tests; advances only when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: std::sync::atomic::AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: std::sync::atomic::AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance(&self, delta: std::time::Duration) {
        self.now_ms.fetch_add(
            delta.as_millis() as u64,
            std::sync::atomic::Ordering::SeqCst,
        );
    }
}

impl Clock for ManualClock {
    fn now_epoch_millis(&self) -> u64 {
        self.now_ms.load(std::sync::atomic::Ordering::SeqCst)
    }
}
