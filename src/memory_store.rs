use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::store::{StoreError, UsageRecord, UsageStore};
use crate::{Clock, SystemClock};

/// In-process usage log. State is lost on restart, so quota resets with the
/// process; suitable for tests and single-instance deployments.
#[derive(Clone)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, Vec<UsageRecord>>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<UsageRecord>>>, StoreError>
    {
        self.records.lock().map_err(|_| StoreError::Backend {
            message: "usage map poisoned".to_string(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn append(&self, principal_id: &str, action: &str) -> Result<(), StoreError> {
        let ts_ms = self.clock.now_epoch_millis();
        let mut records = self.lock()?;
        records
            .entry(principal_id.to_string())
            .or_default()
            .push(UsageRecord {
                principal_id: principal_id.to_string(),
                action: action.to_string(),
                ts_ms,
            });
        Ok(())
    }

    async fn count_since(
        &self,
        principal_id: &str,
        action: Option<&str>,
        since_ms: u64,
    ) -> Result<u64, StoreError> {
        let records = self.lock()?;
        let count = records
            .get(principal_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|record| record.ts_ms >= since_ms)
                    .filter(|record| action.is_none_or(|action| record.action == action))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn list_recent(
        &self,
        principal_id: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let records = self.lock()?;
        let mut out: Vec<UsageRecord> = records
            .get(principal_id)
            .map(|entries| entries.clone())
            .unwrap_or_default();
        out.sort_by(|a, b| b.ts_ms.cmp(&a.ts_ms));
        out.truncate(limit);
        Ok(out)
    }

    async fn prune_before(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        let mut records = self.lock()?;
        let mut removed = 0u64;
        for entries in records.values_mut() {
            let before = entries.len();
            entries.retain(|record| record.ts_ms >= cutoff_ms);
            removed += (before - entries.len()) as u64;
        }
        records.retain(|_, entries| !entries.is_empty());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ManualClock;

    #[tokio::test]
    async fn append_uses_the_store_clock_not_caller_input() {
        let clock = Arc::new(ManualClock::new(5_000));
        let store = MemoryStore::with_clock(clock.clone());

        store.append("u1", "pitch").await.expect("append");
        clock.advance(Duration::from_millis(700));
        store.append("u1", "pitch").await.expect("append");

        let recent = store.list_recent("u1", 10).await.expect("list");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].ts_ms, 5_700);
        assert_eq!(recent[1].ts_ms, 5_000);
    }

    #[tokio::test]
    async fn count_since_is_inclusive_and_filters_by_action() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemoryStore::with_clock(clock.clone());

        store.append("u1", "pitch").await.expect("append");
        clock.set(2_000);
        store.append("u1", "summary").await.expect("append");

        assert_eq!(store.count_since("u1", None, 1_000).await.expect("count"), 2);
        assert_eq!(store.count_since("u1", None, 1_001).await.expect("count"), 1);
        assert_eq!(
            store
                .count_since("u1", Some("pitch"), 0)
                .await
                .expect("count"),
            1
        );
        assert_eq!(store.count_since("other", None, 0).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn prune_before_removes_only_older_records() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemoryStore::with_clock(clock.clone());

        store.append("u1", "pitch").await.expect("append");
        clock.set(9_000);
        store.append("u1", "pitch").await.expect("append");

        let removed = store.prune_before(9_000).await.expect("prune");
        assert_eq!(removed, 1);
        assert_eq!(store.count_since("u1", None, 0).await.expect("count"), 1);
    }
}
