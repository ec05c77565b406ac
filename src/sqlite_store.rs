use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::store::{StoreError, UsageRecord, UsageStore};
use crate::{Clock, SystemClock};

/// Durable usage log in a single sqlite file. Every call opens its own
/// connection on the blocking pool; WAL keeps concurrent readers cheap.
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;
            Ok(())
        })
        .await?
    }
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn append(&self, principal_id: &str, action: &str) -> Result<(), StoreError> {
        let path = self.path.clone();
        let principal_id = principal_id.to_string();
        let action = action.to_string();
        // Write time comes from the store, not the caller.
        let ts_ms = millis_to_i64(self.clock.now_epoch_millis());

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;
            conn.execute(
                "INSERT INTO usage_log (principal_id, action, ts_ms) VALUES (?1, ?2, ?3)",
                rusqlite::params![principal_id, action, ts_ms],
            )?;
            Ok(())
        })
        .await?
    }

    async fn count_since(
        &self,
        principal_id: &str,
        action: Option<&str>,
        since_ms: u64,
    ) -> Result<u64, StoreError> {
        let path = self.path.clone();
        let principal_id = principal_id.to_string();
        let action = action.map(str::to_string);
        let since = millis_to_i64(since_ms);

        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;

            let count: i64 = match action {
                Some(action) => conn.query_row(
                    "SELECT COUNT(*) FROM usage_log
                     WHERE principal_id=?1 AND action=?2 AND ts_ms>=?3",
                    rusqlite::params![principal_id, action, since],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM usage_log
                     WHERE principal_id=?1 AND ts_ms>=?2",
                    rusqlite::params![principal_id, since],
                    |row| row.get(0),
                )?,
            };
            Ok(i64_to_u64(count))
        })
        .await?
    }

    async fn list_recent(
        &self,
        principal_id: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let path = self.path.clone();
        let principal_id = principal_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        tokio::task::spawn_blocking(move || -> Result<Vec<UsageRecord>, StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;

            let mut stmt = conn.prepare(
                "SELECT principal_id, action, ts_ms FROM usage_log
                 WHERE principal_id=?1
                 ORDER BY ts_ms DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![principal_id, limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (principal_id, action, ts_ms) = row?;
                out.push(UsageRecord {
                    principal_id,
                    action,
                    ts_ms: i64_to_u64(ts_ms),
                });
            }
            Ok(out)
        })
        .await?
    }

    async fn prune_before(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        let path = self.path.clone();
        let cutoff = millis_to_i64(cutoff_ms);

        tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
            let conn = open_connection(path)?;
            init_schema(&conn)?;
            let removed = conn.execute(
                "DELETE FROM usage_log WHERE ts_ms < ?1",
                rusqlite::params![cutoff],
            )?;
            Ok(removed as u64)
        })
        .await?
    }
}

fn init_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            principal_id TEXT NOT NULL,
            action TEXT NOT NULL,
            ts_ms INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_usage_log_principal_ts
            ON usage_log(principal_id, ts_ms);
        CREATE INDEX IF NOT EXISTS idx_usage_log_principal_action_ts
            ON usage_log(principal_id, action, ts_ms);",
    )?;
    Ok(())
}

fn open_connection(path: PathBuf) -> Result<rusqlite::Connection, rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    let _ = conn.busy_timeout(Duration::from_secs(5));
    let _ = conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
    Ok(conn)
}

fn millis_to_i64(millis: u64) -> i64 {
    if millis > i64::MAX as u64 {
        i64::MAX
    } else {
        millis as i64
    }
}

fn i64_to_u64(value: i64) -> u64 {
    if value <= 0 { 0 } else { value as u64 }
}
