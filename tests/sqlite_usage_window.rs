#![cfg(feature = "store-sqlite")]

use std::sync::Arc;
use std::time::Duration;

use pitchgate::{ManualClock, QuotaConfig, QuotaDecision, QuotaGate, SqliteStore, UsageStore};

#[tokio::test]
async fn quota_window_rolls_over_a_durable_usage_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("usage.sqlite");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let store = Arc::new(SqliteStore::with_clock(&db_path, clock.clone()));
    store.init().await.expect("init");

    let gate = QuotaGate::with_clock(store.clone(), QuotaConfig::default(), clock.clone());

    for _ in 0..10 {
        let decision = gate.check("student-1").await.expect("check");
        assert!(decision.allowed);
        gate.record("student-1").await.expect("record");
    }

    let decision = gate.check("student-1").await.expect("check");
    assert_eq!(
        decision,
        QuotaDecision {
            allowed: false,
            remaining: 0
        }
    );

    // Another principal is unaffected.
    assert!(gate.check("student-2").await.expect("check").allowed);

    // The window self-expires: a day and a minute later the quota is back
    // without any reset job having run.
    clock.advance(Duration::from_secs(24 * 60 * 60 + 60));
    let decision = gate.check("student-1").await.expect("check");
    assert_eq!(
        decision,
        QuotaDecision {
            allowed: true,
            remaining: 10
        }
    );
}

#[tokio::test]
async fn denied_usage_persists_across_process_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("usage.sqlite");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));

    {
        let store = Arc::new(SqliteStore::with_clock(&db_path, clock.clone()));
        store.init().await.expect("init");
        let gate = QuotaGate::with_clock(
            store,
            QuotaConfig::new(2, Duration::from_secs(86_400)),
            clock.clone(),
        );
        gate.record("student-1").await.expect("record");
        gate.record("student-1").await.expect("record");
    }

    let store = Arc::new(SqliteStore::with_clock(&db_path, clock.clone()));
    let gate = QuotaGate::with_clock(
        store.clone(),
        QuotaConfig::new(2, Duration::from_secs(86_400)),
        clock,
    );
    assert!(!gate.check("student-1").await.expect("check").allowed);

    let recent = store.list_recent("student-1", 10).await.expect("list");
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|record| record.action == "pitch"));
}
