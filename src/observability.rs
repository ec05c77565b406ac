use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateMetricsSnapshot {
    pub checks: u64,
    pub allowed: u64,
    pub denied: u64,
    pub check_failures: u64,
    pub records: u64,
    pub record_failures: u64,
}

/// Counters for one gate instance. Atomic because the gate is shared
/// behind `Arc` across request handlers.
#[derive(Debug, Default)]
pub struct GateMetrics {
    checks: AtomicU64,
    allowed: AtomicU64,
    denied: AtomicU64,
    check_failures: AtomicU64,
    records: AtomicU64,
    record_failures: AtomicU64,
}

impl GateMetrics {
    pub(crate) fn record_check(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_check_failure(&self) {
        self.check_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.record_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GateMetricsSnapshot {
        GateMetricsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            check_failures: self.check_failures.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            record_failures: self.record_failures.load(Ordering::Relaxed),
        }
    }
}
