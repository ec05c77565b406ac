use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;
use crate::error::QuotaError;
use crate::observability::{GateMetrics, GateMetricsSnapshot};
use crate::store::{DEFAULT_ACTION, UsageStore};
use crate::{Clock, SystemClock};

/// Outcome of a quota check. `remaining` never goes negative, even when the
/// window holds more records than the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Gates a metered action behind a rolling-window usage count.
///
/// Callers compose the two operations: [`check`](Self::check) before the
/// action, [`record`](Self::record) after it. Nothing serializes the gap
/// between them, so two concurrent callers can both be allowed on the last
/// unit of quota; the overrun is bounded by the number of racers. The design
/// trades exactness for a stateless read path.
pub struct QuotaGate {
    store: Arc<dyn UsageStore>,
    config: QuotaConfig,
    clock: Arc<dyn Clock>,
    metrics: GateMetrics,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn UsageStore>, config: QuotaConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn UsageStore>,
        config: QuotaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            metrics: GateMetrics::default(),
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Read-only: counts this principal's records in the trailing window and
    /// compares against the configured limit. A store failure surfaces as
    /// [`QuotaError::CheckFailed`], never as a denial.
    pub async fn check(&self, principal_id: &str) -> Result<QuotaDecision, QuotaError> {
        self.metrics.record_check();
        let now_ms = self.clock.now_epoch_millis();
        let window_start = now_ms.saturating_sub(self.config.window_millis());

        let used = match self.store.count_since(principal_id, None, window_start).await {
            Ok(used) => used,
            Err(source) => {
                self.metrics.record_check_failure();
                return Err(QuotaError::CheckFailed { source });
            }
        };

        let limit = u64::from(self.config.limit);
        let decision = QuotaDecision {
            allowed: used < limit,
            remaining: limit.saturating_sub(used) as u32,
        };
        if decision.allowed {
            self.metrics.record_allowed();
        } else {
            self.metrics.record_denied();
        }
        tracing::debug!(
            principal_id,
            used,
            remaining = decision.remaining,
            allowed = decision.allowed,
            "quota check"
        );
        Ok(decision)
    }

    /// Records one consumed unit under the default `"pitch"` action.
    pub async fn record(&self, principal_id: &str) -> Result<(), QuotaError> {
        self.record_action(principal_id, DEFAULT_ACTION).await
    }

    /// Records one consumed unit. The store assigns the timestamp. A failed
    /// write is best-effort bookkeeping gone wrong: it is surfaced as
    /// [`QuotaError::RecordFailed`] but the already-performed action is not
    /// compensated.
    pub async fn record_action(&self, principal_id: &str, action: &str) -> Result<(), QuotaError> {
        match self.store.append(principal_id, action).await {
            Ok(()) => {
                self.metrics.record_written();
                Ok(())
            }
            Err(source) => {
                self.metrics.record_write_failure();
                tracing::warn!(principal_id, action, error = %source, "usage record write failed");
                Err(QuotaError::RecordFailed { source })
            }
        }
    }

    pub fn metrics(&self) -> GateMetricsSnapshot {
        self.metrics.snapshot()
    }
}
