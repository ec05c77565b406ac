use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Quota for one metered action class, injected at gate construction.
///
/// A `limit` of zero denies every check.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl QuotaConfig {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_secs: window.as_secs(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub(crate) fn window_millis(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_window_secs() -> u64 {
    DEFAULT_WINDOW_SECS
}
