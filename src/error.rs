use thiserror::Error;

use crate::store::StoreError;

/// Failure kinds surfaced to callers of the gate.
///
/// `CheckFailed` means the usage count could not be determined; it is not a
/// quota denial, and safety-sensitive callers should treat it as "deny by
/// default". `RecordFailed` means the bookkeeping write failed after the
/// gated action was already permitted; the gate never compensates for it.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota check failed: {source}")]
    CheckFailed {
        #[source]
        source: StoreError,
    },
    #[error("usage record write failed: {source}")]
    RecordFailed {
        #[source]
        source: StoreError,
    },
}
