//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Only operations that
//! are idempotent by construction are retried: reward reconciliation,
//! consumption and per-account step transfer. A coupon purchase is never
//! retried blindly since a second call buys a second unit.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::interfaces::LedgerError;

/// Backoff for write transactions that lost a lock race.
///
/// - Min delay: 10ms
/// - Max delay: 500ms
/// - Max attempts: 5
/// - Jitter enabled
pub fn storage_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_millis(500))
        .with_max_times(5)
        .with_jitter()
}

/// Backoff for opening the store at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 10
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(10)
        .with_jitter()
}

/// Determines if a ledger error is worth retrying.
///
/// Retryable: lock contention and pool exhaustion, where nothing was written.
///
/// Non-retryable: business rules, validation, policy and not-found errors
/// will fail the same way again, and unique-constraint conflicts mean another
/// writer already won.
pub fn is_retryable(error: &LedgerError) -> bool {
    matches!(error, LedgerError::Storage(e) if e.is_transient())
}
