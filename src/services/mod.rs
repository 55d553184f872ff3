//! Engines exposed to the API layer.
//!
//! Each service checks the caller against the policy gate, validates input,
//! then hands the atomic part to the [`LedgerStore`](crate::interfaces::LedgerStore).
//! Idempotent writes are retried on transient storage failures; purchases
//! never are.

pub mod accounts;
pub mod activity;
pub mod catalog;
pub mod policy;
pub mod promotion;
pub mod redemption;
pub mod step_transfer;

pub use accounts::AccountService;
pub use activity::ActivityService;
pub use catalog::CatalogService;
pub use policy::{Caller, Identity};
pub use promotion::PromotionService;
pub use redemption::{IssuedCoupon, RedemptionService};
pub use step_transfer::StepTransferJob;

use std::time::Duration;

use tracing::{error, warn};

use crate::interfaces::LedgerError;

/// Log storage failures in full before they are sanitized for the caller.
pub(crate) fn log_storage(operation: &'static str) -> impl Fn(LedgerError) -> LedgerError {
    move |e| {
        if let LedgerError::Storage(inner) = &e {
            error!(operation, error = %inner, "Storage failure");
        }
        e
    }
}

pub(crate) fn log_retry(operation: &'static str) -> impl Fn(&LedgerError, Duration) {
    move |e, delay| {
        warn!(operation, error = %e, delay = ?delay, "Transient storage failure, retrying");
    }
}
