//! Domain records.
//!
//! Plain data persisted by a [`LedgerStore`](crate::interfaces::LedgerStore)
//! and returned to the API layer. All of them serialize with serde.

mod account;
mod activity;
mod catalog;
mod partner;
mod redemption;
mod transaction;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use account::{Account, NewAccount, Role};
pub use activity::{ActivityInput, ActivityRecord, ActivitySource, MAX_DAILY_STEPS};
pub use catalog::{
    CouponTemplate, MarketplaceQuery, NewCouponTemplate, NewPromotion, Promotion,
    PromotionFilter, PromotionUpdate, TemplateOrdering, TemplateUpdate, DEFAULT_VALIDITY_DAYS,
};
pub use partner::{NewPartner, Partner, PartnerStats};
pub use redemption::{
    sort_for_listing, ConsumptionReceipt, Redemption, RedemptionKind, RedemptionState,
};
pub use transaction::{daily_reward_reason, RewardTransaction, TransactionKind};

use crate::ledger::RewardChange;

/// Result of submitting a day's activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub record: ActivityRecord,
    /// True when this submission inserted the day's row.
    pub created: bool,
    pub reward: RewardChange,
    /// Spendable coins after the reconciliation committed.
    pub coins: i64,
}

/// Steps credited to one account by the transfer job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTransfer {
    pub account_id: Uuid,
    pub steps: u64,
}

/// Summary of one transfer run for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReport {
    pub day: NaiveDate,
    pub accounts_affected: u64,
    pub total_steps_transferred: u64,
    pub transfers: Vec<AccountTransfer>,
}

impl TransferReport {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            accounts_affected: 0,
            total_steps_transferred: 0,
            transfers: Vec::new(),
        }
    }

    pub fn record(&mut self, account_id: Uuid, steps: u64) {
        if steps == 0 {
            return;
        }
        self.accounts_affected += 1;
        self.total_steps_transferred += steps;
        self.transfers.push(AccountTransfer { account_id, steps });
    }
}
