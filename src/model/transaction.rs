//! Coin ledger lines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Earned,
    Spent,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earned => "EARNED",
            TransactionKind::Spent => "SPENT",
            TransactionKind::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EARNED" => Ok(TransactionKind::Earned),
            "SPENT" => Ok(TransactionKind::Spent),
            "ADJUSTMENT" => Ok(TransactionKind::Adjustment),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// A signed movement of coins on an account.
///
/// `reward_day` is set only on daily step rewards and is the reconciliation
/// key: at most one such line exists per (account, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub reason: String,
    pub reward_day: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl RewardTransaction {
    pub fn daily_reward(account_id: Uuid, day: NaiveDate, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            kind: TransactionKind::Earned,
            reason: daily_reward_reason(day),
            reward_day: Some(day),
            created_at: now,
        }
    }

    pub fn spent(account_id: Uuid, amount: i64, reason: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount: -amount.abs(),
            kind: TransactionKind::Spent,
            reason,
            reward_day: None,
            created_at: now,
        }
    }

    pub fn adjustment(account_id: Uuid, amount: i64, reason: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            kind: TransactionKind::Adjustment,
            reason,
            reward_day: None,
            created_at: now,
        }
    }
}

/// Display reason for a daily step reward line.
pub fn daily_reward_reason(day: NaiveDate) -> String {
    format!("Daily steps reward ({day})")
}
