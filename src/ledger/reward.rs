//! Daily step reward calculation and reconciliation.
//!
//! A day's reward is derived from its current step count. The ledger keeps
//! at most one EARNED line per (account, day), updated in place as the step
//! count changes and removed when the reward falls to zero. The account
//! balance moves by the difference only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interfaces::{BusinessRule, Result};
use crate::model::RewardTransaction;

/// Days below this many steps earn nothing.
pub const MIN_STEPS_THRESHOLD: u32 = 5000;
/// Steps per reward increment once the threshold is met.
pub const STEP_INCREMENT: u32 = 1000;
/// Coins paid per increment.
pub const COIN_PER_INCREMENT: i64 = 1;

/// Reward thresholds. Defaults are the named constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    pub min_steps_threshold: u32,
    pub step_increment: u32,
    pub coins_per_increment: i64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            min_steps_threshold: MIN_STEPS_THRESHOLD,
            step_increment: STEP_INCREMENT,
            coins_per_increment: COIN_PER_INCREMENT,
        }
    }
}

impl RewardPolicy {
    /// Coins earned for a day with `steps` steps.
    pub fn daily_reward(&self, steps: u32) -> i64 {
        if steps < self.min_steps_threshold || self.step_increment == 0 {
            return 0;
        }
        i64::from(steps / self.step_increment) * self.coins_per_increment
    }
}

/// Observable effect of a reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardChange {
    pub previous: i64,
    pub current: i64,
    pub delta: i64,
}

/// What to do with the day's EARNED line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardAction {
    Keep,
    Insert { amount: i64 },
    Update { id: Uuid, amount: i64 },
    Delete { id: Uuid },
}

/// Reconciliation decided against the locked view of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPlan {
    pub change: RewardChange,
    pub action: RewardAction,
}

impl RewardPlan {
    pub fn is_noop(&self) -> bool {
        self.change.delta == 0
    }

    /// Balance after applying the delta.
    ///
    /// Lowering a day's steps claws coins back; if they were already spent
    /// the whole update is refused rather than driving the balance negative.
    pub fn settle(&self, coins: i64) -> Result<i64> {
        let after = coins + self.change.delta;
        if after < 0 {
            return Err(BusinessRule::InsufficientBalance {
                required: -self.change.delta,
                available: coins,
            }
            .into());
        }
        Ok(after)
    }
}

/// Decide how to bring the day's EARNED line in line with `steps`.
pub fn plan(policy: &RewardPolicy, existing: Option<&RewardTransaction>, steps: u32) -> RewardPlan {
    let previous = existing.map(|t| t.amount).unwrap_or(0);
    let current = policy.daily_reward(steps);
    let change = RewardChange {
        previous,
        current,
        delta: current - previous,
    };

    let action = match (change.delta, current, existing) {
        (0, _, _) => RewardAction::Keep,
        (_, 0, Some(t)) => RewardAction::Delete { id: t.id },
        (_, 0, None) => RewardAction::Keep,
        (_, amount, Some(t)) => RewardAction::Update { id: t.id, amount },
        (_, amount, None) => RewardAction::Insert { amount },
    };

    RewardPlan { change, action }
}
