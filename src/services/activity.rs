//! Reward Engine.
//!
//! Activity ingestion and daily reward reconciliation run as one atomic
//! unit in the store. Both are idempotent, so transient storage failures
//! are retried with backoff.

use std::sync::Arc;

use backon::Retryable;
use chrono::{NaiveDate, Utc};
use tracing::info;

use super::policy::{self, Caller};
use super::{log_retry, log_storage};
use crate::interfaces::{LedgerStore, Result};
use crate::ledger::RewardPolicy;
use crate::model::{ActivityInput, ActivityOutcome};
use crate::utils::retry::{is_retryable, storage_backoff};

pub struct ActivityService {
    store: Arc<dyn LedgerStore>,
    policy: RewardPolicy,
}

impl ActivityService {
    pub fn new(store: Arc<dyn LedgerStore>, policy: RewardPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    /// Record or update the caller's activity for a day and settle its reward.
    #[tracing::instrument(name = "rewards.submit", skip_all, fields(day = %input.day, steps = input.steps))]
    pub async fn submit(&self, caller: &Caller, input: ActivityInput) -> Result<ActivityOutcome> {
        let account_id = policy::authenticated(caller)?.account_id;
        input.validate(Utc::now().date_naive())?;

        let store = &self.store;
        let policy = &self.policy;
        let input = &input;
        let outcome = (|| async move {
            store
                .submit_activity(account_id, input, policy, Utc::now())
                .await
        })
        .retry(storage_backoff())
        .when(is_retryable)
        .notify(log_retry("submit_activity"))
        .await
        .map_err(log_storage("submit_activity"))?;

        info!(
            account_id = %account_id,
            day = %input.day,
            steps = input.steps,
            reward = outcome.reward.current,
            delta = outcome.reward.delta,
            created = outcome.created,
            "Activity recorded"
        );
        Ok(outcome)
    }

    /// Re-run reconciliation for a stored day without changing the activity.
    ///
    /// A no-op when the reward already matches the steps.
    #[tracing::instrument(name = "rewards.reconcile", skip_all, fields(day = %day))]
    pub async fn reconcile(&self, caller: &Caller, day: NaiveDate) -> Result<ActivityOutcome> {
        let account_id = policy::authenticated(caller)?.account_id;

        let store = &self.store;
        let policy = &self.policy;
        (|| async move {
            store
                .reconcile_reward(account_id, day, policy, Utc::now())
                .await
        })
        .retry(storage_backoff())
        .when(is_retryable)
        .notify(log_retry("reconcile_reward"))
        .await
        .map_err(log_storage("reconcile_reward"))
    }
}
