//! Step Transfer Job.
//!
//! Moves a day's recorded steps into each account's lifetime and spendable
//! counters. Every (account, day) row remembers how many of its steps were
//! already credited, so re-running a day credits nothing twice. Accounts are
//! independent and are transferred concurrently, one atomic unit each.
//!
//! A watermark per job name records the latest day up to which every day has
//! been processed. It only moves forward one day at a time, so a run that
//! skips ahead leaves the gap for the next catch-up.

use std::sync::Arc;

use backon::Retryable;
use chrono::{Days, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{log_retry, log_storage};
use crate::config::TransferConfig;
use crate::interfaces::{LedgerError, LedgerStore, Result};
use crate::model::TransferReport;
use crate::utils::retry::{is_retryable, storage_backoff};

pub struct StepTransferJob {
    store: Arc<dyn LedgerStore>,
    config: TransferConfig,
}

/// Only days strictly before `today` can be transferred.
pub fn validate_day(day: NaiveDate, today: NaiveDate) -> Result<()> {
    if day >= today {
        return Err(LedgerError::Validation(format!(
            "transfer day {day} must be before {today}"
        )));
    }
    Ok(())
}

/// The day a run without an explicit date transfers.
pub fn default_day(today: NaiveDate) -> NaiveDate {
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

impl StepTransferJob {
    pub fn new(store: Arc<dyn LedgerStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    /// Transfer `day`, or yesterday relative to `today`.
    ///
    /// The watermark advances only when `day` is the one right after it.
    pub async fn run(&self, day: Option<NaiveDate>, today: NaiveDate) -> Result<TransferReport> {
        let day = day.unwrap_or_else(|| default_day(today));
        validate_day(day, today)?;
        let report = self.transfer_day(day).await?;
        self.advance_watermark(day).await?;
        Ok(report)
    }

    /// Transfer every day after the watermark up to yesterday.
    ///
    /// Without a watermark only yesterday is transferred.
    pub async fn catch_up(&self, today: NaiveDate) -> Result<Vec<TransferReport>> {
        let last = default_day(today);
        let watermark = self
            .store
            .get_watermark(&self.config.job_name)
            .await
            .map_err(log_storage("get_watermark"))?;

        let mut day = match watermark {
            Some(done) => match done.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => return Ok(Vec::new()),
            },
            None => last,
        };

        if day > last {
            info!(job = %self.config.job_name, watermark = ?watermark, "Step transfer already up to date");
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        while day <= last {
            reports.push(self.run(Some(day), today).await?);
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(reports)
    }

    /// Transfer one day's untransferred steps for every account.
    ///
    /// Accounts that fail are logged and left for the next run; the first
    /// failure is returned after the rest have been processed.
    #[tracing::instrument(name = "transfer.day", skip_all, fields(day = %day))]
    pub async fn transfer_day(&self, day: NaiveDate) -> Result<TransferReport> {
        let accounts = self
            .store
            .pending_transfers(day)
            .await
            .map_err(log_storage("pending_transfers"))?;

        let mut report = TransferReport::empty(day);
        if accounts.is_empty() {
            warn!(day = %day, "No step records to transfer");
            return Ok(report);
        }

        let store = &self.store;
        let results: Vec<(Uuid, Result<u64>)> = stream::iter(accounts)
            .map(|account_id| async move {
                let result = (|| async move { store.transfer_steps(account_id, day).await })
                    .retry(storage_backoff())
                    .when(is_retryable)
                    .notify(log_retry("transfer_steps"))
                    .await;
                (account_id, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut first_failure = None;
        for (account_id, result) in results {
            match result {
                Ok(0) => {}
                Ok(steps) => {
                    info!(account_id = %account_id, day = %day, steps, "Steps transferred");
                    report.record(account_id, steps);
                }
                Err(e) => {
                    error!(account_id = %account_id, day = %day, error = %e, "Step transfer failed");
                    first_failure.get_or_insert(e);
                }
            }
        }

        info!(
            day = %day,
            accounts_affected = report.accounts_affected,
            total_steps_transferred = report.total_steps_transferred,
            "Step transfer finished"
        );

        match first_failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn advance_watermark(&self, day: NaiveDate) -> Result<()> {
        let job = &self.config.job_name;
        let current = self
            .store
            .get_watermark(job)
            .await
            .map_err(log_storage("get_watermark"))?;
        let next = match current {
            None => true,
            Some(done) => done.checked_add_days(Days::new(1)) == Some(day),
        };
        if !next {
            if current.is_some_and(|done| done < day) {
                info!(job = %job, watermark = ?current, day = %day, "Earlier days pending, watermark kept");
            }
            return Ok(());
        }
        self.store
            .put_watermark(job, day, Utc::now())
            .await
            .map_err(log_storage("put_watermark"))
    }
}
