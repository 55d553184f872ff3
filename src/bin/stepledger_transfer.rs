//! stepledger-transfer: daily step transfer job
//!
//! Run by a scheduler once a day, or by an operator. Credits each account's
//! recorded steps for a day to its lifetime and spendable step counters.
//! Safe to re-run for the same day.
//!
//! ## Usage
//! - `stepledger-transfer`: transfer yesterday (UTC)
//! - `stepledger-transfer --date 2024-05-09`: transfer an explicit day before today
//! - `stepledger-transfer --catch-up`: transfer every day since the last run
//!
//! ## Configuration
//! - TRANSFER_DATE: explicit day when `--date` is not given
//! - STEPLEDGER_CONFIG: configuration file path
//! - STEPLEDGER_LOG: log filter (default `info`)

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use stepledger::config::{Config, TRANSFER_DATE_ENV_VAR};
use stepledger::interfaces::{LedgerError, LedgerStore};
use stepledger::model::TransferReport;
use stepledger::services::step_transfer::validate_day;
use stepledger::services::StepTransferJob;
use stepledger::storage::init_storage;
use stepledger::utils::bootstrap::init_tracing;
use stepledger::utils::retry::{connection_backoff, is_retryable};

/// What the operator asked for.
enum Mode {
    Day(Option<NaiveDate>),
    CatchUp,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date {raw:?} (expected YYYY-MM-DD): {e}"))
}

fn parse_mode() -> Result<(Mode, Option<String>), String> {
    let mut date = None;
    let mut catch_up = false;
    let mut config_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--date" => {
                let raw = args.next().ok_or("--date requires a value")?;
                date = Some(parse_date(&raw)?);
            }
            "--catch-up" => catch_up = true,
            "--config" => {
                config_path = Some(args.next().ok_or("--config requires a value")?);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    if date.is_none() {
        if let Ok(raw) = std::env::var(TRANSFER_DATE_ENV_VAR) {
            if !raw.trim().is_empty() {
                date = Some(parse_date(&raw)?);
            }
        }
    }

    let mode = match (catch_up, date) {
        (true, Some(_)) => return Err("--catch-up cannot be combined with a date".to_string()),
        (true, None) => Mode::CatchUp,
        (false, date) => Mode::Day(date),
    };
    Ok((mode, config_path))
}

fn print_summary(report: &TransferReport) {
    for transfer in &report.transfers {
        println!("{}  {}  +{} steps", report.day, transfer.account_id, transfer.steps);
    }
    println!(
        "{}: {} accounts, {} steps transferred",
        report.day, report.accounts_affected, report.total_steps_transferred
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (mode, config_path) = parse_mode()?;
    let today = Utc::now().date_naive();
    if let Mode::Day(Some(day)) = mode {
        validate_day(day, today)?;
    }
    let config = Config::load(config_path.as_deref())?;

    let storage_config = config.storage.clone();
    let store: Arc<dyn LedgerStore> = (|| {
        let storage_config = storage_config.clone();
        async move { init_storage(&storage_config).await }
    })
    .retry(connection_backoff())
    .when(is_retryable)
    .notify(|err: &LedgerError, dur: Duration| {
        warn!(error = %err, delay = ?dur, "Storage unavailable, retrying");
    })
    .await?;

    let job = StepTransferJob::new(store, config.transfer.clone());

    match mode {
        Mode::Day(day) => {
            let report = job.run(day, today).await?;
            print_summary(&report);
        }
        Mode::CatchUp => {
            let reports = job.catch_up(today).await?;
            if reports.is_empty() {
                println!("Nothing to catch up");
            }
            for report in &reports {
                print_summary(report);
            }
            info!(days = reports.len(), "Catch-up finished");
        }
    }

    Ok(())
}
