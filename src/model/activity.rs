//! Daily activity records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interfaces::{LedgerError, Result};

/// Upper bound on steps accepted for a single day.
pub const MAX_DAILY_STEPS: u32 = 300_000;

/// Where an activity sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    AppleHealth,
    GoogleFit,
    Manual,
}

impl ActivitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivitySource::AppleHealth => "apple_health",
            ActivitySource::GoogleFit => "google_fit",
            ActivitySource::Manual => "manual",
        }
    }
}

impl fmt::Display for ActivitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivitySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "apple_health" => Ok(ActivitySource::AppleHealth),
            "google_fit" => Ok(ActivitySource::GoogleFit),
            "manual" => Ok(ActivitySource::Manual),
            other => Err(format!("unknown activity source: {other}")),
        }
    }
}

/// Activity submission for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInput {
    pub day: NaiveDate,
    pub steps: u32,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub calories: u32,
    #[serde(default)]
    pub source: Option<ActivitySource>,
}

impl ActivityInput {
    pub fn new(day: NaiveDate, steps: u32) -> Self {
        Self {
            day,
            steps,
            duration_secs: 0,
            distance_km: 0.0,
            calories: 0,
            source: None,
        }
    }

    /// Reject malformed input before anything is written.
    ///
    /// One day of slack past `today` absorbs client time zones ahead of UTC.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.steps > MAX_DAILY_STEPS {
            return Err(LedgerError::Validation(format!(
                "steps must not exceed {MAX_DAILY_STEPS}, got {}",
                self.steps
            )));
        }
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(LedgerError::Validation(
                "distance_km must be a non-negative number".to_string(),
            ));
        }
        let latest = today.checked_add_days(Days::new(1)).unwrap_or(today);
        if self.day > latest {
            return Err(LedgerError::Validation(format!(
                "activity day {} is in the future",
                self.day
            )));
        }
        Ok(())
    }
}

/// One row per (account, day). Re-submitting a day updates the row.
///
/// `steps_transferred` records how many of `steps` the transfer job has
/// already credited to the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub account_id: Uuid,
    pub day: NaiveDate,
    pub steps: u32,
    pub duration_secs: u32,
    pub distance_km: f64,
    pub calories: u32,
    pub source: Option<ActivitySource>,
    pub steps_transferred: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn from_input(account_id: Uuid, input: &ActivityInput, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            day: input.day,
            steps: input.steps,
            duration_secs: input.duration_secs,
            distance_km: input.distance_km,
            calories: input.calories,
            source: input.source,
            steps_transferred: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the measured fields, keeping identity and transfer progress.
    pub fn apply(&mut self, input: &ActivityInput, now: DateTime<Utc>) {
        self.steps = input.steps;
        self.duration_secs = input.duration_secs;
        self.distance_km = input.distance_km;
        self.calories = input.calories;
        self.source = input.source;
        self.updated_at = now;
    }

    /// Steps not yet credited by the transfer job.
    pub fn untransferred_steps(&self) -> u32 {
        self.steps.saturating_sub(self.steps_transferred)
    }
}
