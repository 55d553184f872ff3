//! Column encoding and row decoding for the SQLite backend.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::interfaces::{Result, StorageError};
use crate::model::{
    Account, ActivityRecord, CouponTemplate, Partner, Promotion, Redemption, RedemptionKind,
    RewardTransaction,
};

pub(super) const KIND_COUPON: &str = "coupon";
pub(super) const KIND_PROMOTION: &str = "promotion";

/// Fixed-width UTC timestamp; lexical order is chronological order.
pub(super) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn day(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn corrupt(column: &str, raw: &str, reason: impl std::fmt::Display) -> StorageError {
    StorageError::Corrupt(format!("{column} = {raw:?}: {reason}"))
}

fn parse_ts(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(column, raw, e).into())
}

fn parse_day(column: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| corrupt(column, raw, e).into())
}

fn text(row: &SqliteRow, column: &str) -> Result<String> {
    Ok(row.try_get::<String, _>(column)?)
}

fn opt_text(row: &SqliteRow, column: &str) -> Result<Option<String>> {
    Ok(row.try_get::<Option<String>, _>(column)?)
}

fn int(row: &SqliteRow, column: &str) -> Result<i64> {
    Ok(row.try_get::<i64, _>(column)?)
}

fn uint<T: TryFrom<i64>>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw = int(row, column)?;
    T::try_from(raw).map_err(|_| corrupt(column, &raw.to_string(), "out of range").into())
}

fn flag(row: &SqliteRow, column: &str) -> Result<bool> {
    Ok(row.try_get::<bool, _>(column)?)
}

fn uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(&text(row, column)?)?)
}

fn opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    opt_text(row, column)?
        .map(|raw| Uuid::parse_str(&raw).map_err(Into::into))
        .transpose()
}

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    parse_ts(column, &text(row, column)?)
}

fn opt_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    opt_text(row, column)?
        .map(|raw| parse_ts(column, &raw))
        .transpose()
}

fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw = text(row, column)?;
    raw.parse().map_err(|e: String| corrupt(column, &raw, e).into())
}

pub(super) fn account(row: &SqliteRow) -> Result<Account> {
    Ok(Account {
        id: uuid(row, "id")?,
        email: opt_text(row, "email")?,
        phone_number: opt_text(row, "phone_number")?,
        first_name: opt_text(row, "first_name")?,
        last_name: opt_text(row, "last_name")?,
        role: parsed(row, "role")?,
        coins: int(row, "coins")?,
        available_steps: int(row, "available_steps")?,
        overall_steps: int(row, "overall_steps")?,
        is_active: flag(row, "is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn partner(row: &SqliteRow) -> Result<Partner> {
    Ok(Partner {
        id: uuid(row, "id")?,
        account_id: uuid(row, "account_id")?,
        name: text(row, "name")?,
        description: text(row, "description")?,
        website: opt_text(row, "website")?,
        is_active: flag(row, "is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn template(row: &SqliteRow) -> Result<CouponTemplate> {
    Ok(CouponTemplate {
        id: uuid(row, "id")?,
        partner_id: uuid(row, "partner_id")?,
        category: text(row, "category")?,
        title: text(row, "title")?,
        description: text(row, "description")?,
        cost_coins: int(row, "cost_coins")?,
        validity_days: uint(row, "validity_days")?,
        quantity: row.try_get::<Option<i64>, _>("quantity")?,
        purchased_count: int(row, "purchased_count")?,
        is_active: flag(row, "is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn promotion(row: &SqliteRow) -> Result<Promotion> {
    Ok(Promotion {
        id: uuid(row, "id")?,
        partner_id: uuid(row, "partner_id")?,
        title: text(row, "title")?,
        description: text(row, "description")?,
        required_steps: int(row, "required_steps")?,
        max_redemptions_per_user: uint(row, "max_redemptions_per_user")?,
        is_active: flag(row, "is_active")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn activity(row: &SqliteRow) -> Result<ActivityRecord> {
    Ok(ActivityRecord {
        account_id: uuid(row, "account_id")?,
        day: parse_day("day", &text(row, "day")?)?,
        steps: uint(row, "steps")?,
        duration_secs: uint(row, "duration_secs")?,
        distance_km: row.try_get::<f64, _>("distance_km")?,
        calories: uint(row, "calories")?,
        source: opt_text(row, "source")?
            .map(|raw| raw.parse().map_err(|e: String| corrupt("source", &raw, e)))
            .transpose()?,
        steps_transferred: uint(row, "steps_transferred")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(super) fn transaction(row: &SqliteRow) -> Result<RewardTransaction> {
    Ok(RewardTransaction {
        id: uuid(row, "id")?,
        account_id: uuid(row, "account_id")?,
        amount: int(row, "amount")?,
        kind: parsed(row, "kind")?,
        reason: text(row, "reason")?,
        reward_day: opt_text(row, "reward_day")?
            .map(|raw| parse_day("reward_day", &raw))
            .transpose()?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(super) fn redemption(row: &SqliteRow) -> Result<Redemption> {
    let raw_kind = text(row, "kind")?;
    let kind = match (raw_kind.as_str(), opt_uuid(row, "template_id")?, opt_uuid(row, "promotion_id")?) {
        (KIND_COUPON, Some(template_id), _) => RedemptionKind::Coupon { template_id },
        (KIND_PROMOTION, _, Some(promotion_id)) => RedemptionKind::Promotion { promotion_id },
        _ => return Err(corrupt("kind", &raw_kind, "missing or unknown reference").into()),
    };
    Ok(Redemption {
        token: uuid(row, "token")?,
        account_id: uuid(row, "account_id")?,
        kind,
        consumed: flag(row, "consumed")?,
        consumed_at: opt_timestamp(row, "consumed_at")?,
        purchased_at: timestamp(row, "purchased_at")?,
    })
}

pub(super) fn rows<T>(rows: &[SqliteRow], decode: fn(&SqliteRow) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(decode).collect()
}
