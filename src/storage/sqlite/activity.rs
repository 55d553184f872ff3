//! Activity rows and daily reward reconciliation.

use chrono::{DateTime, NaiveDate, Utc};
use sea_query::{Asterisk, Expr, Order, Query, SqliteQueryBuilder};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::{accounts, rows};
use crate::interfaces::{LedgerError, Result};
use crate::ledger::{plan_reward, RewardAction, RewardPolicy};
use crate::model::{
    daily_reward_reason, Account, ActivityInput, ActivityOutcome, ActivityRecord,
    RewardTransaction, TransactionKind,
};
use crate::storage::schema::{Activities, RewardTransactions};

pub(super) async fn get(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    day: NaiveDate,
) -> Result<Option<ActivityRecord>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Activities::Table)
        .and_where(Expr::col(Activities::AccountId).eq(account_id.to_string()))
        .and_where(Expr::col(Activities::Day).eq(rows::day(day)))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::activity).transpose()
}

async fn insert(conn: &mut SqliteConnection, record: &ActivityRecord) -> Result<()> {
    let query = Query::insert()
        .into_table(Activities::Table)
        .columns([
            Activities::AccountId,
            Activities::Day,
            Activities::Steps,
            Activities::DurationSecs,
            Activities::DistanceKm,
            Activities::Calories,
            Activities::Source,
            Activities::StepsTransferred,
            Activities::CreatedAt,
            Activities::UpdatedAt,
        ])
        .values_panic([
            record.account_id.to_string().into(),
            rows::day(record.day).into(),
            record.steps.into(),
            record.duration_secs.into(),
            record.distance_km.into(),
            record.calories.into(),
            record.source.map(|s| s.as_str().to_string()).into(),
            record.steps_transferred.into(),
            rows::ts(record.created_at).into(),
            rows::ts(record.updated_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

async fn update(conn: &mut SqliteConnection, record: &ActivityRecord) -> Result<()> {
    let query = Query::update()
        .table(Activities::Table)
        .values([
            (Activities::Steps, record.steps.into()),
            (Activities::DurationSecs, record.duration_secs.into()),
            (Activities::DistanceKm, record.distance_km.into()),
            (Activities::Calories, record.calories.into()),
            (
                Activities::Source,
                record.source.map(|s| s.as_str().to_string()).into(),
            ),
            (Activities::UpdatedAt, rows::ts(record.updated_at).into()),
        ])
        .and_where(Expr::col(Activities::AccountId).eq(record.account_id.to_string()))
        .and_where(Expr::col(Activities::Day).eq(rows::day(record.day)))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn mark_transferred(
    conn: &mut SqliteConnection,
    record: &ActivityRecord,
) -> Result<()> {
    let query = Query::update()
        .table(Activities::Table)
        .value(Activities::StepsTransferred, record.steps)
        .and_where(Expr::col(Activities::AccountId).eq(record.account_id.to_string()))
        .and_where(Expr::col(Activities::Day).eq(rows::day(record.day)))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn list(
    conn: &mut SqliteConnection,
    account_id: Uuid,
) -> Result<Vec<ActivityRecord>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Activities::Table)
        .and_where(Expr::col(Activities::AccountId).eq(account_id.to_string()))
        .order_by(Activities::Day, Order::Desc)
        .to_string(SqliteQueryBuilder);

    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows::rows(&found, rows::activity)
}

/// Accounts with steps on `day` not yet moved to their balances.
pub(super) async fn pending_accounts(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> Result<Vec<Uuid>> {
    let query = Query::select()
        .column(Activities::AccountId)
        .from(Activities::Table)
        .and_where(Expr::col(Activities::Day).eq(rows::day(day)))
        .and_where(Expr::col(Activities::Steps).gt(Expr::col(Activities::StepsTransferred)))
        .order_by(Activities::AccountId, Order::Asc)
        .to_string(SqliteQueryBuilder);

    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    found
        .iter()
        .map(|row| -> Result<Uuid> {
            let raw: String = sqlx::Row::try_get(row, "account_id")?;
            Ok(Uuid::parse_str(&raw)?)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reward reconciliation
// ---------------------------------------------------------------------------

async fn earned_line(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    day: NaiveDate,
) -> Result<Option<RewardTransaction>> {
    let query = Query::select()
        .column(Asterisk)
        .from(RewardTransactions::Table)
        .and_where(Expr::col(RewardTransactions::AccountId).eq(account_id.to_string()))
        .and_where(Expr::col(RewardTransactions::RewardDay).eq(rows::day(day)))
        .and_where(Expr::col(RewardTransactions::Kind).eq(TransactionKind::Earned.as_str()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::transaction).transpose()
}

/// Bring the day's EARNED line and the coin balance in line with `record`.
async fn reconcile_locked(
    conn: &mut SqliteConnection,
    account: &Account,
    record: ActivityRecord,
    created: bool,
    policy: &RewardPolicy,
    now: DateTime<Utc>,
) -> Result<ActivityOutcome> {
    let existing = earned_line(conn, account.id, record.day).await?;
    let plan = plan_reward(policy, existing.as_ref(), record.steps);

    if plan.is_noop() {
        return Ok(ActivityOutcome {
            record,
            created,
            reward: plan.change,
            coins: account.coins,
        });
    }

    let coins = plan.settle(account.coins)?;
    match plan.action {
        RewardAction::Keep => {}
        RewardAction::Insert { amount } => {
            let line = RewardTransaction::daily_reward(account.id, record.day, amount, now);
            accounts::insert_line(conn, &line).await?;
        }
        RewardAction::Update { id, amount } => {
            let query = Query::update()
                .table(RewardTransactions::Table)
                .value(RewardTransactions::Amount, amount)
                .value(RewardTransactions::Reason, daily_reward_reason(record.day))
                .and_where(Expr::col(RewardTransactions::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *conn).await?;
        }
        RewardAction::Delete { id } => {
            let query = Query::delete()
                .from_table(RewardTransactions::Table)
                .and_where(Expr::col(RewardTransactions::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *conn).await?;
        }
    }
    accounts::set_coins(conn, account.id, coins).await?;

    debug!(
        account_id = %account.id,
        day = %record.day,
        previous = plan.change.previous,
        current = plan.change.current,
        "Daily reward reconciled"
    );

    Ok(ActivityOutcome {
        record,
        created,
        reward: plan.change,
        coins,
    })
}

pub(super) async fn submit(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    input: &ActivityInput,
    policy: &RewardPolicy,
    now: DateTime<Utc>,
) -> Result<ActivityOutcome> {
    let account = accounts::require(conn, account_id).await?;

    let (record, created) = match get(conn, account_id, input.day).await? {
        Some(mut record) => {
            record.apply(input, now);
            update(conn, &record).await?;
            (record, false)
        }
        None => {
            let record = ActivityRecord::from_input(account_id, input, now);
            insert(conn, &record).await?;
            (record, true)
        }
    };

    reconcile_locked(conn, &account, record, created, policy, now).await
}

pub(super) async fn reconcile(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    day: NaiveDate,
    policy: &RewardPolicy,
    now: DateTime<Utc>,
) -> Result<ActivityOutcome> {
    let account = accounts::require(conn, account_id).await?;
    let record = get(conn, account_id, day)
        .await?
        .ok_or_else(|| LedgerError::not_found("activity", format!("{account_id}/{day}")))?;

    reconcile_locked(conn, &account, record, false, policy, now).await
}
