//! Account, partner and ledger-line queries.

use chrono::{DateTime, Utc};
use sea_query::{Asterisk, Expr, Order, Query, SqliteQueryBuilder};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows;
use crate::interfaces::{LedgerError, Result};
use crate::ledger::admit_adjustment;
use crate::model::{Account, Partner, RewardTransaction};
use crate::storage::schema::{Accounts, Partners, RewardTransactions};

pub(super) async fn insert(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
    let query = Query::insert()
        .into_table(Accounts::Table)
        .columns([
            Accounts::Id,
            Accounts::Email,
            Accounts::PhoneNumber,
            Accounts::FirstName,
            Accounts::LastName,
            Accounts::Role,
            Accounts::Coins,
            Accounts::AvailableSteps,
            Accounts::OverallSteps,
            Accounts::IsActive,
            Accounts::CreatedAt,
        ])
        .values_panic([
            account.id.to_string().into(),
            account.email.clone().into(),
            account.phone_number.clone().into(),
            account.first_name.clone().into(),
            account.last_name.clone().into(),
            account.role.as_str().into(),
            account.coins.into(),
            account.available_steps.into(),
            account.overall_steps.into(),
            account.is_active.into(),
            rows::ts(account.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn get(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Account>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Accounts::Table)
        .and_where(Expr::col(Accounts::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::account).transpose()
}

pub(super) async fn require(conn: &mut SqliteConnection, id: Uuid) -> Result<Account> {
    get(conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found("account", id))
}

pub(super) async fn set_coins(conn: &mut SqliteConnection, id: Uuid, coins: i64) -> Result<()> {
    let query = Query::update()
        .table(Accounts::Table)
        .value(Accounts::Coins, coins)
        .and_where(Expr::col(Accounts::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn set_available_steps(
    conn: &mut SqliteConnection,
    id: Uuid,
    steps: i64,
) -> Result<()> {
    let query = Query::update()
        .table(Accounts::Table)
        .value(Accounts::AvailableSteps, steps)
        .and_where(Expr::col(Accounts::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

/// Add steps to both the lifetime and the spendable counter.
pub(super) async fn credit_steps(conn: &mut SqliteConnection, id: Uuid, steps: i64) -> Result<()> {
    let query = Query::update()
        .table(Accounts::Table)
        .value(
            Accounts::OverallSteps,
            Expr::col(Accounts::OverallSteps).add(steps),
        )
        .value(
            Accounts::AvailableSteps,
            Expr::col(Accounts::AvailableSteps).add(steps),
        )
        .and_where(Expr::col(Accounts::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn adjust(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(Account, RewardTransaction)> {
    let mut account = require(conn, account_id).await?;
    let coins = admit_adjustment(&account, amount)?;
    let line = RewardTransaction::adjustment(account_id, amount, reason.to_string(), now);

    set_coins(conn, account_id, coins).await?;
    insert_line(conn, &line).await?;

    account.coins = coins;
    Ok((account, line))
}

// ---------------------------------------------------------------------------
// Ledger lines
// ---------------------------------------------------------------------------

pub(super) async fn insert_line(conn: &mut SqliteConnection, line: &RewardTransaction) -> Result<()> {
    let query = Query::insert()
        .into_table(RewardTransactions::Table)
        .columns([
            RewardTransactions::Id,
            RewardTransactions::AccountId,
            RewardTransactions::Amount,
            RewardTransactions::Kind,
            RewardTransactions::Reason,
            RewardTransactions::RewardDay,
            RewardTransactions::CreatedAt,
        ])
        .values_panic([
            line.id.to_string().into(),
            line.account_id.to_string().into(),
            line.amount.into(),
            line.kind.as_str().into(),
            line.reason.clone().into(),
            line.reward_day.map(rows::day).into(),
            rows::ts(line.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn list_lines(
    conn: &mut SqliteConnection,
    account_id: Uuid,
) -> Result<Vec<RewardTransaction>> {
    let query = Query::select()
        .column(Asterisk)
        .from(RewardTransactions::Table)
        .and_where(Expr::col(RewardTransactions::AccountId).eq(account_id.to_string()))
        .order_by(RewardTransactions::CreatedAt, Order::Desc)
        .order_by(RewardTransactions::Id, Order::Desc)
        .to_string(SqliteQueryBuilder);

    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows::rows(&found, rows::transaction)
}

// ---------------------------------------------------------------------------
// Partners
// ---------------------------------------------------------------------------

pub(super) async fn insert_partner(conn: &mut SqliteConnection, partner: &Partner) -> Result<()> {
    require(conn, partner.account_id).await?;

    let query = Query::insert()
        .into_table(Partners::Table)
        .columns([
            Partners::Id,
            Partners::AccountId,
            Partners::Name,
            Partners::Description,
            Partners::Website,
            Partners::IsActive,
            Partners::CreatedAt,
        ])
        .values_panic([
            partner.id.to_string().into(),
            partner.account_id.to_string().into(),
            partner.name.clone().into(),
            partner.description.clone().into(),
            partner.website.clone().into(),
            partner.is_active.into(),
            rows::ts(partner.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

async fn find_partner(
    conn: &mut SqliteConnection,
    column: Partners,
    value: Uuid,
) -> Result<Option<Partner>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Partners::Table)
        .and_where(Expr::col(column).eq(value.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::partner).transpose()
}

pub(super) async fn get_partner(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Partner>> {
    find_partner(conn, Partners::Id, id).await
}

pub(super) async fn require_partner(conn: &mut SqliteConnection, id: Uuid) -> Result<Partner> {
    get_partner(conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found("partner", id))
}

pub(super) async fn partner_for_account(
    conn: &mut SqliteConnection,
    account_id: Uuid,
) -> Result<Option<Partner>> {
    find_partner(conn, Partners::AccountId, account_id).await
}

/// Rendered here so no `SelectStatement` is held across an await.
fn list_partners_sql(active_only: bool) -> String {
    let mut select = Query::select();
    select
        .column(Asterisk)
        .from(Partners::Table)
        .order_by(Partners::Name, Order::Asc);
    if active_only {
        select.and_where(Expr::col(Partners::IsActive).eq(true));
    }
    select.to_string(SqliteQueryBuilder)
}

pub(super) async fn list_partners(
    conn: &mut SqliteConnection,
    active_only: bool,
) -> Result<Vec<Partner>> {
    let query = list_partners_sql(active_only);
    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows::rows(&found, rows::partner)
}

pub(super) async fn set_partner_active(
    conn: &mut SqliteConnection,
    id: Uuid,
    active: bool,
) -> Result<Partner> {
    let mut partner = require_partner(conn, id).await?;

    let query = Query::update()
        .table(Partners::Table)
        .value(Partners::IsActive, active)
        .and_where(Expr::col(Partners::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    partner.is_active = active;
    Ok(partner)
}
