//! Per-account step transfer and job watermarks.

use chrono::{DateTime, NaiveDate, Utc};
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{accounts, activity, rows};
use crate::interfaces::{Result, StorageError};
use crate::storage::schema::Watermarks;

/// Move the untransferred steps of one (account, day) row. Never debits.
pub(super) async fn transfer(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    day: NaiveDate,
) -> Result<u64> {
    let Some(record) = activity::get(conn, account_id, day).await? else {
        return Ok(0);
    };
    let steps = record.untransferred_steps();
    if steps == 0 {
        return Ok(0);
    }

    activity::mark_transferred(conn, &record).await?;
    accounts::credit_steps(conn, account_id, i64::from(steps)).await?;
    Ok(u64::from(steps))
}

pub(super) async fn get_watermark(
    conn: &mut SqliteConnection,
    job: &str,
) -> Result<Option<NaiveDate>> {
    let query = Query::select()
        .column(Watermarks::Day)
        .from(Watermarks::Table)
        .and_where(Expr::col(Watermarks::Job).eq(job))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => {
            let raw: String = row.try_get("day")?;
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| StorageError::Corrupt(format!("watermark {raw:?}: {e}")).into())
        }
        None => Ok(None),
    }
}

pub(super) async fn put_watermark(
    conn: &mut SqliteConnection,
    job: &str,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<()> {
    let query = Query::insert()
        .into_table(Watermarks::Table)
        .columns([Watermarks::Job, Watermarks::Day, Watermarks::UpdatedAt])
        .values_panic([job.into(), rows::day(day).into(), rows::ts(now).into()])
        .on_conflict(
            OnConflict::column(Watermarks::Job)
                .update_columns([Watermarks::Day, Watermarks::UpdatedAt])
                .to_owned(),
        )
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}
