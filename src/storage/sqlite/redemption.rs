//! Coupon purchase, promotion redemption and consumption.

use chrono::{DateTime, Utc};
use sea_query::{Asterisk, Expr, Query, SqliteQueryBuilder};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{accounts, catalog, rows};
use crate::interfaces::{BusinessRule, LedgerError, Result, StorageError};
use crate::ledger::{admit_consumption, admit_promotion, admit_purchase};
use crate::model::{
    sort_for_listing, ConsumptionReceipt, Redemption, RedemptionKind, RewardTransaction,
};
use crate::storage::schema::Redemptions;

async fn insert(conn: &mut SqliteConnection, redemption: &Redemption) -> Result<()> {
    let (kind, template_id, promotion_id) = match redemption.kind {
        RedemptionKind::Coupon { template_id } => {
            (rows::KIND_COUPON, Some(template_id.to_string()), None)
        }
        RedemptionKind::Promotion { promotion_id } => {
            (rows::KIND_PROMOTION, None, Some(promotion_id.to_string()))
        }
    };

    let query = Query::insert()
        .into_table(Redemptions::Table)
        .columns([
            Redemptions::Token,
            Redemptions::AccountId,
            Redemptions::Kind,
            Redemptions::TemplateId,
            Redemptions::PromotionId,
            Redemptions::Consumed,
            Redemptions::ConsumedAt,
            Redemptions::PurchasedAt,
        ])
        .values_panic([
            redemption.token.to_string().into(),
            redemption.account_id.to_string().into(),
            kind.into(),
            template_id.into(),
            promotion_id.into(),
            redemption.consumed.into(),
            redemption.consumed_at.map(rows::ts).into(),
            rows::ts(redemption.purchased_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn get(conn: &mut SqliteConnection, token: Uuid) -> Result<Option<Redemption>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Redemptions::Table)
        .and_where(Expr::col(Redemptions::Token).eq(token.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::redemption).transpose()
}

pub(super) async fn list(conn: &mut SqliteConnection, account_id: Uuid) -> Result<Vec<Redemption>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Redemptions::Table)
        .and_where(Expr::col(Redemptions::AccountId).eq(account_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    let mut redemptions = rows::rows(&found, rows::redemption)?;
    sort_for_listing(&mut redemptions);
    Ok(redemptions)
}

async fn count_for_promotion(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    promotion_id: Uuid,
) -> Result<u32> {
    let query = Query::select()
        .expr(Expr::col(Redemptions::Token).count())
        .from(Redemptions::Table)
        .and_where(Expr::col(Redemptions::AccountId).eq(account_id.to_string()))
        .and_where(Expr::col(Redemptions::PromotionId).eq(promotion_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_one(&mut *conn).await?;
    let count: i64 = row.try_get(0)?;
    u32::try_from(count)
        .map_err(|_| StorageError::Corrupt(format!("redemption count {count}")).into())
}

pub(super) async fn purchase(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    template_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Redemption> {
    let account = accounts::require(conn, account_id).await?;
    let mut template = catalog::require_template(conn, template_id).await?;
    let partner = accounts::require_partner(conn, template.partner_id).await?;

    let effect = admit_purchase(&account, &template, &partner)?;

    accounts::set_coins(conn, account_id, effect.coins_after).await?;

    template.quantity = effect.quantity_after;
    template.purchased_count = effect.purchased_count_after;
    catalog::save_template(conn, &template).await?;

    if template.cost_coins > 0 {
        let line = RewardTransaction::spent(
            account_id,
            template.cost_coins,
            format!("Coupon purchase: {}", template.title),
            now,
        );
        accounts::insert_line(conn, &line).await?;
    }

    let redemption = Redemption::issue(account_id, RedemptionKind::Coupon { template_id }, now);
    insert(conn, &redemption).await?;
    Ok(redemption)
}

pub(super) async fn redeem_promotion(
    conn: &mut SqliteConnection,
    account_id: Uuid,
    promotion_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Redemption> {
    let account = accounts::require(conn, account_id).await?;
    let promotion = catalog::require_promotion(conn, promotion_id).await?;
    let prior = count_for_promotion(conn, account_id, promotion_id).await?;

    let steps_after = admit_promotion(&account, &promotion, prior)?;

    accounts::set_available_steps(conn, account_id, steps_after).await?;

    let redemption =
        Redemption::issue(account_id, RedemptionKind::Promotion { promotion_id }, now);
    insert(conn, &redemption).await?;
    Ok(redemption)
}

pub(super) async fn consume(
    conn: &mut SqliteConnection,
    token: Uuid,
    partner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ConsumptionReceipt> {
    let mut redemption = get(conn, token)
        .await?
        .ok_or_else(|| LedgerError::not_found("redemption", token))?;

    let (owner, title) = match redemption.kind {
        RedemptionKind::Coupon { template_id } => {
            let template = catalog::require_template(conn, template_id).await?;
            (template.partner_id, template.title)
        }
        RedemptionKind::Promotion { promotion_id } => {
            let promotion = catalog::require_promotion(conn, promotion_id).await?;
            (promotion.partner_id, promotion.title)
        }
    };

    admit_consumption(&redemption, owner, partner_id)?;

    let query = Query::update()
        .table(Redemptions::Table)
        .value(Redemptions::Consumed, true)
        .value(Redemptions::ConsumedAt, rows::ts(now))
        .and_where(Expr::col(Redemptions::Token).eq(token.to_string()))
        .and_where(Expr::col(Redemptions::Consumed).eq(false))
        .to_string(SqliteQueryBuilder);

    let result = sqlx::query(&query).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        let consumed_at = get(conn, token)
            .await?
            .and_then(|r| r.consumed_at)
            .unwrap_or(now);
        return Err(BusinessRule::AlreadyConsumed { consumed_at }.into());
    }

    redemption.consumed = true;
    redemption.consumed_at = Some(now);

    let holder = accounts::require(conn, redemption.account_id).await?;
    Ok(ConsumptionReceipt {
        redemption,
        coupon_title: title,
        holder_contact: holder.contact().to_string(),
    })
}
