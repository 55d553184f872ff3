//! Coupon template and promotion queries.

use sea_query::{
    Asterisk, Cond, Expr, Func, LikeExpr, Order, Query, SelectStatement, SqliteQueryBuilder,
};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{accounts, rows};
use crate::interfaces::{LedgerError, Result};
use crate::model::{
    CouponTemplate, MarketplaceQuery, PartnerStats, Promotion, PromotionFilter, PromotionUpdate,
    TemplateOrdering, TemplateUpdate,
};
use crate::storage::schema::{CouponTemplates, Partners, Promotions};

const LIKE_ESCAPE: char = '!';

pub(super) async fn insert_template(
    conn: &mut SqliteConnection,
    template: &CouponTemplate,
) -> Result<()> {
    accounts::require_partner(conn, template.partner_id).await?;

    let query = Query::insert()
        .into_table(CouponTemplates::Table)
        .columns([
            CouponTemplates::Id,
            CouponTemplates::PartnerId,
            CouponTemplates::Category,
            CouponTemplates::Title,
            CouponTemplates::Description,
            CouponTemplates::CostCoins,
            CouponTemplates::ValidityDays,
            CouponTemplates::Quantity,
            CouponTemplates::PurchasedCount,
            CouponTemplates::IsActive,
            CouponTemplates::CreatedAt,
        ])
        .values_panic([
            template.id.to_string().into(),
            template.partner_id.to_string().into(),
            template.category.clone().into(),
            template.title.clone().into(),
            template.description.clone().into(),
            template.cost_coins.into(),
            template.validity_days.into(),
            template.quantity.into(),
            template.purchased_count.into(),
            template.is_active.into(),
            rows::ts(template.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn get_template(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<CouponTemplate>> {
    let query = Query::select()
        .column(Asterisk)
        .from(CouponTemplates::Table)
        .and_where(Expr::col(CouponTemplates::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::template).transpose()
}

pub(super) async fn require_template(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<CouponTemplate> {
    get_template(conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found("coupon_template", id))
}

/// Write every mutable column of a template back.
pub(super) async fn save_template(
    conn: &mut SqliteConnection,
    template: &CouponTemplate,
) -> Result<()> {
    let query = Query::update()
        .table(CouponTemplates::Table)
        .values([
            (CouponTemplates::Title, template.title.clone().into()),
            (
                CouponTemplates::Description,
                template.description.clone().into(),
            ),
            (CouponTemplates::CostCoins, template.cost_coins.into()),
            (CouponTemplates::Quantity, template.quantity.into()),
            (
                CouponTemplates::PurchasedCount,
                template.purchased_count.into(),
            ),
            (CouponTemplates::IsActive, template.is_active.into()),
        ])
        .and_where(Expr::col(CouponTemplates::Id).eq(template.id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn update_template(
    conn: &mut SqliteConnection,
    id: Uuid,
    update: &TemplateUpdate,
) -> Result<CouponTemplate> {
    let mut template = require_template(conn, id).await?;
    template.apply(update)?;
    save_template(conn, &template).await?;
    Ok(template)
}

pub(super) async fn list_partner_templates(
    conn: &mut SqliteConnection,
    partner_id: Uuid,
) -> Result<Vec<CouponTemplate>> {
    let query = Query::select()
        .column(Asterisk)
        .from(CouponTemplates::Table)
        .and_where(Expr::col(CouponTemplates::PartnerId).eq(partner_id.to_string()))
        .order_by(CouponTemplates::CreatedAt, Order::Desc)
        .to_string(SqliteQueryBuilder);

    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows::rows(&found, rows::template)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn marketplace_select(query: &MarketplaceQuery) -> SelectStatement {
    let mut cond = Cond::all()
        .add(Expr::col((CouponTemplates::Table, CouponTemplates::IsActive)).eq(true))
        .add(Expr::col((Partners::Table, Partners::IsActive)).eq(true));

    if let Some(term) = query.term() {
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let like = |column: sea_query::SimpleExpr| {
            Expr::expr(Func::lower(column)).like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
        };
        cond = cond.add(
            Cond::any()
                .add(like(Expr::col((CouponTemplates::Table, CouponTemplates::Title)).into()))
                .add(like(
                    Expr::col((CouponTemplates::Table, CouponTemplates::Description)).into(),
                ))
                .add(like(Expr::col((Partners::Table, Partners::Name)).into())),
        );
    }

    let mut select = Query::select();
    select
        .column((CouponTemplates::Table, Asterisk))
        .from(CouponTemplates::Table)
        .inner_join(
            Partners::Table,
            Expr::col((Partners::Table, Partners::Id))
                .equals((CouponTemplates::Table, CouponTemplates::PartnerId)),
        )
        .cond_where(cond);

    let created = (CouponTemplates::Table, CouponTemplates::CreatedAt);
    let cost = (CouponTemplates::Table, CouponTemplates::CostCoins);
    match query.ordering {
        TemplateOrdering::NewestFirst => {
            select.order_by(created, Order::Desc);
        }
        TemplateOrdering::OldestFirst => {
            select.order_by(created, Order::Asc);
        }
        TemplateOrdering::CheapestFirst => {
            select.order_by(cost, Order::Asc).order_by(created, Order::Desc);
        }
        TemplateOrdering::DearestFirst => {
            select.order_by(cost, Order::Desc).order_by(created, Order::Desc);
        }
    }
    select
}

pub(super) async fn marketplace(
    conn: &mut SqliteConnection,
    query: &MarketplaceQuery,
) -> Result<Vec<CouponTemplate>> {
    let sql = marketplace_select(query).to_string(SqliteQueryBuilder);
    let found = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows::rows(&found, rows::template)
}

pub(super) async fn partner_stats(
    conn: &mut SqliteConnection,
    partner_id: Uuid,
) -> Result<PartnerStats> {
    let partner = accounts::require_partner(conn, partner_id).await?;
    let templates = list_partner_templates(conn, partner_id).await?;

    let mut stats = PartnerStats {
        partner_name: partner.name,
        ..PartnerStats::default()
    };
    for template in &templates {
        if template.is_active {
            stats.total_active_templates += 1;
        }
        stats.total_sold += template.purchased_count.max(0) as u64;
        stats.revenue += template.purchased_count * template.cost_coins;
    }
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Promotions
// ---------------------------------------------------------------------------

pub(super) async fn insert_promotion(
    conn: &mut SqliteConnection,
    promotion: &Promotion,
) -> Result<()> {
    accounts::require_partner(conn, promotion.partner_id).await?;

    let query = Query::insert()
        .into_table(Promotions::Table)
        .columns([
            Promotions::Id,
            Promotions::PartnerId,
            Promotions::Title,
            Promotions::Description,
            Promotions::RequiredSteps,
            Promotions::MaxRedemptionsPerUser,
            Promotions::IsActive,
            Promotions::CreatedAt,
        ])
        .values_panic([
            promotion.id.to_string().into(),
            promotion.partner_id.to_string().into(),
            promotion.title.clone().into(),
            promotion.description.clone().into(),
            promotion.required_steps.into(),
            promotion.max_redemptions_per_user.into(),
            promotion.is_active.into(),
            rows::ts(promotion.created_at).into(),
        ])
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn get_promotion(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Promotion>> {
    let query = Query::select()
        .column(Asterisk)
        .from(Promotions::Table)
        .and_where(Expr::col(Promotions::Id).eq(id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(rows::promotion).transpose()
}

pub(super) async fn require_promotion(conn: &mut SqliteConnection, id: Uuid) -> Result<Promotion> {
    get_promotion(conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found("promotion", id))
}

pub(super) async fn save_promotion(
    conn: &mut SqliteConnection,
    promotion: &Promotion,
) -> Result<()> {
    let query = Query::update()
        .table(Promotions::Table)
        .values([
            (Promotions::Title, promotion.title.clone().into()),
            (Promotions::Description, promotion.description.clone().into()),
            (Promotions::RequiredSteps, promotion.required_steps.into()),
            (
                Promotions::MaxRedemptionsPerUser,
                promotion.max_redemptions_per_user.into(),
            ),
            (Promotions::IsActive, promotion.is_active.into()),
        ])
        .and_where(Expr::col(Promotions::Id).eq(promotion.id.to_string()))
        .to_string(SqliteQueryBuilder);

    sqlx::query(&query).execute(&mut *conn).await?;
    Ok(())
}

pub(super) async fn update_promotion(
    conn: &mut SqliteConnection,
    id: Uuid,
    update: &PromotionUpdate,
) -> Result<Promotion> {
    let mut promotion = require_promotion(conn, id).await?;
    promotion.apply(update);
    save_promotion(conn, &promotion).await?;
    Ok(promotion)
}

fn list_promotions_sql(filter: PromotionFilter) -> String {
    let mut select = Query::select();
    select
        .column(Asterisk)
        .from(Promotions::Table)
        .order_by(Promotions::CreatedAt, Order::Desc);
    match filter {
        PromotionFilter::Active => {
            select.and_where(Expr::col(Promotions::IsActive).eq(true));
        }
        PromotionFilter::Partner(partner_id) => {
            select.and_where(Expr::col(Promotions::PartnerId).eq(partner_id.to_string()));
        }
    }
    select.to_string(SqliteQueryBuilder)
}

pub(super) async fn list_promotions(
    conn: &mut SqliteConnection,
    filter: PromotionFilter,
) -> Result<Vec<Promotion>> {
    let query = list_promotions_sql(filter);
    let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows::rows(&found, rows::promotion)
}
