//! Partner catalog management, marketplace browsing and admin partner tools.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::log_storage;
use super::policy::{self, Caller};
use crate::interfaces::{LedgerError, LedgerStore, Result};
use crate::model::{
    CouponTemplate, MarketplaceQuery, NewCouponTemplate, NewPartner, NewPromotion, Partner,
    PartnerStats, Promotion, PromotionFilter, PromotionUpdate, TemplateUpdate,
};

pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    async fn template(&self, id: Uuid) -> Result<CouponTemplate> {
        self.store
            .get_template(id)
            .await
            .map_err(log_storage("get_template"))?
            .ok_or_else(|| LedgerError::not_found("coupon_template", id))
    }

    async fn promotion(&self, id: Uuid) -> Result<Promotion> {
        self.store
            .get_promotion(id)
            .await
            .map_err(log_storage("get_promotion"))?
            .ok_or_else(|| LedgerError::not_found("promotion", id))
    }

    // -----------------------------------------------------------------------
    // Coupon templates
    // -----------------------------------------------------------------------

    #[tracing::instrument(name = "catalog.create_template", skip_all)]
    pub async fn create_template(
        &self,
        caller: &Caller,
        template: NewCouponTemplate,
    ) -> Result<CouponTemplate> {
        let partner_id = policy::partner(caller)?;
        template.validate()?;

        let template = self
            .store
            .create_template(partner_id, template, Utc::now())
            .await
            .map_err(log_storage("create_template"))?;
        info!(partner_id = %partner_id, template_id = %template.id, "Coupon template created");
        Ok(template)
    }

    /// Update one of the caller's own templates.
    #[tracing::instrument(name = "catalog.update_template", skip_all, fields(template_id = %id))]
    pub async fn update_template(
        &self,
        caller: &Caller,
        id: Uuid,
        update: TemplateUpdate,
    ) -> Result<CouponTemplate> {
        let partner_id = policy::partner(caller)?;
        update.validate()?;
        let existing = self.template(id).await?;
        policy::owner_of(caller, existing.partner_id)?;

        let template = self
            .store
            .update_template(id, &update)
            .await
            .map_err(log_storage("update_template"))?;
        info!(partner_id = %partner_id, template_id = %id, "Coupon template updated");
        Ok(template)
    }

    /// The caller's own templates, newest first.
    pub async fn own_templates(&self, caller: &Caller) -> Result<Vec<CouponTemplate>> {
        let partner_id = policy::partner(caller)?;
        self.store
            .list_partner_templates(partner_id)
            .await
            .map_err(log_storage("list_partner_templates"))
    }

    /// Active templates of active partners. Any authenticated caller.
    pub async fn marketplace(
        &self,
        caller: &Caller,
        query: &MarketplaceQuery,
    ) -> Result<Vec<CouponTemplate>> {
        policy::authenticated(caller)?;
        self.store
            .marketplace(query)
            .await
            .map_err(log_storage("marketplace"))
    }

    /// Dashboard figures over the caller's own templates.
    pub async fn dashboard(&self, caller: &Caller) -> Result<PartnerStats> {
        let partner_id = policy::partner(caller)?;
        self.store
            .partner_stats(partner_id)
            .await
            .map_err(log_storage("partner_stats"))
    }

    // -----------------------------------------------------------------------
    // Promotions
    // -----------------------------------------------------------------------

    #[tracing::instrument(name = "catalog.create_promotion", skip_all)]
    pub async fn create_promotion(
        &self,
        caller: &Caller,
        promotion: NewPromotion,
    ) -> Result<Promotion> {
        let partner_id = policy::partner(caller)?;
        promotion.validate()?;

        let promotion = self
            .store
            .create_promotion(partner_id, promotion, Utc::now())
            .await
            .map_err(log_storage("create_promotion"))?;
        info!(partner_id = %partner_id, promotion_id = %promotion.id, "Promotion created");
        Ok(promotion)
    }

    #[tracing::instrument(name = "catalog.update_promotion", skip_all, fields(promotion_id = %id))]
    pub async fn update_promotion(
        &self,
        caller: &Caller,
        id: Uuid,
        update: PromotionUpdate,
    ) -> Result<Promotion> {
        policy::partner(caller)?;
        update.validate()?;
        let existing = self.promotion(id).await?;
        policy::owner_of(caller, existing.partner_id)?;

        self.store
            .update_promotion(id, &update)
            .await
            .map_err(log_storage("update_promotion"))
    }

    /// The caller's own promotions, active or not.
    pub async fn own_promotions(&self, caller: &Caller) -> Result<Vec<Promotion>> {
        let partner_id = policy::partner(caller)?;
        self.store
            .list_promotions(PromotionFilter::Partner(partner_id))
            .await
            .map_err(log_storage("list_promotions"))
    }

    // -----------------------------------------------------------------------
    // Partners
    // -----------------------------------------------------------------------

    /// Admin-only: attach a partner profile to an account.
    #[tracing::instrument(name = "catalog.create_partner", skip_all)]
    pub async fn create_partner(&self, caller: &Caller, partner: NewPartner) -> Result<Partner> {
        policy::admin(caller)?;
        if partner.name.trim().is_empty() {
            return Err(LedgerError::Validation("partner name is required".to_string()));
        }

        let partner = self
            .store
            .create_partner(partner, Utc::now())
            .await
            .map_err(log_storage("create_partner"))?;
        info!(partner_id = %partner.id, account_id = %partner.account_id, "Partner created");
        Ok(partner)
    }

    /// Admin-only: activate or deactivate a partner.
    pub async fn set_partner_active(
        &self,
        caller: &Caller,
        partner_id: Uuid,
        active: bool,
    ) -> Result<Partner> {
        policy::admin(caller)?;
        let partner = self
            .store
            .set_partner_active(partner_id, active)
            .await
            .map_err(log_storage("set_partner_active"))?;
        info!(partner_id = %partner_id, active, "Partner status changed");
        Ok(partner)
    }

    /// Admin-only: every partner.
    pub async fn all_partners(&self, caller: &Caller) -> Result<Vec<Partner>> {
        policy::admin(caller)?;
        self.store
            .list_partners(false)
            .await
            .map_err(log_storage("list_partners"))
    }

    /// Active partners. Any authenticated caller.
    pub async fn active_partners(&self, caller: &Caller) -> Result<Vec<Partner>> {
        policy::authenticated(caller)?;
        self.store
            .list_partners(true)
            .await
            .map_err(log_storage("list_partners"))
    }
}
