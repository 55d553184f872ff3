//! Redemption Engine: step-threshold promotions.
//!
//! Redeeming debits spendable steps and records a standing redemption.
//! There is no global stock and no consumption step; only the per-account
//! cap limits a promotion.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::log_storage;
use super::policy::{self, Caller};
use crate::interfaces::{LedgerError, LedgerStore, Result};
use crate::model::{Promotion, PromotionFilter, Redemption};

pub struct PromotionService {
    store: Arc<dyn LedgerStore>,
}

impl PromotionService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Spend the caller's available steps on a promotion.
    #[tracing::instrument(name = "promotion.redeem", skip_all, fields(promotion_id = %promotion_id))]
    pub async fn redeem(&self, caller: &Caller, promotion_id: Uuid) -> Result<Redemption> {
        let account_id = policy::authenticated(caller)?.account_id;

        let redemption = self
            .store
            .redeem_promotion(account_id, promotion_id, Utc::now())
            .await
            .map_err(log_storage("redeem_promotion"))?;

        info!(
            account_id = %account_id,
            promotion_id = %promotion_id,
            token = %redemption.token,
            "Promotion redeemed"
        );
        Ok(redemption)
    }

    /// Active promotions of every partner, newest first.
    pub async fn list_active(&self, caller: &Caller) -> Result<Vec<Promotion>> {
        policy::authenticated(caller)?;
        self.store
            .list_promotions(PromotionFilter::Active)
            .await
            .map_err(log_storage("list_promotions"))
    }

    /// One active promotion. Inactive ones are reported as missing.
    pub async fn get(&self, caller: &Caller, promotion_id: Uuid) -> Result<Promotion> {
        policy::authenticated(caller)?;
        self.store
            .get_promotion(promotion_id)
            .await
            .map_err(log_storage("get_promotion"))?
            .filter(|p| p.is_active)
            .ok_or_else(|| LedgerError::not_found("promotion", promotion_id))
    }
}
