//! Redemption Engine: coin-priced coupons.
//!
//! Purchase is one atomic debit, stock decrement, ledger line and
//! redemption insert. It is never retried here since a second call buys a
//! second unit. Consumption is one-shot and safe to retry.

use std::sync::Arc;

use backon::Retryable;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::policy::{self, Caller};
use super::{log_retry, log_storage};
use crate::interfaces::{LedgerError, LedgerStore, Result};
use crate::model::{ConsumptionReceipt, Redemption};
use crate::utils::retry::{is_retryable, storage_backoff};

/// A freshly bought coupon and the content of its scannable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedCoupon {
    pub redemption: Redemption,
    pub scan_payload: String,
}

pub struct RedemptionService {
    store: Arc<dyn LedgerStore>,
    base_url: String,
}

impl RedemptionService {
    pub fn new(store: Arc<dyn LedgerStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
        }
    }

    /// Buy one unit of a coupon template with the caller's coins.
    #[tracing::instrument(name = "redemption.purchase", skip_all, fields(template_id = %template_id))]
    pub async fn purchase(&self, caller: &Caller, template_id: Uuid) -> Result<IssuedCoupon> {
        let account_id = policy::authenticated(caller)?.account_id;

        let redemption = self
            .store
            .purchase_coupon(account_id, template_id, Utc::now())
            .await
            .map_err(log_storage("purchase_coupon"))?;

        // Rendered after commit; the ledger change stands either way.
        let scan_payload = redemption
            .scan_payload(&self.base_url)
            .unwrap_or_else(|| {
                warn!(token = %redemption.token, "Purchased redemption has no scan payload");
                String::new()
            });

        info!(
            account_id = %account_id,
            template_id = %template_id,
            token = %redemption.token,
            "Coupon purchased"
        );
        Ok(IssuedCoupon {
            redemption,
            scan_payload,
        })
    }

    /// Mark a scanned coupon as used. Only the issuing partner may do this.
    #[tracing::instrument(name = "redemption.consume", skip_all, fields(token = %token))]
    pub async fn consume(&self, caller: &Caller, token: Uuid) -> Result<ConsumptionReceipt> {
        let partner_id = policy::partner(caller)?;

        let store = &self.store;
        let receipt = (|| async move {
            store
                .consume_redemption(token, partner_id, Utc::now())
                .await
        })
        .retry(storage_backoff())
        .when(is_retryable)
        .notify(log_retry("consume_redemption"))
        .await
        .map_err(log_storage("consume_redemption"))?;

        info!(
            partner_id = %partner_id,
            token = %token,
            holder = %receipt.holder_contact,
            "Coupon consumed"
        );
        Ok(receipt)
    }

    /// The caller's redemptions, unconsumed first then newest first.
    pub async fn list_own(&self, caller: &Caller) -> Result<Vec<Redemption>> {
        let account_id = policy::authenticated(caller)?.account_id;
        self.store
            .list_redemptions(account_id)
            .await
            .map_err(log_storage("list_redemptions"))
    }

    /// Scan payload for one of the caller's own coupons.
    pub async fn scan_payload(&self, caller: &Caller, token: Uuid) -> Result<String> {
        let account_id = policy::authenticated(caller)?.account_id;
        let redemption = self
            .store
            .get_redemption(token)
            .await
            .map_err(log_storage("get_redemption"))?
            .filter(|r| r.account_id == account_id)
            .ok_or_else(|| LedgerError::not_found("redemption", token))?;

        redemption.scan_payload(&self.base_url).ok_or_else(|| {
            LedgerError::Validation(
                "promotion redemptions have no scan code".to_string(),
            )
        })
    }
}
