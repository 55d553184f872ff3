//! LedgerStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::Result;
use crate::ledger::RewardPolicy;
use crate::model::{
    Account, ActivityInput, ActivityOutcome, ActivityRecord, ConsumptionReceipt, CouponTemplate,
    MarketplaceQuery, NewAccount, NewCouponTemplate, NewPartner, NewPromotion, Partner,
    PartnerStats, Promotion, PromotionFilter, PromotionUpdate, Redemption, RewardTransaction,
    TemplateUpdate,
};

/// Interface for ledger persistence.
///
/// Every method is one atomic unit: it either commits all of its writes or
/// none of them. Methods that move value (`submit_activity`,
/// `reconcile_reward`, `purchase_coupon`, `redeem_promotion`,
/// `consume_redemption`, `transfer_steps`, `adjust_coins`) re-read and lock
/// the rows they touch inside their transaction and evaluate the rules in
/// [`crate::ledger`] against that locked view, so concurrent callers can
/// never both pass a balance or stock check.
///
/// Implementations:
/// - `SqliteLedgerStore`: SQLite storage
/// - `MemoryLedgerStore`: In-memory storage for tests and local runs
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ---------------------------------------------------------------------
    // Accounts
    // ---------------------------------------------------------------------

    /// Create an account with zero balances. Email must be unique.
    async fn create_account(&self, account: NewAccount, now: DateTime<Utc>) -> Result<Account>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Apply a signed ADJUSTMENT to spendable coins.
    ///
    /// Fails with `InsufficientBalance` if the result would be negative.
    async fn adjust_coins(
        &self,
        account_id: Uuid,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Account, RewardTransaction)>;

    // ---------------------------------------------------------------------
    // Partners
    // ---------------------------------------------------------------------

    /// Attach a partner profile to an account. At most one per account.
    async fn create_partner(&self, partner: NewPartner, now: DateTime<Utc>) -> Result<Partner>;

    async fn get_partner(&self, id: Uuid) -> Result<Option<Partner>>;

    async fn partner_for_account(&self, account_id: Uuid) -> Result<Option<Partner>>;

    async fn list_partners(&self, active_only: bool) -> Result<Vec<Partner>>;

    async fn set_partner_active(&self, id: Uuid, active: bool) -> Result<Partner>;

    /// Dashboard aggregates over this partner's own templates only.
    async fn partner_stats(&self, partner_id: Uuid) -> Result<PartnerStats>;

    // ---------------------------------------------------------------------
    // Coupon templates
    // ---------------------------------------------------------------------

    async fn create_template(
        &self,
        partner_id: Uuid,
        template: NewCouponTemplate,
        now: DateTime<Utc>,
    ) -> Result<CouponTemplate>;

    async fn get_template(&self, id: Uuid) -> Result<Option<CouponTemplate>>;

    /// Apply an owner update under the template's row lock.
    async fn update_template(&self, id: Uuid, update: &TemplateUpdate) -> Result<CouponTemplate>;

    /// Templates of one partner, newest first.
    async fn list_partner_templates(&self, partner_id: Uuid) -> Result<Vec<CouponTemplate>>;

    /// Active templates of active partners, filtered and ordered.
    async fn marketplace(&self, query: &MarketplaceQuery) -> Result<Vec<CouponTemplate>>;

    // ---------------------------------------------------------------------
    // Promotions
    // ---------------------------------------------------------------------

    async fn create_promotion(
        &self,
        partner_id: Uuid,
        promotion: NewPromotion,
        now: DateTime<Utc>,
    ) -> Result<Promotion>;

    async fn get_promotion(&self, id: Uuid) -> Result<Option<Promotion>>;

    async fn update_promotion(&self, id: Uuid, update: &PromotionUpdate) -> Result<Promotion>;

    /// Promotions matching the filter, newest first.
    async fn list_promotions(&self, filter: PromotionFilter) -> Result<Vec<Promotion>>;

    // ---------------------------------------------------------------------
    // Activity and reward reconciliation
    // ---------------------------------------------------------------------

    /// Insert or update the (account, day) activity row and reconcile its
    /// daily reward, all in one transaction.
    async fn submit_activity(
        &self,
        account_id: Uuid,
        input: &ActivityInput,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome>;

    /// Re-run reconciliation for an existing activity row. Idempotent.
    async fn reconcile_reward(
        &self,
        account_id: Uuid,
        day: NaiveDate,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome>;

    /// Activity rows of one account, newest day first.
    async fn list_activities(&self, account_id: Uuid) -> Result<Vec<ActivityRecord>>;

    /// Ledger lines of one account, newest first.
    async fn list_transactions(&self, account_id: Uuid) -> Result<Vec<RewardTransaction>>;

    // ---------------------------------------------------------------------
    // Redemptions
    // ---------------------------------------------------------------------

    /// Debit coins, decrement stock, bump `purchased_count`, write the SPENT
    /// line and insert the redemption. All or nothing.
    async fn purchase_coupon(
        &self,
        account_id: Uuid,
        template_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption>;

    /// Debit available steps and insert a standing redemption.
    async fn redeem_promotion(
        &self,
        account_id: Uuid,
        promotion_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption>;

    /// Flip a coupon redemption to consumed. Irreversible.
    async fn consume_redemption(
        &self,
        token: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsumptionReceipt>;

    async fn get_redemption(&self, token: Uuid) -> Result<Option<Redemption>>;

    /// Redemptions of one account, unconsumed first, then newest first.
    async fn list_redemptions(&self, account_id: Uuid) -> Result<Vec<Redemption>>;

    // ---------------------------------------------------------------------
    // Step transfer
    // ---------------------------------------------------------------------

    /// Accounts whose activity on `day` has steps not yet transferred.
    async fn pending_transfers(&self, day: NaiveDate) -> Result<Vec<Uuid>>;

    /// Credit the untransferred steps of (account, day) to lifetime and
    /// available counters and mark them transferred. Returns steps credited;
    /// zero when there is nothing left.
    async fn transfer_steps(&self, account_id: Uuid, day: NaiveDate) -> Result<u64>;

    /// Last day a batch job fully processed.
    async fn get_watermark(&self, job: &str) -> Result<Option<NaiveDate>>;

    async fn put_watermark(&self, job: &str, day: NaiveDate, now: DateTime<Utc>) -> Result<()>;
}
