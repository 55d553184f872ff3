//! SQLite implementation of the ledger store.
//!
//! Every mutating method runs in one `BEGIN IMMEDIATE` transaction. SQLite
//! then holds the database write lock from the first read, so the rows a
//! method reads cannot change before it commits and two writers can never
//! both pass the same balance or stock check.

mod accounts;
mod activity;
mod catalog;
mod redemption;
mod rows;
mod transfer;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::interfaces::{LedgerStore, Result, StorageError};
use crate::ledger::RewardPolicy;
use crate::model::{
    Account, ActivityInput, ActivityOutcome, ActivityRecord, ConsumptionReceipt, CouponTemplate,
    MarketplaceQuery, NewAccount, NewCouponTemplate, NewPartner, NewPromotion, Partner,
    PartnerStats, Promotion, PromotionFilter, PromotionUpdate, Redemption, RewardTransaction,
    TemplateUpdate,
};
use crate::storage::schema::CREATE_LEDGER_TABLES;

/// An open write transaction on one pooled connection.
///
/// Dropping it unfinished (a cancelled request) detaches and closes the
/// connection, which makes SQLite roll the transaction back. The connection
/// never returns to the pool with a transaction still open.
struct WriteTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTx {
    async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        // BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
        // when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| StorageError::Corrupt("transaction already finished".to_string()).into())
    }

    async fn commit(mut self) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            warn!(error = %e, "Commit failed, discarding connection");
            drop(conn.detach());
            return Err(e.into());
        }
        Ok(())
    }

    async fn rollback(mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %e, "Rollback failed, discarding connection");
                drop(conn.detach());
            }
        }
    }

    /// Commit on success, roll back on any error.
    async fn finish<T>(self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

/// SQLite implementation of LedgerStore.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a store over an existing pool. Call [`init`](Self::init) before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database described by `config` and
    /// create the schema.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

        let pool = if config.is_in_memory_sqlite() {
            // Each in-memory connection is its own database: keep exactly one alive.
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?
                .foreign_keys(true)
                .busy_timeout(busy_timeout);
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!("{}: {e}", parent.display()))
                })?;
            }
            let options = SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .busy_timeout(busy_timeout);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .connect_with(options)
                .await?
        };

        let store = Self::new(pool);
        store.init().await?;
        info!(path = %config.path, "SQLite ledger store ready");
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_LEDGER_TABLES).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn read(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn create_account(&self, account: NewAccount, now: DateTime<Utc>) -> Result<Account> {
        let account = Account::open(account, now);
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = accounts::insert(tx.conn()?, &account).await;
        tx.finish(result).await?;
        Ok(account)
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        accounts::get(&mut *self.read().await?, id).await
    }

    async fn adjust_coins(
        &self,
        account_id: Uuid,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Account, RewardTransaction)> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = accounts::adjust(tx.conn()?, account_id, amount, reason, now).await;
        tx.finish(result).await
    }

    async fn create_partner(&self, partner: NewPartner, now: DateTime<Utc>) -> Result<Partner> {
        let partner = Partner::open(partner, now);
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = accounts::insert_partner(tx.conn()?, &partner).await;
        tx.finish(result).await?;
        Ok(partner)
    }

    async fn get_partner(&self, id: Uuid) -> Result<Option<Partner>> {
        accounts::get_partner(&mut *self.read().await?, id).await
    }

    async fn partner_for_account(&self, account_id: Uuid) -> Result<Option<Partner>> {
        accounts::partner_for_account(&mut *self.read().await?, account_id).await
    }

    async fn list_partners(&self, active_only: bool) -> Result<Vec<Partner>> {
        accounts::list_partners(&mut *self.read().await?, active_only).await
    }

    async fn set_partner_active(&self, id: Uuid, active: bool) -> Result<Partner> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = accounts::set_partner_active(tx.conn()?, id, active).await;
        tx.finish(result).await
    }

    async fn partner_stats(&self, partner_id: Uuid) -> Result<PartnerStats> {
        catalog::partner_stats(&mut *self.read().await?, partner_id).await
    }

    async fn create_template(
        &self,
        partner_id: Uuid,
        template: NewCouponTemplate,
        now: DateTime<Utc>,
    ) -> Result<CouponTemplate> {
        let template = CouponTemplate::open(partner_id, template, now);
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = catalog::insert_template(tx.conn()?, &template).await;
        tx.finish(result).await?;
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<CouponTemplate>> {
        catalog::get_template(&mut *self.read().await?, id).await
    }

    async fn update_template(&self, id: Uuid, update: &TemplateUpdate) -> Result<CouponTemplate> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = catalog::update_template(tx.conn()?, id, update).await;
        tx.finish(result).await
    }

    async fn list_partner_templates(&self, partner_id: Uuid) -> Result<Vec<CouponTemplate>> {
        catalog::list_partner_templates(&mut *self.read().await?, partner_id).await
    }

    async fn marketplace(&self, query: &MarketplaceQuery) -> Result<Vec<CouponTemplate>> {
        catalog::marketplace(&mut *self.read().await?, query).await
    }

    async fn create_promotion(
        &self,
        partner_id: Uuid,
        promotion: NewPromotion,
        now: DateTime<Utc>,
    ) -> Result<Promotion> {
        let promotion = Promotion::open(partner_id, promotion, now);
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = catalog::insert_promotion(tx.conn()?, &promotion).await;
        tx.finish(result).await?;
        Ok(promotion)
    }

    async fn get_promotion(&self, id: Uuid) -> Result<Option<Promotion>> {
        catalog::get_promotion(&mut *self.read().await?, id).await
    }

    async fn update_promotion(&self, id: Uuid, update: &PromotionUpdate) -> Result<Promotion> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = catalog::update_promotion(tx.conn()?, id, update).await;
        tx.finish(result).await
    }

    async fn list_promotions(&self, filter: PromotionFilter) -> Result<Vec<Promotion>> {
        catalog::list_promotions(&mut *self.read().await?, filter).await
    }

    async fn submit_activity(
        &self,
        account_id: Uuid,
        input: &ActivityInput,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = activity::submit(tx.conn()?, account_id, input, policy, now).await;
        tx.finish(result).await
    }

    async fn reconcile_reward(
        &self,
        account_id: Uuid,
        day: NaiveDate,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = activity::reconcile(tx.conn()?, account_id, day, policy, now).await;
        tx.finish(result).await
    }

    async fn list_activities(&self, account_id: Uuid) -> Result<Vec<ActivityRecord>> {
        activity::list(&mut *self.read().await?, account_id).await
    }

    async fn list_transactions(&self, account_id: Uuid) -> Result<Vec<RewardTransaction>> {
        accounts::list_lines(&mut *self.read().await?, account_id).await
    }

    async fn purchase_coupon(
        &self,
        account_id: Uuid,
        template_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = redemption::purchase(tx.conn()?, account_id, template_id, now).await;
        tx.finish(result).await
    }

    async fn redeem_promotion(
        &self,
        account_id: Uuid,
        promotion_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = redemption::redeem_promotion(tx.conn()?, account_id, promotion_id, now).await;
        tx.finish(result).await
    }

    async fn consume_redemption(
        &self,
        token: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsumptionReceipt> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = redemption::consume(tx.conn()?, token, partner_id, now).await;
        tx.finish(result).await
    }

    async fn get_redemption(&self, token: Uuid) -> Result<Option<Redemption>> {
        redemption::get(&mut *self.read().await?, token).await
    }

    async fn list_redemptions(&self, account_id: Uuid) -> Result<Vec<Redemption>> {
        redemption::list(&mut *self.read().await?, account_id).await
    }

    async fn pending_transfers(&self, day: NaiveDate) -> Result<Vec<Uuid>> {
        activity::pending_accounts(&mut *self.read().await?, day).await
    }

    async fn transfer_steps(&self, account_id: Uuid, day: NaiveDate) -> Result<u64> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = transfer::transfer(tx.conn()?, account_id, day).await;
        tx.finish(result).await
    }

    async fn get_watermark(&self, job: &str) -> Result<Option<NaiveDate>> {
        transfer::get_watermark(&mut *self.read().await?, job).await
    }

    async fn put_watermark(&self, job: &str, day: NaiveDate, now: DateTime<Utc>) -> Result<()> {
        let mut tx = WriteTx::begin(&self.pool).await?;
        let result = transfer::put_watermark(tx.conn()?, job, day, now).await;
        tx.finish(result).await
    }
}
