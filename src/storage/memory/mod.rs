//! In-memory ledger store.
//!
//! All tables sit behind one async mutex. A write clones the tables into a
//! draft, runs the operation against the draft and swaps it in only if the
//! operation succeeds, so a failed operation leaves nothing behind. The
//! same [`crate::ledger`] rules as the SQLite backend decide every write.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::interfaces::{LedgerError, LedgerStore, Result, StorageError};
use crate::ledger::{
    admit_adjustment, admit_consumption, admit_promotion, admit_purchase, plan_reward,
    RewardAction, RewardPolicy,
};
use crate::model::{
    daily_reward_reason, sort_for_listing, Account, ActivityInput, ActivityOutcome,
    ActivityRecord, ConsumptionReceipt, CouponTemplate, MarketplaceQuery, NewAccount,
    NewCouponTemplate, NewPartner, NewPromotion, Partner, PartnerStats, Promotion,
    PromotionFilter, PromotionUpdate, Redemption, RedemptionKind, RewardTransaction,
    TemplateOrdering, TemplateUpdate, TransactionKind,
};


#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    partners: HashMap<Uuid, Partner>,
    templates: HashMap<Uuid, CouponTemplate>,
    promotions: HashMap<Uuid, Promotion>,
    activities: BTreeMap<(Uuid, NaiveDate), ActivityRecord>,
    /// Insertion order.
    transactions: Vec<RewardTransaction>,
    redemptions: HashMap<Uuid, Redemption>,
    watermarks: HashMap<String, NaiveDate>,
}

impl Tables {
    fn account(&self, id: Uuid) -> Result<&Account> {
        self.accounts
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn account_mut(&mut self, id: Uuid) -> Result<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn partner(&self, id: Uuid) -> Result<&Partner> {
        self.partners
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("partner", id))
    }

    fn template(&self, id: Uuid) -> Result<&CouponTemplate> {
        self.templates
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("coupon_template", id))
    }

    fn promotion(&self, id: Uuid) -> Result<&Promotion> {
        self.promotions
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("promotion", id))
    }

    fn earned_line(&self, account_id: Uuid, day: NaiveDate) -> Option<&RewardTransaction> {
        self.transactions.iter().find(|t| {
            t.account_id == account_id
                && t.kind == TransactionKind::Earned
                && t.reward_day == Some(day)
        })
    }

    fn reconcile(
        &mut self,
        account_id: Uuid,
        day: NaiveDate,
        created: bool,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome> {
        let record = self
            .activities
            .get(&(account_id, day))
            .cloned()
            .ok_or_else(|| LedgerError::not_found("activity", format!("{account_id}/{day}")))?;
        let coins_before = self.account(account_id)?.coins;
        let plan = plan_reward(policy, self.earned_line(account_id, day), record.steps);

        if plan.is_noop() {
            return Ok(ActivityOutcome {
                record,
                created,
                reward: plan.change,
                coins: coins_before,
            });
        }

        let coins = plan.settle(coins_before)?;
        match plan.action {
            RewardAction::Keep => {}
            RewardAction::Insert { amount } => self.transactions.push(
                RewardTransaction::daily_reward(account_id, day, amount, now),
            ),
            RewardAction::Update { id, amount } => {
                if let Some(line) = self.transactions.iter_mut().find(|t| t.id == id) {
                    line.amount = amount;
                    line.reason = daily_reward_reason(day);
                }
            }
            RewardAction::Delete { id } => self.transactions.retain(|t| t.id != id),
        }
        self.account_mut(account_id)?.coins = coins;

        Ok(ActivityOutcome {
            record,
            created,
            reward: plan.change,
            coins,
        })
    }
}

/// In-memory implementation of LedgerStore.
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
    fail_on_commit: RwLock<bool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail at commit time, after its changes were staged.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        *self.fail_on_commit.write().await = fail;
    }

    async fn write<T>(&self, op: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.lock().await;
        let mut draft = tables.clone();
        let value = op(&mut draft)?;
        if *self.fail_on_commit.read().await {
            return Err(StorageError::Unavailable("commit refused".to_string()).into());
        }
        *tables = draft;
        Ok(value)
    }

    async fn read<T>(&self, op: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        let tables = self.tables.lock().await;
        op(&tables)
    }
}

fn matches_term(template: &CouponTemplate, partner: &Partner, term: &str) -> bool {
    [&template.title, &template.description, &partner.name]
        .iter()
        .any(|field| field.to_lowercase().contains(term))
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_account(&self, account: NewAccount, now: DateTime<Utc>) -> Result<Account> {
        self.write(|t| {
            if account.email.is_some() && t.accounts.values().any(|a| a.email == account.email) {
                return Err(StorageError::Conflict("accounts.email".to_string()).into());
            }
            if account.phone_number.is_some()
                && t.accounts
                    .values()
                    .any(|a| a.phone_number == account.phone_number)
            {
                return Err(StorageError::Conflict("accounts.phone_number".to_string()).into());
            }
            let account = Account::open(account, now);
            t.accounts.insert(account.id, account.clone());
            Ok(account)
        })
        .await
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        self.read(|t| Ok(t.accounts.get(&id).cloned())).await
    }

    async fn adjust_coins(
        &self,
        account_id: Uuid,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(Account, RewardTransaction)> {
        self.write(|t| {
            let coins = admit_adjustment(t.account(account_id)?, amount)?;
            let line = RewardTransaction::adjustment(account_id, amount, reason.to_string(), now);
            t.transactions.push(line.clone());
            let account = t.account_mut(account_id)?;
            account.coins = coins;
            Ok((account.clone(), line))
        })
        .await
    }

    async fn create_partner(&self, partner: NewPartner, now: DateTime<Utc>) -> Result<Partner> {
        self.write(|t| {
            t.account(partner.account_id)?;
            if t.partners.values().any(|p| p.account_id == partner.account_id) {
                return Err(StorageError::Conflict("partners.account_id".to_string()).into());
            }
            let partner = Partner::open(partner, now);
            t.partners.insert(partner.id, partner.clone());
            Ok(partner)
        })
        .await
    }

    async fn get_partner(&self, id: Uuid) -> Result<Option<Partner>> {
        self.read(|t| Ok(t.partners.get(&id).cloned())).await
    }

    async fn partner_for_account(&self, account_id: Uuid) -> Result<Option<Partner>> {
        self.read(|t| {
            Ok(t.partners
                .values()
                .find(|p| p.account_id == account_id)
                .cloned())
        })
        .await
    }

    async fn list_partners(&self, active_only: bool) -> Result<Vec<Partner>> {
        self.read(|t| {
            let mut partners: Vec<Partner> = t
                .partners
                .values()
                .filter(|p| !active_only || p.is_active)
                .cloned()
                .collect();
            partners.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(partners)
        })
        .await
    }

    async fn set_partner_active(&self, id: Uuid, active: bool) -> Result<Partner> {
        self.write(|t| {
            let partner = t
                .partners
                .get_mut(&id)
                .ok_or_else(|| LedgerError::not_found("partner", id))?;
            partner.is_active = active;
            Ok(partner.clone())
        })
        .await
    }

    async fn partner_stats(&self, partner_id: Uuid) -> Result<PartnerStats> {
        self.read(|t| {
            let partner = t.partner(partner_id)?;
            let mut stats = PartnerStats {
                partner_name: partner.name.clone(),
                ..PartnerStats::default()
            };
            for template in t.templates.values().filter(|c| c.partner_id == partner_id) {
                if template.is_active {
                    stats.total_active_templates += 1;
                }
                stats.total_sold += template.purchased_count.max(0) as u64;
                stats.revenue += template.purchased_count * template.cost_coins;
            }
            Ok(stats)
        })
        .await
    }

    async fn create_template(
        &self,
        partner_id: Uuid,
        template: NewCouponTemplate,
        now: DateTime<Utc>,
    ) -> Result<CouponTemplate> {
        self.write(|t| {
            t.partner(partner_id)?;
            let template = CouponTemplate::open(partner_id, template, now);
            t.templates.insert(template.id, template.clone());
            Ok(template)
        })
        .await
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<CouponTemplate>> {
        self.read(|t| Ok(t.templates.get(&id).cloned())).await
    }

    async fn update_template(&self, id: Uuid, update: &TemplateUpdate) -> Result<CouponTemplate> {
        self.write(|t| {
            let template = t
                .templates
                .get_mut(&id)
                .ok_or_else(|| LedgerError::not_found("coupon_template", id))?;
            template.apply(update)?;
            Ok(template.clone())
        })
        .await
    }

    async fn list_partner_templates(&self, partner_id: Uuid) -> Result<Vec<CouponTemplate>> {
        self.read(|t| {
            let mut templates: Vec<CouponTemplate> = t
                .templates
                .values()
                .filter(|c| c.partner_id == partner_id)
                .cloned()
                .collect();
            templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(templates)
        })
        .await
    }

    async fn marketplace(&self, query: &MarketplaceQuery) -> Result<Vec<CouponTemplate>> {
        let term = query.term().map(str::to_lowercase);
        self.read(|t| {
            let mut templates: Vec<CouponTemplate> = t
                .templates
                .values()
                .filter(|c| c.is_active)
                .filter(|c| match t.partners.get(&c.partner_id) {
                    Some(p) if p.is_active => term
                        .as_deref()
                        .map_or(true, |term| matches_term(c, p, term)),
                    _ => false,
                })
                .cloned()
                .collect();

            match query.ordering {
                TemplateOrdering::NewestFirst => {
                    templates.sort_by(|a, b| b.created_at.cmp(&a.created_at))
                }
                TemplateOrdering::OldestFirst => {
                    templates.sort_by(|a, b| a.created_at.cmp(&b.created_at))
                }
                TemplateOrdering::CheapestFirst => templates.sort_by(|a, b| {
                    a.cost_coins
                        .cmp(&b.cost_coins)
                        .then_with(|| b.created_at.cmp(&a.created_at))
                }),
                TemplateOrdering::DearestFirst => templates.sort_by(|a, b| {
                    b.cost_coins
                        .cmp(&a.cost_coins)
                        .then_with(|| b.created_at.cmp(&a.created_at))
                }),
            }
            Ok(templates)
        })
        .await
    }

    async fn create_promotion(
        &self,
        partner_id: Uuid,
        promotion: NewPromotion,
        now: DateTime<Utc>,
    ) -> Result<Promotion> {
        self.write(|t| {
            t.partner(partner_id)?;
            let promotion = Promotion::open(partner_id, promotion, now);
            t.promotions.insert(promotion.id, promotion.clone());
            Ok(promotion)
        })
        .await
    }

    async fn get_promotion(&self, id: Uuid) -> Result<Option<Promotion>> {
        self.read(|t| Ok(t.promotions.get(&id).cloned())).await
    }

    async fn update_promotion(&self, id: Uuid, update: &PromotionUpdate) -> Result<Promotion> {
        self.write(|t| {
            let promotion = t
                .promotions
                .get_mut(&id)
                .ok_or_else(|| LedgerError::not_found("promotion", id))?;
            promotion.apply(update);
            Ok(promotion.clone())
        })
        .await
    }

    async fn list_promotions(&self, filter: PromotionFilter) -> Result<Vec<Promotion>> {
        self.read(|t| {
            let mut promotions: Vec<Promotion> = t
                .promotions
                .values()
                .filter(|p| match filter {
                    PromotionFilter::Active => p.is_active,
                    PromotionFilter::Partner(partner_id) => p.partner_id == partner_id,
                })
                .cloned()
                .collect();
            promotions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(promotions)
        })
        .await
    }

    async fn submit_activity(
        &self,
        account_id: Uuid,
        input: &ActivityInput,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome> {
        self.write(|t| {
            t.account(account_id)?;
            let key = (account_id, input.day);
            let created = match t.activities.get_mut(&key) {
                Some(record) => {
                    record.apply(input, now);
                    false
                }
                None => {
                    t.activities
                        .insert(key, ActivityRecord::from_input(account_id, input, now));
                    true
                }
            };
            t.reconcile(account_id, input.day, created, policy, now)
        })
        .await
    }

    async fn reconcile_reward(
        &self,
        account_id: Uuid,
        day: NaiveDate,
        policy: &RewardPolicy,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome> {
        self.write(|t| {
            t.account(account_id)?;
            t.reconcile(account_id, day, false, policy, now)
        })
        .await
    }

    async fn list_activities(&self, account_id: Uuid) -> Result<Vec<ActivityRecord>> {
        self.read(|t| {
            Ok(t.activities
                .values()
                .rev()
                .filter(|r| r.account_id == account_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn list_transactions(&self, account_id: Uuid) -> Result<Vec<RewardTransaction>> {
        self.read(|t| {
            let mut lines: Vec<RewardTransaction> = t
                .transactions
                .iter()
                .rev()
                .filter(|l| l.account_id == account_id)
                .cloned()
                .collect();
            lines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(lines)
        })
        .await
    }

    async fn purchase_coupon(
        &self,
        account_id: Uuid,
        template_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        self.write(|t| {
            let template = t.template(template_id)?;
            let effect = admit_purchase(
                t.account(account_id)?,
                template,
                t.partner(template.partner_id)?,
            )?;
            let cost = template.cost_coins;
            let reason = format!("Coupon purchase: {}", template.title);

            t.account_mut(account_id)?.coins = effect.coins_after;
            if let Some(template) = t.templates.get_mut(&template_id) {
                template.quantity = effect.quantity_after;
                template.purchased_count = effect.purchased_count_after;
            }
            if cost > 0 {
                t.transactions
                    .push(RewardTransaction::spent(account_id, cost, reason, now));
            }

            let redemption =
                Redemption::issue(account_id, RedemptionKind::Coupon { template_id }, now);
            t.redemptions.insert(redemption.token, redemption.clone());
            Ok(redemption)
        })
        .await
    }

    async fn redeem_promotion(
        &self,
        account_id: Uuid,
        promotion_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        self.write(|t| {
            let prior = t
                .redemptions
                .values()
                .filter(|r| r.account_id == account_id && r.promotion_id() == Some(promotion_id))
                .count();
            let prior = u32::try_from(prior)
                .map_err(|_| StorageError::Corrupt(format!("redemption count {prior}")))?;
            let steps_after =
                admit_promotion(t.account(account_id)?, t.promotion(promotion_id)?, prior)?;

            t.account_mut(account_id)?.available_steps = steps_after;
            let redemption =
                Redemption::issue(account_id, RedemptionKind::Promotion { promotion_id }, now);
            t.redemptions.insert(redemption.token, redemption.clone());
            Ok(redemption)
        })
        .await
    }

    async fn consume_redemption(
        &self,
        token: Uuid,
        partner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ConsumptionReceipt> {
        self.write(|t| {
            let redemption = t
                .redemptions
                .get(&token)
                .ok_or_else(|| LedgerError::not_found("redemption", token))?;
            let (owner, title) = match redemption.kind {
                RedemptionKind::Coupon { template_id } => {
                    let template = t.template(template_id)?;
                    (template.partner_id, template.title.clone())
                }
                RedemptionKind::Promotion { promotion_id } => {
                    let promotion = t.promotion(promotion_id)?;
                    (promotion.partner_id, promotion.title.clone())
                }
            };
            admit_consumption(redemption, owner, partner_id)?;
            let holder_contact = t.account(redemption.account_id)?.contact().to_string();

            let redemption = t
                .redemptions
                .get_mut(&token)
                .ok_or_else(|| LedgerError::not_found("redemption", token))?;
            redemption.consumed = true;
            redemption.consumed_at = Some(now);

            Ok(ConsumptionReceipt {
                redemption: redemption.clone(),
                coupon_title: title,
                holder_contact,
            })
        })
        .await
    }

    async fn get_redemption(&self, token: Uuid) -> Result<Option<Redemption>> {
        self.read(|t| Ok(t.redemptions.get(&token).cloned())).await
    }

    async fn list_redemptions(&self, account_id: Uuid) -> Result<Vec<Redemption>> {
        self.read(|t| {
            let mut redemptions: Vec<Redemption> = t
                .redemptions
                .values()
                .filter(|r| r.account_id == account_id)
                .cloned()
                .collect();
            sort_for_listing(&mut redemptions);
            Ok(redemptions)
        })
        .await
    }

    async fn pending_transfers(&self, day: NaiveDate) -> Result<Vec<Uuid>> {
        self.read(|t| {
            let mut accounts: Vec<Uuid> = t
                .activities
                .values()
                .filter(|r| r.day == day && r.untransferred_steps() > 0)
                .map(|r| r.account_id)
                .collect();
            accounts.sort();
            Ok(accounts)
        })
        .await
    }

    async fn transfer_steps(&self, account_id: Uuid, day: NaiveDate) -> Result<u64> {
        self.write(|t| {
            let Some(record) = t.activities.get_mut(&(account_id, day)) else {
                return Ok(0);
            };
            let steps = record.untransferred_steps();
            if steps == 0 {
                return Ok(0);
            }
            record.steps_transferred = record.steps;

            let account = t.account_mut(account_id)?;
            account.overall_steps += i64::from(steps);
            account.available_steps += i64::from(steps);
            Ok(u64::from(steps))
        })
        .await
    }

    async fn get_watermark(&self, job: &str) -> Result<Option<NaiveDate>> {
        self.read(|t| Ok(t.watermarks.get(job).copied())).await
    }

    async fn put_watermark(&self, job: &str, day: NaiveDate, _now: DateTime<Utc>) -> Result<()> {
        self.write(|t| {
            t.watermarks.insert(job.to_string(), day);
            Ok(())
        })
        .await
    }
}
