//! Shared LedgerStore contract tests.
//!
//! Tests the LedgerStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.
//! Every test creates its own accounts and partners, so the functions can
//! share one store.

#![allow(dead_code)]

pub mod account_tests;
pub mod catalog_tests;
pub mod redemption_tests;
pub mod reward_tests;

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use uuid::Uuid;

use stepledger::interfaces::LedgerStore;
use stepledger::ledger::RewardPolicy;
use stepledger::model::{
    Account, ActivityInput, ActivityOutcome, CouponTemplate, NewAccount, NewCouponTemplate,
    NewPartner, NewPromotion, Partner, Promotion,
};

/// Current time at the precision every backend stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A fixed instant `minutes` after a base time, for ordering assertions.
pub fn at(minutes: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::minutes(minutes)
}

pub fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, n).unwrap()
}

pub fn unique_email() -> String {
    format!("walker-{}@example.com", Uuid::new_v4().simple())
}

/// A fresh account holding `coins`, seeded through an adjustment.
pub async fn account<S: LedgerStore>(store: &S, coins: i64) -> Account {
    let account = store
        .create_account(NewAccount::with_identifier(&unique_email()), now())
        .await
        .expect("create_account should succeed");
    if coins != 0 {
        store
            .adjust_coins(account.id, coins, "seed", now())
            .await
            .expect("seed adjustment should succeed");
    }
    store.get_account(account.id).await.unwrap().unwrap()
}

/// A fresh account with `steps` spendable steps, credited by a transfer.
pub async fn walker<S: LedgerStore>(store: &S, steps: u32) -> Account {
    let account = account(store, 0).await;
    if steps > 0 {
        record(store, account.id, day(1), steps).await;
        store.transfer_steps(account.id, day(1)).await.unwrap();
    }
    store.get_account(account.id).await.unwrap().unwrap()
}

/// A fresh active partner on its own account.
pub async fn partner<S: LedgerStore>(store: &S, name: &str) -> Partner {
    let owner = account(store, 0).await;
    store
        .create_partner(
            NewPartner {
                account_id: owner.id,
                name: name.to_string(),
                description: String::new(),
                website: None,
            },
            now(),
        )
        .await
        .expect("create_partner should succeed")
}

pub async fn template<S: LedgerStore>(
    store: &S,
    partner_id: Uuid,
    cost: i64,
    quantity: Option<i64>,
) -> CouponTemplate {
    let mut new = NewCouponTemplate::new(format!("Coupon {}", Uuid::new_v4().simple()), cost);
    new.quantity = quantity;
    store
        .create_template(partner_id, new, now())
        .await
        .expect("create_template should succeed")
}

pub async fn promotion<S: LedgerStore>(
    store: &S,
    partner_id: Uuid,
    required_steps: i64,
    max_per_user: u32,
) -> Promotion {
    store
        .create_promotion(
            partner_id,
            NewPromotion::new("Free smoothie", required_steps, max_per_user),
            now(),
        )
        .await
        .expect("create_promotion should succeed")
}

/// Submit a day's steps under the default reward thresholds.
pub async fn record<S: LedgerStore>(
    store: &S,
    account_id: Uuid,
    day: NaiveDate,
    steps: u32,
) -> ActivityOutcome {
    store
        .submit_activity(
            account_id,
            &ActivityInput::new(day, steps),
            &RewardPolicy::default(),
            now(),
        )
        .await
        .expect("submit_activity should succeed")
}

pub async fn coins<S: LedgerStore>(store: &S, account_id: Uuid) -> i64 {
    store.get_account(account_id).await.unwrap().unwrap().coins
}
