//! Coupon purchase, consumption and promotion redemption contract tests.

use uuid::Uuid;

use stepledger::interfaces::{BusinessRule, LedgerError, LedgerStore};
use stepledger::model::{
    PromotionUpdate, RedemptionKind, RedemptionState, TemplateUpdate, TransactionKind,
};

use super::{account, coins, now, partner, promotion, template, walker};

// =============================================================================
// Purchase
// =============================================================================

pub async fn test_purchase_applies_every_write<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Purchase Cafe").await;
    let coupon = template(store, shop.id, 15, Some(3)).await;
    let buyer = account(store, 40).await;

    let redemption = store
        .purchase_coupon(buyer.id, coupon.id, now())
        .await
        .unwrap();
    assert_eq!(redemption.account_id, buyer.id);
    assert_eq!(
        redemption.kind,
        RedemptionKind::Coupon {
            template_id: coupon.id
        }
    );
    assert!(!redemption.consumed);
    assert!(redemption.consumed_at.is_none());

    assert_eq!(coins(store, buyer.id).await, 25, "coins debited");
    let after = store.get_template(coupon.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, Some(2), "stock decremented");
    assert_eq!(after.purchased_count, 1);

    let stored = store.get_redemption(redemption.token).await.unwrap().unwrap();
    assert_eq!(stored, redemption);

    let spent: Vec<_> = store
        .list_transactions(buyer.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Spent)
        .collect();
    assert_eq!(spent.len(), 1);
    assert_eq!(spent[0].amount, -15);
}

pub async fn test_unlimited_stock_stays_unlimited<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Unlimited Cafe").await;
    let coupon = template(store, shop.id, 1, None).await;
    let buyer = account(store, 5).await;

    for _ in 0..3 {
        store.purchase_coupon(buyer.id, coupon.id, now()).await.unwrap();
    }
    let after = store.get_template(coupon.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, None);
    assert_eq!(after.purchased_count, 3);
    assert_eq!(coins(store, buyer.id).await, 2);
}

pub async fn test_free_coupon_writes_no_spent_line<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Free Cafe").await;
    let coupon = template(store, shop.id, 0, None).await;
    let buyer = account(store, 0).await;

    store.purchase_coupon(buyer.id, coupon.id, now()).await.unwrap();
    assert!(store.list_transactions(buyer.id).await.unwrap().is_empty());
    assert_eq!(store.list_redemptions(buyer.id).await.unwrap().len(), 1);
}

pub async fn test_purchase_out_of_stock<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Sold Out Cafe").await;
    let coupon = template(store, shop.id, 5, Some(1)).await;
    let first = account(store, 10).await;
    let second = account(store, 10).await;

    store.purchase_coupon(first.id, coupon.id, now()).await.unwrap();
    let err = store
        .purchase_coupon(second.id, coupon.id, now())
        .await
        .unwrap_err();
    assert!(matches!(err.rule(), Some(BusinessRule::OutOfStock { template_id }) if *template_id == coupon.id));

    assert_eq!(coins(store, second.id).await, 10);
    let after = store.get_template(coupon.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, Some(0), "stock never goes below zero");
    assert_eq!(after.purchased_count, 1);
}

pub async fn test_purchase_insufficient_balance<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Pricey Cafe").await;
    let coupon = template(store, shop.id, 30, Some(4)).await;
    let buyer = account(store, 29).await;

    let err = store
        .purchase_coupon(buyer.id, coupon.id, now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::InsufficientBalance {
            required: 30,
            available: 29
        })
    ));

    assert_eq!(coins(store, buyer.id).await, 29);
    let after = store.get_template(coupon.id).await.unwrap().unwrap();
    assert_eq!((after.quantity, after.purchased_count), (Some(4), 0));
    assert!(store.list_redemptions(buyer.id).await.unwrap().is_empty());
}

pub async fn test_purchase_inactive_template<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Retired Cafe").await;
    let coupon = template(store, shop.id, 1, None).await;
    store
        .update_template(
            coupon.id,
            &TemplateUpdate {
                is_active: Some(false),
                ..TemplateUpdate::default()
            },
        )
        .await
        .unwrap();
    let buyer = account(store, 10).await;

    let err = store
        .purchase_coupon(buyer.id, coupon.id, now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::InactiveResource {
            entity: "coupon_template",
            ..
        })
    ));
    assert_eq!(coins(store, buyer.id).await, 10);
}

pub async fn test_purchase_from_inactive_partner<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Closed Cafe").await;
    let coupon = template(store, shop.id, 1, None).await;
    store.set_partner_active(shop.id, false).await.unwrap();
    let buyer = account(store, 10).await;

    let err = store
        .purchase_coupon(buyer.id, coupon.id, now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::InactiveResource {
            entity: "partner",
            ..
        })
    ));
}

pub async fn test_purchase_unknown_template<S: LedgerStore>(store: &S) {
    let buyer = account(store, 10).await;
    let err = store
        .purchase_coupon(buyer.id, Uuid::new_v4(), now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: "coupon_template",
            ..
        }
    ));
}

// =============================================================================
// Consumption
// =============================================================================

pub async fn test_consume_once<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Scan Cafe").await;
    let coupon = template(store, shop.id, 2, None).await;
    let buyer = account(store, 10).await;
    let redemption = store.purchase_coupon(buyer.id, coupon.id, now()).await.unwrap();

    let consumed_at = now();
    let receipt = store
        .consume_redemption(redemption.token, shop.id, consumed_at)
        .await
        .unwrap();
    assert!(receipt.redemption.consumed);
    assert_eq!(receipt.redemption.consumed_at, Some(consumed_at));
    assert_eq!(receipt.coupon_title, coupon.title);
    assert_eq!(receipt.holder_contact, buyer.contact());

    let stored = store.get_redemption(redemption.token).await.unwrap().unwrap();
    assert_eq!(stored.state(), RedemptionState::Consumed { at: consumed_at });
}

pub async fn test_consume_twice_reports_original_time<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Twice Cafe").await;
    let coupon = template(store, shop.id, 2, None).await;
    let buyer = account(store, 10).await;
    let redemption = store.purchase_coupon(buyer.id, coupon.id, now()).await.unwrap();

    let first = super::at(0);
    store
        .consume_redemption(redemption.token, shop.id, first)
        .await
        .unwrap();

    for _ in 0..2 {
        let err = store
            .consume_redemption(redemption.token, shop.id, super::at(30))
            .await
            .unwrap_err();
        assert!(matches!(
            err.rule(),
            Some(BusinessRule::AlreadyConsumed { consumed_at }) if *consumed_at == first
        ));
    }

    let stored = store.get_redemption(redemption.token).await.unwrap().unwrap();
    assert_eq!(stored.consumed_at, Some(first), "consumed_at never moves");
}

pub async fn test_consume_by_other_partner<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Owner Cafe").await;
    let rival = partner(store, "Rival Cafe").await;
    let coupon = template(store, shop.id, 2, None).await;
    let buyer = account(store, 10).await;
    let redemption = store.purchase_coupon(buyer.id, coupon.id, now()).await.unwrap();

    let err = store
        .consume_redemption(redemption.token, rival.id, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Policy(_)));
    assert!(!store.get_redemption(redemption.token).await.unwrap().unwrap().consumed);

    // Still a policy error once consumed.
    store
        .consume_redemption(redemption.token, shop.id, now())
        .await
        .unwrap();
    let err = store
        .consume_redemption(redemption.token, rival.id, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Policy(_)));
}

pub async fn test_consume_unknown_token<S: LedgerStore>(store: &S) {
    let shop = partner(store, "Unknown Token Cafe").await;
    let err = store
        .consume_redemption(Uuid::new_v4(), shop.id, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "redemption", .. }));
}

pub async fn test_promotion_redemption_cannot_be_consumed<S: LedgerStore>(store: &S) {
    let gym = partner(store, "Standing Gym").await;
    let promo = promotion(store, gym.id, 1_000, 1).await;
    let member = walker(store, 2_000).await;
    let redemption = store.redeem_promotion(member.id, promo.id, now()).await.unwrap();

    let err = store
        .consume_redemption(redemption.token, gym.id, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

// =============================================================================
// Promotions
// =============================================================================

pub async fn test_redeem_promotion_debits_steps<S: LedgerStore>(store: &S) {
    let gym = partner(store, "Step Gym").await;
    let promo = promotion(store, gym.id, 3_000, 2).await;
    let member = walker(store, 7_000).await;

    let redemption = store.redeem_promotion(member.id, promo.id, now()).await.unwrap();
    assert_eq!(
        redemption.kind,
        RedemptionKind::Promotion {
            promotion_id: promo.id
        }
    );
    assert_eq!(redemption.state(), RedemptionState::Standing);

    let after = store.get_account(member.id).await.unwrap().unwrap();
    assert_eq!(after.available_steps, 4_000);
    assert_eq!(after.overall_steps, 7_000, "lifetime total is untouched");
    assert_eq!(after.coins, member.coins, "coins are untouched");
}

pub async fn test_promotion_cap_is_per_account<S: LedgerStore>(store: &S) {
    let gym = partner(store, "Capped Gym").await;
    let promo = promotion(store, gym.id, 1_000, 2).await;
    let member = walker(store, 10_000).await;
    let other = walker(store, 1_000).await;

    store.redeem_promotion(member.id, promo.id, now()).await.unwrap();
    store.redeem_promotion(member.id, promo.id, now()).await.unwrap();
    let err = store
        .redeem_promotion(member.id, promo.id, now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::RedemptionLimitReached { max: 2, current: 2 })
    ));
    let after = store.get_account(member.id).await.unwrap().unwrap();
    assert_eq!(after.available_steps, 8_000, "rejected attempt debits nothing");

    store
        .redeem_promotion(other.id, promo.id, now())
        .await
        .expect("another account is unaffected by the cap");
}

pub async fn test_redeem_with_too_few_steps<S: LedgerStore>(store: &S) {
    let gym = partner(store, "Hard Gym").await;
    let promo = promotion(store, gym.id, 5_000, 1).await;
    let member = walker(store, 4_999).await;

    let err = store
        .redeem_promotion(member.id, promo.id, now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::InsufficientSteps {
            required: 5_000,
            available: 4_999
        })
    ));
    assert!(store.list_redemptions(member.id).await.unwrap().is_empty());
}

pub async fn test_redeem_inactive_or_missing_promotion<S: LedgerStore>(store: &S) {
    let gym = partner(store, "Paused Gym").await;
    let promo = promotion(store, gym.id, 10, 1).await;
    store
        .update_promotion(
            promo.id,
            &PromotionUpdate {
                is_active: Some(false),
                ..PromotionUpdate::default()
            },
        )
        .await
        .unwrap();
    let member = walker(store, 100).await;

    for promotion_id in [promo.id, Uuid::new_v4()] {
        let err = store
            .redeem_promotion(member.id, promotion_id, now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "promotion", .. }));
    }
}

// =============================================================================
// Listing
// =============================================================================

pub async fn test_list_redemptions_unconsumed_first<S: LedgerStore>(store: &S) {
    let shop = partner(store, "List Cafe").await;
    let coupon = template(store, shop.id, 1, None).await;
    let buyer = account(store, 10).await;

    let oldest = store
        .purchase_coupon(buyer.id, coupon.id, super::at(0))
        .await
        .unwrap();
    let middle = store
        .purchase_coupon(buyer.id, coupon.id, super::at(1))
        .await
        .unwrap();
    let newest = store
        .purchase_coupon(buyer.id, coupon.id, super::at(2))
        .await
        .unwrap();
    store
        .consume_redemption(newest.token, shop.id, super::at(3))
        .await
        .unwrap();

    let tokens: Vec<_> = store
        .list_redemptions(buyer.id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.token)
        .collect();
    assert_eq!(tokens, vec![middle.token, oldest.token, newest.token]);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all redemption contract tests against a store implementation.
#[macro_export]
macro_rules! run_redemption_tests {
    ($store:expr) => {
        use $crate::ledger::redemption_tests::*;

        test_purchase_applies_every_write($store).await;
        println!("  test_purchase_applies_every_write: PASSED");

        test_unlimited_stock_stays_unlimited($store).await;
        println!("  test_unlimited_stock_stays_unlimited: PASSED");

        test_free_coupon_writes_no_spent_line($store).await;
        println!("  test_free_coupon_writes_no_spent_line: PASSED");

        test_purchase_out_of_stock($store).await;
        println!("  test_purchase_out_of_stock: PASSED");

        test_purchase_insufficient_balance($store).await;
        println!("  test_purchase_insufficient_balance: PASSED");

        test_purchase_inactive_template($store).await;
        println!("  test_purchase_inactive_template: PASSED");

        test_purchase_from_inactive_partner($store).await;
        println!("  test_purchase_from_inactive_partner: PASSED");

        test_purchase_unknown_template($store).await;
        println!("  test_purchase_unknown_template: PASSED");

        test_consume_once($store).await;
        println!("  test_consume_once: PASSED");

        test_consume_twice_reports_original_time($store).await;
        println!("  test_consume_twice_reports_original_time: PASSED");

        test_consume_by_other_partner($store).await;
        println!("  test_consume_by_other_partner: PASSED");

        test_consume_unknown_token($store).await;
        println!("  test_consume_unknown_token: PASSED");

        test_promotion_redemption_cannot_be_consumed($store).await;
        println!("  test_promotion_redemption_cannot_be_consumed: PASSED");

        test_redeem_promotion_debits_steps($store).await;
        println!("  test_redeem_promotion_debits_steps: PASSED");

        test_promotion_cap_is_per_account($store).await;
        println!("  test_promotion_cap_is_per_account: PASSED");

        test_redeem_with_too_few_steps($store).await;
        println!("  test_redeem_with_too_few_steps: PASSED");

        test_redeem_inactive_or_missing_promotion($store).await;
        println!("  test_redeem_inactive_or_missing_promotion: PASSED");

        test_list_redemptions_unconsumed_first($store).await;
        println!("  test_list_redemptions_unconsumed_first: PASSED");
    };
}
