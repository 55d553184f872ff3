//! Coupon template, marketplace, promotion and dashboard contract tests.

use uuid::Uuid;

use stepledger::interfaces::{LedgerError, LedgerStore};
use stepledger::model::{
    MarketplaceQuery, NewCouponTemplate, PromotionFilter, PromotionUpdate, TemplateOrdering,
    TemplateUpdate,
};

use super::{account, at, now, partner, promotion, template};

fn tag() -> String {
    Uuid::new_v4().simple().to_string()
}

// =============================================================================
// Templates
// =============================================================================

pub async fn test_template_round_trip<S: LedgerStore>(store: &S) {
    let owner = partner(store, "Round Trip Deli").await;
    let mut new = NewCouponTemplate::new("Sandwich", 12).with_quantity(40);
    new.description = "Any sandwich".to_string();
    new.category = "food".to_string();
    new.validity_days = Some(14);

    let created = store.create_template(owner.id, new, now()).await.unwrap();
    assert_eq!(created.partner_id, owner.id);
    assert_eq!(created.quantity, Some(40));
    assert_eq!(created.purchased_count, 0);
    assert_eq!(created.validity_days, 14);

    let fetched = store.get_template(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created, "template should round-trip");
}

pub async fn test_template_requires_partner<S: LedgerStore>(store: &S) {
    let err = store
        .create_template(Uuid::new_v4(), NewCouponTemplate::new("Nobody's", 1), now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "partner", .. }));
}

pub async fn test_update_template<S: LedgerStore>(store: &S) {
    let owner = partner(store, "Update Deli").await;
    let created = template(store, owner.id, 12, Some(5)).await;

    let updated = store
        .update_template(
            created.id,
            &TemplateUpdate {
                title: Some("Soup".to_string()),
                cost_coins: Some(7),
                is_active: Some(false),
                ..TemplateUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Soup");
    assert_eq!(updated.cost_coins, 7);
    assert!(!updated.is_active);
    assert_eq!(updated.quantity, Some(5), "untouched fields stay");

    let fetched = store.get_template(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, updated);
}

pub async fn test_update_missing_template<S: LedgerStore>(store: &S) {
    let err = store
        .update_template(Uuid::new_v4(), &TemplateUpdate::default())
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

pub async fn test_list_partner_templates<S: LedgerStore>(store: &S) {
    let owner = partner(store, "Lister").await;
    let other = partner(store, "Other Lister").await;
    let older = store
        .create_template(owner.id, NewCouponTemplate::new("Older", 1), at(0))
        .await
        .unwrap();
    let newer = store
        .create_template(owner.id, NewCouponTemplate::new("Newer", 1), at(5))
        .await
        .unwrap();
    template(store, other.id, 1, None).await;

    let listed = store.list_partner_templates(owner.id).await.unwrap();
    assert_eq!(
        listed.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );
}

// =============================================================================
// Marketplace
// =============================================================================

pub async fn test_marketplace_only_lists_active<S: LedgerStore>(store: &S) {
    let key = tag();
    let open = partner(store, &format!("Open {key}")).await;
    let closed = partner(store, &format!("Closed {key}")).await;
    store.set_partner_active(closed.id, false).await.unwrap();

    let listed = template(store, open.id, 3, None).await;
    let retired = template(store, open.id, 3, None).await;
    store
        .update_template(
            retired.id,
            &TemplateUpdate {
                is_active: Some(false),
                ..TemplateUpdate::default()
            },
        )
        .await
        .unwrap();
    template(store, closed.id, 3, None).await;

    let found = store.marketplace(&MarketplaceQuery::search(&key)).await.unwrap();
    assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![listed.id]);
}

pub async fn test_marketplace_search_fields<S: LedgerStore>(store: &S) {
    let key = tag();
    let by_partner = partner(store, &format!("Pier {key} Bakery")).await;
    let plain = partner(store, "Plain Shop").await;

    let a = template(store, by_partner.id, 1, None).await;
    let b = store
        .create_template(
            plain.id,
            NewCouponTemplate::new(format!("Bagel {}", key.to_uppercase()), 1),
            now(),
        )
        .await
        .unwrap();
    let mut described = NewCouponTemplate::new("Mystery", 1);
    described.description = format!("ask for {key}");
    let c = store.create_template(plain.id, described, now()).await.unwrap();
    template(store, plain.id, 1, None).await;

    let mut found: Vec<_> = store
        .marketplace(&MarketplaceQuery::search(format!("  {key}  ")))
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    found.sort();
    let mut expected = vec![a.id, b.id, c.id];
    expected.sort();
    assert_eq!(found, expected, "title, description and partner name match");
}

pub async fn test_marketplace_wildcards_are_literal<S: LedgerStore>(store: &S) {
    let key = tag();
    let owner = partner(store, "Wildcard Shop").await;
    let literal = store
        .create_template(
            owner.id,
            NewCouponTemplate::new(format!("{key} 100% off"), 1),
            now(),
        )
        .await
        .unwrap();
    store
        .create_template(owner.id, NewCouponTemplate::new(format!("{key} 100 off"), 1), now())
        .await
        .unwrap();
    store
        .create_template(owner.id, NewCouponTemplate::new(format!("{key} 1_0"), 1), now())
        .await
        .unwrap();

    let found = store
        .marketplace(&MarketplaceQuery::search(format!("{key} 100%")))
        .await
        .unwrap();
    assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![literal.id]);

    let found = store
        .marketplace(&MarketplaceQuery::search(format!("{key} 1_")))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

pub async fn test_marketplace_ordering<S: LedgerStore>(store: &S) {
    let key = tag();
    let owner = partner(store, &format!("Order {key}")).await;
    let cheap_old = store
        .create_template(owner.id, NewCouponTemplate::new("a", 2), at(0))
        .await
        .unwrap();
    let dear_mid = store
        .create_template(owner.id, NewCouponTemplate::new("b", 9), at(1))
        .await
        .unwrap();
    let mid_new = store
        .create_template(owner.id, NewCouponTemplate::new("c", 5), at(2))
        .await
        .unwrap();

    let ids = |ordering| {
        let query = MarketplaceQuery {
            search: Some(key.clone()),
            ordering,
        };
        async move {
            store
                .marketplace(&query)
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.id)
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(
        ids(TemplateOrdering::NewestFirst).await,
        vec![mid_new.id, dear_mid.id, cheap_old.id]
    );
    assert_eq!(
        ids(TemplateOrdering::OldestFirst).await,
        vec![cheap_old.id, dear_mid.id, mid_new.id]
    );
    assert_eq!(
        ids(TemplateOrdering::CheapestFirst).await,
        vec![cheap_old.id, mid_new.id, dear_mid.id]
    );
    assert_eq!(
        ids(TemplateOrdering::DearestFirst).await,
        vec![dear_mid.id, mid_new.id, cheap_old.id]
    );
}

// =============================================================================
// Promotions
// =============================================================================

pub async fn test_promotion_round_trip<S: LedgerStore>(store: &S) {
    let owner = partner(store, "Promo Gym").await;
    let created = promotion(store, owner.id, 20_000, 3).await;
    assert!(created.is_active);

    let fetched = store.get_promotion(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let updated = store
        .update_promotion(
            created.id,
            &PromotionUpdate {
                required_steps: Some(15_000),
                is_active: Some(false),
                ..PromotionUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.required_steps, 15_000);
    assert!(!updated.is_active);
    assert_eq!(updated.max_redemptions_per_user, 3);
}

pub async fn test_list_promotions_filters<S: LedgerStore>(store: &S) {
    let owner = partner(store, "Filter Gym").await;
    let live = promotion(store, owner.id, 100, 1).await;
    let paused = promotion(store, owner.id, 100, 1).await;
    store
        .update_promotion(
            paused.id,
            &PromotionUpdate {
                is_active: Some(false),
                ..PromotionUpdate::default()
            },
        )
        .await
        .unwrap();

    let own = store
        .list_promotions(PromotionFilter::Partner(owner.id))
        .await
        .unwrap();
    assert_eq!(own.len(), 2, "partner listing includes inactive promotions");

    let active = store.list_promotions(PromotionFilter::Active).await.unwrap();
    assert!(active.iter().any(|p| p.id == live.id));
    assert!(active.iter().all(|p| p.id != paused.id));
}

// =============================================================================
// Dashboard
// =============================================================================

pub async fn test_partner_stats<S: LedgerStore>(store: &S) {
    let owner = partner(store, "Stats Cafe").await;
    let other = partner(store, "Stats Rival").await;
    let latte = template(store, owner.id, 8, Some(10)).await;
    let muffin = template(store, owner.id, 3, None).await;
    let retired = template(store, owner.id, 50, None).await;
    store
        .update_template(
            retired.id,
            &TemplateUpdate {
                is_active: Some(false),
                ..TemplateUpdate::default()
            },
        )
        .await
        .unwrap();
    let rival = template(store, other.id, 1, None).await;

    let buyer = account(store, 100).await;
    store.purchase_coupon(buyer.id, latte.id, now()).await.unwrap();
    store.purchase_coupon(buyer.id, latte.id, now()).await.unwrap();
    store.purchase_coupon(buyer.id, muffin.id, now()).await.unwrap();
    store.purchase_coupon(buyer.id, rival.id, now()).await.unwrap();

    let stats = store.partner_stats(owner.id).await.unwrap();
    assert_eq!(stats.partner_name, "Stats Cafe");
    assert_eq!(stats.total_active_templates, 2);
    assert_eq!(stats.total_sold, 3);
    assert_eq!(stats.revenue, 2 * 8 + 3);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all catalog contract tests against a store implementation.
#[macro_export]
macro_rules! run_catalog_tests {
    ($store:expr) => {
        use $crate::ledger::catalog_tests::*;

        test_template_round_trip($store).await;
        println!("  test_template_round_trip: PASSED");

        test_template_requires_partner($store).await;
        println!("  test_template_requires_partner: PASSED");

        test_update_template($store).await;
        println!("  test_update_template: PASSED");

        test_update_missing_template($store).await;
        println!("  test_update_missing_template: PASSED");

        test_list_partner_templates($store).await;
        println!("  test_list_partner_templates: PASSED");

        test_marketplace_only_lists_active($store).await;
        println!("  test_marketplace_only_lists_active: PASSED");

        test_marketplace_search_fields($store).await;
        println!("  test_marketplace_search_fields: PASSED");

        test_marketplace_wildcards_are_literal($store).await;
        println!("  test_marketplace_wildcards_are_literal: PASSED");

        test_marketplace_ordering($store).await;
        println!("  test_marketplace_ordering: PASSED");

        test_promotion_round_trip($store).await;
        println!("  test_promotion_round_trip: PASSED");

        test_list_promotions_filters($store).await;
        println!("  test_list_promotions_filters: PASSED");

        test_partner_stats($store).await;
        println!("  test_partner_stats: PASSED");
    };
}
