//! Activity ingestion and daily reward reconciliation contract tests.

use uuid::Uuid;

use stepledger::interfaces::{BusinessRule, LedgerError, LedgerStore};
use stepledger::ledger::RewardPolicy;
use stepledger::model::{ActivityInput, ActivitySource, RewardTransaction, TransactionKind};

use super::{account, coins, day, now, record};

async fn earned<S: LedgerStore>(store: &S, account_id: Uuid) -> Vec<RewardTransaction> {
    store
        .list_transactions(account_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Earned)
        .collect()
}

// =============================================================================
// Reward amounts
// =============================================================================

pub async fn test_reward_thresholds<S: LedgerStore>(store: &S) {
    for (steps, expected) in [(5_000, 5), (10_000, 10), (7_999, 7)] {
        let holder = account(store, 0).await;
        let outcome = record(store, holder.id, day(3), steps).await;

        assert!(outcome.created);
        assert_eq!(outcome.reward.current, expected, "{steps} steps");
        assert_eq!(outcome.coins, expected);
        assert_eq!(coins(store, holder.id).await, expected);

        let lines = earned(store, holder.id).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].amount, expected);
        assert_eq!(lines[0].reward_day, Some(day(3)));
    }
}

pub async fn test_below_threshold_earns_nothing<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    let outcome = record(store, holder.id, day(3), 4_000).await;

    assert_eq!(outcome.reward.current, 0);
    assert_eq!(outcome.coins, 0);
    assert!(earned(store, holder.id).await.is_empty(), "no EARNED line below 5000");
}

// =============================================================================
// Reconciliation
// =============================================================================

pub async fn test_raising_steps_updates_line<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    record(store, holder.id, day(4), 5_000).await;

    let outcome = record(store, holder.id, day(4), 8_000).await;
    assert!(!outcome.created, "same day updates the record");
    assert_eq!(outcome.reward.previous, 5);
    assert_eq!(outcome.reward.delta, 3);
    assert_eq!(coins(store, holder.id).await, 8);

    let lines = earned(store, holder.id).await;
    assert_eq!(lines.len(), 1, "line is updated, not duplicated");
    assert_eq!(lines[0].amount, 8);

    let activities = store.list_activities(holder.id).await.unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].steps, 8_000);
}

pub async fn test_lowering_below_threshold_deletes_line<S: LedgerStore>(store: &S) {
    let holder = account(store, 4).await;
    record(store, holder.id, day(5), 6_000).await;
    assert_eq!(coins(store, holder.id).await, 10);

    let outcome = record(store, holder.id, day(5), 4_000).await;
    assert_eq!(outcome.reward.delta, -6);
    assert_eq!(coins(store, holder.id).await, 4, "back to the pre-reward balance");
    assert!(earned(store, holder.id).await.is_empty());
}

pub async fn test_resubmitting_same_steps_is_noop<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    record(store, holder.id, day(6), 9_000).await;

    let again = record(store, holder.id, day(6), 9_000).await;
    assert_eq!(again.reward.delta, 0);
    assert_eq!(coins(store, holder.id).await, 9);
    assert_eq!(earned(store, holder.id).await.len(), 1);
}

pub async fn test_reconcile_is_idempotent<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    record(store, holder.id, day(7), 12_000).await;

    let policy = RewardPolicy::default();
    for _ in 0..2 {
        let outcome = store
            .reconcile_reward(holder.id, day(7), &policy, now())
            .await
            .unwrap();
        assert_eq!(outcome.reward.delta, 0);
        assert_eq!(outcome.coins, 12);
    }
    assert_eq!(earned(store, holder.id).await.len(), 1);
}

pub async fn test_reconcile_with_new_policy<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    record(store, holder.id, day(8), 4_000).await;

    let generous = RewardPolicy {
        min_steps_threshold: 3_000,
        step_increment: 500,
        coins_per_increment: 1,
    };
    let outcome = store
        .reconcile_reward(holder.id, day(8), &generous, now())
        .await
        .unwrap();
    assert_eq!(outcome.reward.current, 8);
    assert_eq!(coins(store, holder.id).await, 8);
}

pub async fn test_reconcile_missing_activity<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    let err = store
        .reconcile_reward(holder.id, day(9), &RewardPolicy::default(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "activity", .. }));
}

pub async fn test_lowering_after_spending_is_rejected<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    record(store, holder.id, day(10), 9_000).await;
    store
        .adjust_coins(holder.id, -8, "spent elsewhere", now())
        .await
        .unwrap();

    let err = store
        .submit_activity(
            holder.id,
            &ActivityInput::new(day(10), 2_000),
            &RewardPolicy::default(),
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::InsufficientBalance {
            required: 9,
            available: 1
        })
    ));

    assert_eq!(coins(store, holder.id).await, 1);
    let activities = store.list_activities(holder.id).await.unwrap();
    assert_eq!(activities[0].steps, 9_000, "activity update rolled back too");
    assert_eq!(earned(store, holder.id).await[0].amount, 9);
}

pub async fn test_submit_unknown_account<S: LedgerStore>(store: &S) {
    let err = store
        .submit_activity(
            Uuid::new_v4(),
            &ActivityInput::new(day(3), 6_000),
            &RewardPolicy::default(),
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));
}

// =============================================================================
// History
// =============================================================================

pub async fn test_activity_details_round_trip<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    let input = ActivityInput {
        day: day(11),
        steps: 6_200,
        duration_secs: 3_600,
        distance_km: 4.5,
        calories: 310,
        source: Some(ActivitySource::Manual),
    };
    store
        .submit_activity(holder.id, &input, &RewardPolicy::default(), now())
        .await
        .unwrap();

    let stored = &store.list_activities(holder.id).await.unwrap()[0];
    assert_eq!(stored.steps, 6_200);
    assert_eq!(stored.duration_secs, 3_600);
    assert_eq!(stored.distance_km, 4.5);
    assert_eq!(stored.calories, 310);
    assert_eq!(stored.source, Some(ActivitySource::Manual));
    assert_eq!(stored.steps_transferred, 0);
}

pub async fn test_history_ordering<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;
    record(store, holder.id, day(2), 6_000).await;
    record(store, holder.id, day(12), 7_000).await;
    record(store, holder.id, day(5), 8_000).await;

    let days: Vec<_> = store
        .list_activities(holder.id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.day)
        .collect();
    assert_eq!(days, vec![day(12), day(5), day(2)], "newest day first");

    let lines = store.list_transactions(holder.id).await.unwrap();
    assert_eq!(lines.len(), 3);
    assert!(
        lines.windows(2).all(|w| w[0].created_at >= w[1].created_at),
        "newest transaction first"
    );
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all reward contract tests against a store implementation.
#[macro_export]
macro_rules! run_reward_tests {
    ($store:expr) => {
        use $crate::ledger::reward_tests::*;

        test_reward_thresholds($store).await;
        println!("  test_reward_thresholds: PASSED");

        test_below_threshold_earns_nothing($store).await;
        println!("  test_below_threshold_earns_nothing: PASSED");

        test_raising_steps_updates_line($store).await;
        println!("  test_raising_steps_updates_line: PASSED");

        test_lowering_below_threshold_deletes_line($store).await;
        println!("  test_lowering_below_threshold_deletes_line: PASSED");

        test_resubmitting_same_steps_is_noop($store).await;
        println!("  test_resubmitting_same_steps_is_noop: PASSED");

        test_reconcile_is_idempotent($store).await;
        println!("  test_reconcile_is_idempotent: PASSED");

        test_reconcile_with_new_policy($store).await;
        println!("  test_reconcile_with_new_policy: PASSED");

        test_reconcile_missing_activity($store).await;
        println!("  test_reconcile_missing_activity: PASSED");

        test_lowering_after_spending_is_rejected($store).await;
        println!("  test_lowering_after_spending_is_rejected: PASSED");

        test_submit_unknown_account($store).await;
        println!("  test_submit_unknown_account: PASSED");

        test_activity_details_round_trip($store).await;
        println!("  test_activity_details_round_trip: PASSED");

        test_history_ordering($store).await;
        println!("  test_history_ordering: PASSED");
    };
}
