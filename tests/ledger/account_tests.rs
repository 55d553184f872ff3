//! Account, adjustment and partner profile contract tests.

use uuid::Uuid;

use stepledger::interfaces::{BusinessRule, LedgerError, LedgerStore, StorageError};
use stepledger::model::{NewAccount, NewPartner, Role, TransactionKind};

use super::{account, now, partner, unique_email};

// =============================================================================
// Accounts
// =============================================================================

pub async fn test_create_and_get_account<S: LedgerStore>(store: &S) {
    let new = NewAccount {
        email: Some(unique_email()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Walker".to_string()),
        ..NewAccount::default()
    }
    .role(Role::Partner);

    let created = store.create_account(new, now()).await.unwrap();
    assert_eq!(created.coins, 0);
    assert_eq!(created.available_steps, 0);
    assert_eq!(created.overall_steps, 0);
    assert!(created.is_active);

    let fetched = store
        .get_account(created.id)
        .await
        .unwrap()
        .expect("account should exist");
    assert_eq!(fetched, created, "stored account should round-trip");
    assert_eq!(fetched.role, Role::Partner);
}

pub async fn test_get_missing_account<S: LedgerStore>(store: &S) {
    let result = store.get_account(Uuid::new_v4()).await.unwrap();
    assert!(result.is_none(), "unknown account should be None");
}

pub async fn test_duplicate_email_conflicts<S: LedgerStore>(store: &S) {
    let email = unique_email();
    store
        .create_account(NewAccount::with_identifier(&email), now())
        .await
        .unwrap();

    let err = store
        .create_account(NewAccount::with_identifier(&email), now())
        .await
        .unwrap_err();
    assert!(
        matches!(err, LedgerError::Storage(StorageError::Conflict(_))),
        "duplicate email should conflict, got {err:?}"
    );
}

pub async fn test_phone_only_account<S: LedgerStore>(store: &S) {
    let phone = format!("+1555{}", &Uuid::new_v4().simple().to_string()[..7]);
    let created = store
        .create_account(NewAccount::with_identifier(&phone), now())
        .await
        .unwrap();
    assert!(created.email.is_none());
    assert_eq!(created.contact(), phone);
}

// =============================================================================
// Adjustments
// =============================================================================

pub async fn test_adjust_coins_writes_ledger_line<S: LedgerStore>(store: &S) {
    let holder = account(store, 0).await;

    let (updated, line) = store
        .adjust_coins(holder.id, 25, "welcome bonus", now())
        .await
        .unwrap();
    assert_eq!(updated.coins, 25);
    assert_eq!(line.amount, 25);
    assert_eq!(line.kind, TransactionKind::Adjustment);
    assert_eq!(line.reason, "welcome bonus");

    let (updated, _) = store
        .adjust_coins(holder.id, -5, "correction", now())
        .await
        .unwrap();
    assert_eq!(updated.coins, 20);

    let lines = store.list_transactions(holder.id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines.iter().map(|l| l.amount).sum::<i64>(), 20);
}

pub async fn test_adjust_below_zero_is_rejected<S: LedgerStore>(store: &S) {
    let holder = account(store, 10).await;

    let err = store
        .adjust_coins(holder.id, -11, "too much", now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.rule(),
        Some(BusinessRule::InsufficientBalance {
            required: 11,
            available: 10
        })
    ));

    let after = store.get_account(holder.id).await.unwrap().unwrap();
    assert_eq!(after.coins, 10, "rejected adjustment must not touch coins");
    assert_eq!(store.list_transactions(holder.id).await.unwrap().len(), 1);
}

pub async fn test_adjust_unknown_account<S: LedgerStore>(store: &S) {
    let err = store
        .adjust_coins(Uuid::new_v4(), 5, "ghost", now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));
}

// =============================================================================
// Partners
// =============================================================================

pub async fn test_partner_profile<S: LedgerStore>(store: &S) {
    let created = partner(store, "Harbor Cafe").await;
    assert!(created.is_active);

    let fetched = store.get_partner(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let by_account = store
        .partner_for_account(created.account_id)
        .await
        .unwrap()
        .expect("owner account should resolve to its partner");
    assert_eq!(by_account.id, created.id);

    let deactivated = store.set_partner_active(created.id, false).await.unwrap();
    assert!(!deactivated.is_active);
    assert!(!store.get_partner(created.id).await.unwrap().unwrap().is_active);
}

pub async fn test_one_partner_per_account<S: LedgerStore>(store: &S) {
    let existing = partner(store, "First").await;

    let err = store
        .create_partner(
            NewPartner {
                account_id: existing.account_id,
                name: "Second".to_string(),
                description: String::new(),
                website: None,
            },
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(StorageError::Conflict(_))));
}

pub async fn test_partner_requires_account<S: LedgerStore>(store: &S) {
    let err = store
        .create_partner(
            NewPartner {
                account_id: Uuid::new_v4(),
                name: "Orphan".to_string(),
                description: String::new(),
                website: None,
            },
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));
}

pub async fn test_list_partners_by_name<S: LedgerStore>(store: &S) {
    let tag = Uuid::new_v4().simple().to_string();
    let zed = partner(store, &format!("zz {tag}")).await;
    let abe = partner(store, &format!("aa {tag}")).await;
    store.set_partner_active(zed.id, false).await.unwrap();

    let all: Vec<_> = store
        .list_partners(false)
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.name.ends_with(&tag))
        .collect();
    assert_eq!(
        all.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![abe.id, zed.id],
        "partners should be ordered by name"
    );

    let active = store.list_partners(true).await.unwrap();
    assert!(active.iter().any(|p| p.id == abe.id));
    assert!(active.iter().all(|p| p.id != zed.id));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all account and partner contract tests against a store implementation.
#[macro_export]
macro_rules! run_account_tests {
    ($store:expr) => {
        use $crate::ledger::account_tests::*;

        test_create_and_get_account($store).await;
        println!("  test_create_and_get_account: PASSED");

        test_get_missing_account($store).await;
        println!("  test_get_missing_account: PASSED");

        test_duplicate_email_conflicts($store).await;
        println!("  test_duplicate_email_conflicts: PASSED");

        test_phone_only_account($store).await;
        println!("  test_phone_only_account: PASSED");

        test_adjust_coins_writes_ledger_line($store).await;
        println!("  test_adjust_coins_writes_ledger_line: PASSED");

        test_adjust_below_zero_is_rejected($store).await;
        println!("  test_adjust_below_zero_is_rejected: PASSED");

        test_adjust_unknown_account($store).await;
        println!("  test_adjust_unknown_account: PASSED");

        test_partner_profile($store).await;
        println!("  test_partner_profile: PASSED");

        test_one_partner_per_account($store).await;
        println!("  test_one_partner_per_account: PASSED");

        test_partner_requires_account($store).await;
        println!("  test_partner_requires_account: PASSED");

        test_list_partners_by_name($store).await;
        println!("  test_list_partners_by_name: PASSED");
    };
}
