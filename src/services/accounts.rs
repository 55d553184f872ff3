//! Account registration, caller resolution and admin adjustments.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::log_storage;
use super::policy::{self, Caller, Identity};
use crate::interfaces::{LedgerError, LedgerStore, Result};
use crate::model::{Account, ActivityRecord, NewAccount, RewardTransaction};

/// Accounts and their histories.
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

/// Lower-case the domain of an email address; the local part is kept as typed.
fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(format!("{local}@{}", domain.to_lowercase()))
        }
        _ => Err(LedgerError::Validation(format!(
            "invalid email address: {email:?}"
        ))),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Open an account with zero balances. Email or phone number is required.
    #[tracing::instrument(name = "accounts.register", skip_all)]
    pub async fn register(&self, new: NewAccount) -> Result<Account> {
        let mut new = new;
        new.email = present(new.email).map(|e| normalize_email(&e)).transpose()?;
        new.phone_number = present(new.phone_number);
        if new.email.is_none() && new.phone_number.is_none() {
            return Err(LedgerError::Validation(
                "email or phone number is required".to_string(),
            ));
        }

        let account = self
            .store
            .create_account(new, Utc::now())
            .await
            .map_err(log_storage("create_account"))?;
        info!(account_id = %account.id, role = %account.role, "Account registered");
        Ok(account)
    }

    /// Resolve an authenticated account id into a caller for the policy gate.
    ///
    /// Unknown and deactivated accounts are unauthenticated. The partner
    /// identity is attached only while the partner profile is active.
    pub async fn caller(&self, account_id: Uuid) -> Result<Caller> {
        let account = self
            .store
            .get_account(account_id)
            .await
            .map_err(log_storage("get_account"))?
            .filter(|a| a.is_active)
            .ok_or(LedgerError::Unauthenticated)?;

        let partner_id = self
            .store
            .partner_for_account(account_id)
            .await
            .map_err(log_storage("partner_for_account"))?
            .filter(|p| p.is_active)
            .map(|p| p.id);

        Ok(Caller::Authenticated(Identity {
            account_id,
            role: account.role,
            partner_id,
        }))
    }

    /// The caller's own account.
    pub async fn me(&self, caller: &Caller) -> Result<Account> {
        let identity = policy::authenticated(caller)?;
        self.store
            .get_account(identity.account_id)
            .await
            .map_err(log_storage("get_account"))?
            .ok_or_else(|| LedgerError::not_found("account", identity.account_id))
    }

    /// The caller's reward transactions, newest first.
    pub async fn transactions(&self, caller: &Caller) -> Result<Vec<RewardTransaction>> {
        let identity = policy::authenticated(caller)?;
        self.store
            .list_transactions(identity.account_id)
            .await
            .map_err(log_storage("list_transactions"))
    }

    /// The caller's activity records, newest day first.
    pub async fn activities(&self, caller: &Caller) -> Result<Vec<ActivityRecord>> {
        let identity = policy::authenticated(caller)?;
        self.store
            .list_activities(identity.account_id)
            .await
            .map_err(log_storage("list_activities"))
    }

    /// Admin-only signed coin adjustment with a reason.
    #[tracing::instrument(name = "accounts.adjust", skip_all, fields(account_id = %account_id, amount = amount))]
    pub async fn adjust(
        &self,
        caller: &Caller,
        account_id: Uuid,
        amount: i64,
        reason: &str,
    ) -> Result<(Account, RewardTransaction)> {
        let admin = policy::admin(caller)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::Validation(
                "adjustment reason is required".to_string(),
            ));
        }

        let (account, line) = self
            .store
            .adjust_coins(account_id, amount, reason, Utc::now())
            .await
            .map_err(log_storage("adjust_coins"))?;
        info!(
            admin_id = %admin.account_id,
            account_id = %account_id,
            amount,
            coins = account.coins,
            "Coins adjusted"
        );
        Ok((account, line))
    }
}
