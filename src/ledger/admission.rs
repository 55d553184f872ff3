//! Admission rules for value-moving operations.
//!
//! Each check runs against rows already locked by the calling transaction
//! and returns the post-state to write, or the first rule violated.

use uuid::Uuid;

use crate::interfaces::{BusinessRule, LedgerError, Result};
use crate::model::{Account, CouponTemplate, Partner, Promotion, Redemption, RedemptionKind};

/// Row values after a coupon purchase commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseEffect {
    pub coins_after: i64,
    pub quantity_after: Option<i64>,
    pub purchased_count_after: i64,
}

/// Coin-priced coupon purchase.
///
/// Checked in order: template active, partner active, stock, balance.
pub fn admit_purchase(
    account: &Account,
    template: &CouponTemplate,
    partner: &Partner,
) -> Result<PurchaseEffect> {
    if !template.is_active {
        return Err(BusinessRule::InactiveResource {
            entity: "coupon_template",
            id: template.id,
        }
        .into());
    }
    if !partner.is_active {
        return Err(BusinessRule::InactiveResource {
            entity: "partner",
            id: partner.id,
        }
        .into());
    }
    if template.is_sold_out() {
        return Err(BusinessRule::OutOfStock {
            template_id: template.id,
        }
        .into());
    }
    if account.coins < template.cost_coins {
        return Err(BusinessRule::InsufficientBalance {
            required: template.cost_coins,
            available: account.coins,
        }
        .into());
    }

    Ok(PurchaseEffect {
        coins_after: account.coins - template.cost_coins,
        quantity_after: template.quantity.map(|q| q - 1),
        purchased_count_after: template.purchased_count + 1,
    })
}

/// Step-threshold promotion grant. Returns available steps after the debit.
///
/// `prior` is how many times this account already redeemed the promotion.
pub fn admit_promotion(account: &Account, promotion: &Promotion, prior: u32) -> Result<i64> {
    if !promotion.is_active {
        return Err(LedgerError::not_found("promotion", promotion.id));
    }
    if account.available_steps < promotion.required_steps {
        return Err(BusinessRule::InsufficientSteps {
            required: promotion.required_steps,
            available: account.available_steps,
        }
        .into());
    }
    if prior >= promotion.max_redemptions_per_user {
        return Err(BusinessRule::RedemptionLimitReached {
            max: promotion.max_redemptions_per_user,
            current: prior,
        }
        .into());
    }
    Ok(account.available_steps - promotion.required_steps)
}

/// Partner scan of a redemption token.
///
/// Ownership is checked first so a foreign partner learns nothing about the
/// redemption's state.
pub fn admit_consumption(
    redemption: &Redemption,
    owner_partner: Uuid,
    acting_partner: Uuid,
) -> Result<()> {
    if owner_partner != acting_partner {
        return Err(LedgerError::policy(
            "redemption was issued by another partner",
        ));
    }
    if let RedemptionKind::Promotion { .. } = redemption.kind {
        return Err(LedgerError::Validation(
            "promotion redemptions are standing grants and cannot be consumed".to_string(),
        ));
    }
    if redemption.consumed {
        return Err(BusinessRule::AlreadyConsumed {
            consumed_at: redemption.consumed_at.unwrap_or(redemption.purchased_at),
        }
        .into());
    }
    Ok(())
}

/// Admin coin adjustment. Returns coins after the adjustment.
pub fn admit_adjustment(account: &Account, amount: i64) -> Result<i64> {
    if amount == 0 {
        return Err(LedgerError::Validation(
            "adjustment amount must not be zero".to_string(),
        ));
    }
    let after = account.coins.checked_add(amount).ok_or_else(|| {
        LedgerError::Validation("adjustment amount out of range".to_string())
    })?;
    if after < 0 {
        return Err(BusinessRule::InsufficientBalance {
            required: amount.saturating_neg(),
            available: account.coins,
        }
        .into());
    }
    Ok(after)
}
