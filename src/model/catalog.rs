//! Partner catalog: coin-priced coupon templates and step-threshold promotions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interfaces::{LedgerError, Result};

/// Default coupon validity after purchase.
pub const DEFAULT_VALIDITY_DAYS: u32 = 30;

/// Partner-owned catalog item purchasable with coins.
///
/// `quantity == None` means unlimited stock. When set it only decreases and
/// never below zero; `purchased_count` only increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponTemplate {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub category: String,
    pub title: String,
    pub description: String,
    pub cost_coins: i64,
    pub validity_days: u32,
    pub quantity: Option<i64>,
    pub purchased_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CouponTemplate {
    pub fn open(partner_id: Uuid, new: NewCouponTemplate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            partner_id,
            category: new.category,
            title: new.title,
            description: new.description,
            cost_coins: new.cost_coins,
            validity_days: new.validity_days.unwrap_or(DEFAULT_VALIDITY_DAYS),
            quantity: new.quantity,
            purchased_count: 0,
            is_active: new.is_active,
            created_at: now,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        matches!(self.quantity, Some(q) if q <= 0)
    }

    /// Apply an owner update. Stock may only be lowered.
    pub fn apply(&mut self, update: &TemplateUpdate) -> Result<()> {
        if let Some(quantity) = update.quantity {
            if quantity < 0 {
                return Err(LedgerError::Validation(
                    "quantity must not be negative".to_string(),
                ));
            }
            if matches!(self.quantity, Some(current) if quantity > current) {
                return Err(LedgerError::Validation(format!(
                    "quantity may only decrease (current {}, requested {quantity})",
                    self.quantity.unwrap_or_default()
                )));
            }
            self.quantity = Some(quantity);
        }
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(cost) = update.cost_coins {
            self.cost_coins = cost;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCouponTemplate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub cost_coins: i64,
    #[serde(default)]
    pub validity_days: Option<u32>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewCouponTemplate {
    pub fn new(title: impl Into<String>, cost_coins: i64) -> Self {
        Self {
            title: title.into(),
            cost_coins,
            is_active: true,
            ..Self::default()
        }
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LedgerError::Validation("title is required".to_string()));
        }
        if self.cost_coins < 0 {
            return Err(LedgerError::Validation(
                "cost_coins must not be negative".to_string(),
            ));
        }
        if matches!(self.quantity, Some(q) if q < 0) {
            return Err(LedgerError::Validation(
                "quantity must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update of a template by its owning partner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cost_coins: Option<i64>,
    pub quantity: Option<i64>,
    pub is_active: Option<bool>,
}

impl TemplateUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(LedgerError::Validation("title must not be empty".to_string()));
        }
        if matches!(self.cost_coins, Some(c) if c < 0) {
            return Err(LedgerError::Validation(
                "cost_coins must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOrdering {
    #[default]
    NewestFirst,
    OldestFirst,
    CheapestFirst,
    DearestFirst,
}

/// Marketplace browse parameters.
///
/// Only active templates of active partners are ever listed. `search`
/// matches title, description and partner name, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub ordering: TemplateOrdering,
}

impl MarketplaceQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ordering: TemplateOrdering::default(),
        }
    }

    /// Trimmed, non-empty search term.
    pub fn term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Step-threshold redemption offered by a partner.
///
/// No global stock: admission is limited per account only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub title: String,
    pub description: String,
    pub required_steps: i64,
    pub max_redemptions_per_user: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    pub fn open(partner_id: Uuid, new: NewPromotion, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            partner_id,
            title: new.title,
            description: new.description,
            required_steps: new.required_steps,
            max_redemptions_per_user: new.max_redemptions_per_user,
            is_active: new.is_active,
            created_at: now,
        }
    }

    pub fn apply(&mut self, update: &PromotionUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(required) = update.required_steps {
            self.required_steps = required;
        }
        if let Some(max) = update.max_redemptions_per_user {
            self.max_redemptions_per_user = max;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPromotion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub required_steps: i64,
    #[serde(default = "default_max_redemptions")]
    pub max_redemptions_per_user: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPromotion {
    pub fn new(title: impl Into<String>, required_steps: i64, max_redemptions_per_user: u32) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            required_steps,
            max_redemptions_per_user,
            is_active: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LedgerError::Validation("title is required".to_string()));
        }
        if self.required_steps < 0 {
            return Err(LedgerError::Validation(
                "required_steps must not be negative".to_string(),
            ));
        }
        if self.max_redemptions_per_user == 0 {
            return Err(LedgerError::Validation(
                "max_redemptions_per_user must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub required_steps: Option<i64>,
    pub max_redemptions_per_user: Option<u32>,
    pub is_active: Option<bool>,
}

impl PromotionUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(LedgerError::Validation("title must not be empty".to_string()));
        }
        if matches!(self.required_steps, Some(r) if r < 0) {
            return Err(LedgerError::Validation(
                "required_steps must not be negative".to_string(),
            ));
        }
        if self.max_redemptions_per_user == Some(0) {
            return Err(LedgerError::Validation(
                "max_redemptions_per_user must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which promotions to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionFilter {
    /// Active promotions of any partner.
    Active,
    /// Every promotion of one partner, active or not.
    Partner(Uuid),
}

fn default_true() -> bool {
    true
}

fn default_max_redemptions() -> u32 {
    1
}
