//! Partner profiles and dashboard aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Partner profile owned one-to-one by an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub description: String,
    pub website: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Partner {
    pub fn open(new: NewPartner, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            name: new.name,
            description: new.description,
            website: new.website,
            is_active: true,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPartner {
    pub account_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
}

/// Dashboard figures, always scoped to a single partner's own templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerStats {
    pub partner_name: String,
    pub total_active_templates: u64,
    pub total_sold: u64,
    pub revenue: i64,
}
