//! Redemptions: value exchanged for a partner benefit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a redemption was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RedemptionKind {
    /// Bought with coins; consumed once by the issuing partner.
    Coupon { template_id: Uuid },
    /// Granted for steps; a standing perk with no consumption step.
    Promotion { promotion_id: Uuid },
}

impl RedemptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionKind::Coupon { .. } => "coupon",
            RedemptionKind::Promotion { .. } => "promotion",
        }
    }
}

/// Lifecycle position derived from the stored flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RedemptionState {
    Issued,
    Consumed { at: DateTime<Utc> },
    Standing,
}

impl fmt::Display for RedemptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionState::Issued => f.write_str("issued"),
            RedemptionState::Consumed { at } => write!(f, "consumed at {at}"),
            RedemptionState::Standing => f.write_str("standing"),
        }
    }
}

/// One row per successful purchase or promotion grant. Never deleted.
///
/// The token is a random v4 UUID; its unguessability is the only thing
/// protecting the scan URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub token: Uuid,
    pub account_id: Uuid,
    pub kind: RedemptionKind,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
    pub purchased_at: DateTime<Utc>,
}

impl Redemption {
    pub fn issue(account_id: Uuid, kind: RedemptionKind, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            account_id,
            kind,
            consumed: false,
            consumed_at: None,
            purchased_at: now,
        }
    }

    pub fn state(&self) -> RedemptionState {
        match (self.kind, self.consumed, self.consumed_at) {
            (RedemptionKind::Promotion { .. }, _, _) => RedemptionState::Standing,
            (RedemptionKind::Coupon { .. }, true, Some(at)) => RedemptionState::Consumed { at },
            // Consumed without a timestamp cannot be written by this crate.
            (RedemptionKind::Coupon { .. }, true, None) => RedemptionState::Consumed {
                at: self.purchased_at,
            },
            (RedemptionKind::Coupon { .. }, false, _) => RedemptionState::Issued,
        }
    }

    pub fn template_id(&self) -> Option<Uuid> {
        match self.kind {
            RedemptionKind::Coupon { template_id } => Some(template_id),
            RedemptionKind::Promotion { .. } => None,
        }
    }

    pub fn promotion_id(&self) -> Option<Uuid> {
        match self.kind {
            RedemptionKind::Promotion { promotion_id } => Some(promotion_id),
            RedemptionKind::Coupon { .. } => None,
        }
    }

    /// Content of the scannable code for a coupon: `{base_url}/redeem/{token}`.
    ///
    /// Promotions are never scanned and have no payload.
    pub fn scan_payload(&self, base_url: &str) -> Option<String> {
        match self.kind {
            RedemptionKind::Coupon { .. } => Some(format!(
                "{}/redeem/{}",
                base_url.trim_end_matches('/'),
                self.token
            )),
            RedemptionKind::Promotion { .. } => None,
        }
    }
}

/// Sort for "my redemptions": unconsumed first, then newest purchase first.
pub fn sort_for_listing(redemptions: &mut [Redemption]) {
    redemptions.sort_by(|a, b| {
        a.consumed
            .cmp(&b.consumed)
            .then_with(|| b.purchased_at.cmp(&a.purchased_at))
    });
}

/// What the scanning partner sees after a successful consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionReceipt {
    pub redemption: Redemption,
    pub coupon_title: String,
    pub holder_contact: String,
}
