//! Account identity and balances.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability attached to an account.
///
/// Checked by the policy gate instead of probing for related records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Partner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Partner => "partner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "partner" => Ok(Role::Partner),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user's identity plus lifetime and spendable counters.
///
/// `coins` and `available_steps` are spendable and never negative.
/// `overall_steps` is the lifetime total credited by the step transfer job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub coins: i64,
    pub available_steps: i64,
    pub overall_steps: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh account with zero balances.
    pub fn open(new: NewAccount, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: new.email,
            phone_number: new.phone_number,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            coins: 0,
            available_steps: 0,
            overall_steps: 0,
            is_active: true,
            created_at: now,
        }
    }

    /// Email if present, otherwise phone number.
    pub fn contact(&self) -> &str {
        self.email
            .as_deref()
            .or(self.phone_number.as_deref())
            .unwrap_or("")
    }

    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Registration payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl NewAccount {
    /// Registration keyed by an email or phone identifier.
    ///
    /// An identifier containing `@` is treated as an email, anything else
    /// as a phone number.
    pub fn with_identifier(identifier: &str) -> Self {
        if identifier.contains('@') {
            Self {
                email: Some(identifier.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                phone_number: Some(identifier.to_string()),
                ..Self::default()
            }
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}
