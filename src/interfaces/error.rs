//! Error taxonomy for ledger operations.
//!
//! Business-rule violations are detected before any write. Storage failures
//! abort the whole atomic unit and are reported to callers without detail.

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Sanitized message for storage failures.
pub const INTERNAL_ERROR: &str = "Internal error, please retry";

/// Top-level error for every ledger operation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Permission denied: {0}")]
    Policy(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Business(#[from] BusinessRule),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Domain rule violated by an otherwise well-formed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusinessRule {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Insufficient steps: required {required}, available {available}")]
    InsufficientSteps { required: i64, available: i64 },

    #[error("Out of stock: template {template_id}")]
    OutOfStock { template_id: Uuid },

    #[error("Already consumed at {consumed_at}")]
    AlreadyConsumed { consumed_at: DateTime<Utc> },

    #[error("Redemption limit reached: {current} of {max}")]
    RedemptionLimitReached { max: u32, current: u32 },

    #[error("{entity} is not active: {id}")]
    InactiveResource { entity: &'static str, id: Uuid },
}

impl BusinessRule {
    /// Stable machine-readable subkind.
    pub fn code(&self) -> &'static str {
        match self {
            BusinessRule::InsufficientBalance { .. } => "insufficient_balance",
            BusinessRule::InsufficientSteps { .. } => "insufficient_steps",
            BusinessRule::OutOfStock { .. } => "out_of_stock",
            BusinessRule::AlreadyConsumed { .. } => "already_consumed",
            BusinessRule::RedemptionLimitReached { .. } => "redemption_limit_reached",
            BusinessRule::InactiveResource { .. } => "inactive_resource",
        }
    }

    /// Numeric context for the caller (required vs available and so on).
    pub fn context(&self) -> serde_json::Value {
        match self {
            BusinessRule::InsufficientBalance {
                required,
                available,
            } => json!({ "required_coins": required, "available_coins": available }),
            BusinessRule::InsufficientSteps {
                required,
                available,
            } => json!({ "required_steps": required, "available_steps": available }),
            BusinessRule::OutOfStock { template_id } => json!({ "template_id": template_id }),
            BusinessRule::AlreadyConsumed { consumed_at } => {
                json!({ "consumed_at": consumed_at })
            }
            BusinessRule::RedemptionLimitReached { max, current } => {
                json!({ "max_redemptions": max, "current_redemptions": current })
            }
            BusinessRule::InactiveResource { entity, id } => {
                json!({ "entity": entity, "id": id })
            }
        }
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid stored value: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Lock contention or pool exhaustion: nothing was written, a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(sqlx::Error::PoolTimedOut) => true,
            StorageError::Database(sqlx::Error::Database(db)) => {
                let message = db.message();
                message.contains("database is locked") || message.contains("database is busy")
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Conflict(db.message().to_string())
            }
            _ => StorageError::Database(error),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        LedgerError::Storage(StorageError::from(error))
    }
}

impl From<uuid::Error> for LedgerError {
    fn from(error: uuid::Error) -> Self {
        LedgerError::Storage(StorageError::InvalidUuid(error))
    }
}

/// Serializable error payload for the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn policy(message: impl Into<String>) -> Self {
        LedgerError::Policy(message.into())
    }

    /// The business rule, if this is one.
    pub fn rule(&self) -> Option<&BusinessRule> {
        match self {
            LedgerError::Business(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            LedgerError::Policy(_) => StatusCode::FORBIDDEN,
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::Business(_) => StatusCode::BAD_REQUEST,
            LedgerError::Storage(StorageError::Conflict(_)) => StatusCode::BAD_REQUEST,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Payload for the caller. Storage details never leave the process.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            LedgerError::Validation(message) => ErrorBody {
                code: "validation".to_string(),
                message: message.clone(),
                context: serde_json::Value::Null,
            },
            LedgerError::Unauthenticated => ErrorBody {
                code: "unauthenticated".to_string(),
                message: self.to_string(),
                context: serde_json::Value::Null,
            },
            LedgerError::Policy(message) => ErrorBody {
                code: "forbidden".to_string(),
                message: message.clone(),
                context: serde_json::Value::Null,
            },
            LedgerError::NotFound { entity, id } => ErrorBody {
                code: "not_found".to_string(),
                message: self.to_string(),
                context: json!({ "entity": entity, "id": id }),
            },
            LedgerError::Business(rule) => ErrorBody {
                code: rule.code().to_string(),
                message: rule.to_string(),
                context: rule.context(),
            },
            LedgerError::Storage(StorageError::Conflict(message)) => ErrorBody {
                code: "conflict".to_string(),
                message: message.clone(),
                context: serde_json::Value::Null,
            },
            LedgerError::Storage(_) => ErrorBody {
                code: "internal".to_string(),
                message: INTERNAL_ERROR.to_string(),
                context: serde_json::Value::Null,
            },
        }
    }
}
