//! Access and policy gate.
//!
//! Stateless predicates evaluated per request. Each returns the part of the
//! caller's identity the operation needs, or the error to surface.

use uuid::Uuid;

use crate::interfaces::{LedgerError, Result};
use crate::model::Role;

/// Who an authenticated request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub account_id: Uuid,
    pub role: Role,
    /// Present when the account owns an active partner profile.
    pub partner_id: Option<Uuid>,
}

impl Identity {
    pub fn user(account_id: Uuid) -> Self {
        Self {
            account_id,
            role: Role::User,
            partner_id: None,
        }
    }

    pub fn partner(account_id: Uuid, partner_id: Uuid) -> Self {
        Self {
            account_id,
            role: Role::Partner,
            partner_id: Some(partner_id),
        }
    }

    pub fn admin(account_id: Uuid) -> Self {
        Self {
            account_id,
            role: Role::Admin,
            partner_id: None,
        }
    }
}

/// The caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Authenticated(Identity),
}

impl From<Identity> for Caller {
    fn from(identity: Identity) -> Self {
        Caller::Authenticated(identity)
    }
}

/// The caller is signed in.
pub fn authenticated(caller: &Caller) -> Result<&Identity> {
    match caller {
        Caller::Authenticated(identity) => Ok(identity),
        Caller::Anonymous => Err(LedgerError::Unauthenticated),
    }
}

/// IsPartner: signed in with a partner identity. Returns the partner id.
pub fn partner(caller: &Caller) -> Result<Uuid> {
    authenticated(caller)?
        .partner_id
        .ok_or_else(|| LedgerError::policy("caller is not a partner"))
}

/// IsOwnerOfResource: the caller's partner identity owns the resource.
pub fn owner_of(caller: &Caller, owning_partner: Uuid) -> Result<Uuid> {
    let partner_id = partner(caller)?;
    if partner_id != owning_partner {
        return Err(LedgerError::policy("resource belongs to another partner"));
    }
    Ok(partner_id)
}

/// Admin-only operations.
pub fn admin(caller: &Caller) -> Result<&Identity> {
    let identity = authenticated(caller)?;
    if identity.role != Role::Admin {
        return Err(LedgerError::policy("admin role required"));
    }
    Ok(identity)
}
