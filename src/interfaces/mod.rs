//! Abstract interfaces for stepledger components.
//!
//! These define the contracts for:
//! - Ledger storage (persistence of balances, catalog and redemptions)
//! - The error taxonomy shared by storage and services

pub mod error;
pub mod ledger_store;

pub use error::{BusinessRule, ErrorBody, LedgerError, Result, StorageError, INTERNAL_ERROR};
pub use ledger_store::LedgerStore;
