//! StepLedger - coin and step ledger for an activity rewards backend
//!
//! Daily activity earns coins, coins buy partner coupons, recorded steps
//! are transferred into spendable balances by a daily job, and spendable
//! steps unlock partner promotions. Every balance movement is one atomic
//! unit in the ledger store.

pub mod config;
pub mod interfaces;
pub mod ledger;
pub mod model;
pub mod services;
pub mod storage;
pub mod utils;
