//! Pure ledger rules.
//!
//! No I/O. Storage backends call these inside their transactions so every
//! backend applies the same reward and admission logic to the same locked
//! view of the data.

pub mod admission;
pub mod reward;

pub use admission::{
    admit_adjustment, admit_consumption, admit_promotion, admit_purchase, PurchaseEffect,
};
pub use reward::{
    plan as plan_reward, RewardAction, RewardChange, RewardPlan, RewardPolicy,
    COIN_PER_INCREMENT, MIN_STEPS_THRESHOLD, STEP_INCREMENT,
};
