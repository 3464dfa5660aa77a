//! # tide-core
//! Foundation types, constants and collaborator traits for Tide staking.

pub mod constants;
pub mod error;
pub mod ledger;
pub mod math;
pub mod traits;
pub mod types;
