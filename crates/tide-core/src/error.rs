//! Error types for Tide staking.
use thiserror::Error;

use crate::types::AccountId;

/// Failures reported by the balance-ledger collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("balance overflow for {0}")] Overflow(AccountId),
}

/// Every rejected staking operation maps to exactly one of these.
///
/// All variants are hard aborts: the operation that produced one left the
/// snapshot store, global account and positions untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("day {day} outside [{min}, {max}]")] InvalidDayRange { day: u64, min: u64, max: u64 },
    #[error("day {day} already finalized (last finalized {last_finalized})")] AlreadyFinalized { day: u64, last_finalized: u64 },
    #[error("position {id} of {owner} not found or not open")] PositionNotFound { owner: AccountId, id: u64 },
    #[error("penalty {penalty} leaves no payout from {value}")] PenaltyExceedsValue { value: u128, penalty: u128 },
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("staking not open yet")] StakingNotOpen,
    #[error("staking already open")] StakingAlreadyOpen,
    #[error("zero amount")] ZeroAmount,
    #[error("requested {requested} exceeds accrued reward {available}")] RewardExceedsAccrued { requested: u128, available: u128 },
    #[error("snapshots behind: last finalized {last_finalized:?}, need {target}")] CatchUpRequired { last_finalized: Option<u64>, target: u64 },
    #[error("timestamp {now} precedes launch {launch}")] LaunchInFuture { now: u64, launch: u64 },
    #[error("day length must be at least one second")] ZeroDayLength,
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("ledger: {0}")] Ledger(LedgerError),
}

impl From<LedgerError> for StakingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { have, need } => {
                StakingError::InsufficientBalance { have, need }
            }
            other => StakingError::Ledger(other),
        }
    }
}
