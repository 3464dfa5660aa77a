//! # tide-staking: Time-locked share staking with daily snapshots.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Snapshot ledger**: sparse day-indexed aggregates plus the global
//!   account, with a finalized boundary separating history from schedule.
//! - **Advancer**: finalizes days one at a time, applying scheduled
//!   activation/decay and minting the daily pool. Cost is linear in elapsed
//!   days and independent of the number of holders.
//! - **Reward accumulator**: cumulative reward-per-share per finalized day, so
//!   any position's interest between two touches is a single subtraction.
//! - **Penalties**: early closes pay 10% to 90% into the exit day's pool.
//! - **Engine**: open / withdraw / close state machine over the above.

pub mod advancer;
pub mod calendar;
pub mod engine;
pub mod inflation;
pub mod penalty;
pub mod position;
pub mod referral;
pub mod snapshot;

pub use advancer::SnapshotAdvancer;
pub use calendar::DayCalendar;
pub use engine::{StakingEngine, StakingState};
pub use snapshot::SnapshotLedger;
