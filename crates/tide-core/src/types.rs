//! Core staking types: accounts, snapshots, positions, events.
//!
//! All token amounts and share counts are `u128` base units with 18 decimals.
//! Day indices are `u64` counts of fixed-length periods since launch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a staking day. Day 0 starts at the launch timestamp.
pub type Day = u64;

/// Opaque account identifier used by the balance ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Per-day aggregate register.
///
/// `scheduled_decay`, `scheduled_activation` and `penalties` may be written
/// for any day that has not been finalized yet. `active_shares`,
/// `inflation_amount` and `reward_per_share` are written exactly once, when
/// the advancer finalizes the day.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Shares in the pool for this day.
    pub active_shares: u128,
    /// Tokens minted as inflation for this day.
    pub inflation_amount: u128,
    /// Shares leaving the pool at the start of this day.
    pub scheduled_decay: u128,
    /// Shares joining the pool at the start of this day.
    pub scheduled_activation: u128,
    /// Early-exit penalties recorded on this day.
    pub penalties: u128,
    /// Amount distributed to the day's active shares: inflation, the day's
    /// penalties and penalties carried over from empty days.
    pub pool_amount: u128,
    /// Cumulative reward per share through this day, scaled by `PRECISION`.
    pub reward_per_share: u128,
}

/// Singleton pool-wide account.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GlobalState {
    /// Principal of every open position.
    pub total_principal: u128,
    /// Active shares of the latest finalized day.
    pub active_shares: u128,
    /// Principal per share, scaled by `PRECISION`. Never decreases.
    pub share_price: u128,
    /// `None` until day 0 has been finalized.
    pub last_finalized_day: Option<Day>,
    /// Penalties recorded on days with an empty pool, waiting for the next
    /// day that has active shares.
    pub carried_penalties: u128,
    /// Sum of all inflation minted into daily pools.
    pub total_inflation: u128,
}

impl GlobalState {
    pub fn new(share_price: u128) -> Self {
        Self {
            total_principal: 0,
            active_shares: 0,
            share_price,
            last_finalized_day: None,
            carried_penalties: 0,
            total_inflation: 0,
        }
    }

    /// First day the advancer has not finalized yet.
    pub fn next_unfinalized_day(&self) -> Day {
        self.last_finalized_day.map_or(0, |d| d + 1)
    }
}

/// A time-locked staking position.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub owner: AccountId,
    /// Monotonic per owner, starting at 1.
    pub id: u64,
    pub principal: u128,
    pub shares: u128,
    /// Shares credited to the referrer for this position; not the owner's.
    pub referrer_shares: u128,
    pub referrer: Option<AccountId>,
    /// Referral link id under the referrer, when a referrer was given.
    pub referral_id: Option<u64>,
    /// Creation day + 1.
    pub start_day: Day,
    pub lock_days: u64,
    /// `start_day + lock_days`.
    pub maturity_day: Day,
    /// Set exactly once, when the position closes.
    pub close_day: Option<Day>,
    /// Interest taken out by withdrawals and the final close.
    pub withdrawn_reward: u128,
    pub penalty_paid: u128,
    /// Interest settled into the position but not withdrawn.
    pub pending_reward: u128,
    /// Accrual has been settled for days strictly before this one.
    pub settled_day: Day,
    pub is_open: bool,
}

impl Position {
    /// Whether `day` is on or after the maturity day.
    pub fn is_mature_at(&self, day: Day) -> bool {
        day >= self.maturity_day
    }

    /// Days remaining until maturity, zero once mature.
    pub fn days_left_at(&self, day: Day) -> u64 {
        self.maturity_day.saturating_sub(day.max(self.start_day))
    }

    /// Shares this position pushed into the pool: own plus referrer's.
    pub fn pool_shares(&self) -> u128 {
        self.shares + self.referrer_shares
    }
}

/// Referrer-owned record of shares earned through someone else's position.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReferralLink {
    pub referrer: AccountId,
    pub id: u64,
    pub referee: AccountId,
    pub position_id: u64,
    pub shares: u128,
    pub start_day: Day,
    /// Maturity of the referee's position, or its early close day.
    pub end_day: Day,
    pub withdrawn_reward: u128,
    pub pending_reward: u128,
    pub settled_day: Day,
}

/// Computed read model of a position.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PositionView {
    pub position: Position,
    pub current_day: Day,
    pub is_mature: bool,
    pub days_left: u64,
    /// Settled plus not-yet-settled interest over finalized days.
    pub pending_reward: u128,
    /// Penalty a close on `current_day` would charge.
    pub penalty_if_closed_now: u128,
}

/// Computed read model of a referral link.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReferralView {
    pub link: ReferralLink,
    pub pending_reward: u128,
}

/// One-time signal from the bootstrap collaborator that opens staking.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct BootstrapSignal {
    /// Unix timestamp of day 0.
    pub launch_time: u64,
    /// Initial supply minted to each account.
    pub allocations: Vec<(AccountId, u128)>,
    /// Pre-computed referral/critical-mass credits forwarded to the registry.
    pub referral_credits: Vec<(AccountId, u128)>,
}

/// Outcome of one advancer call.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceReport {
    pub days_finalized: u64,
    pub last_finalized_day: Option<Day>,
    /// True when every day before the target day is finalized.
    pub caught_up: bool,
}

/// Interest withdrawal request.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawAmount {
    Exact(u128),
    All,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OpenReceipt {
    pub id: u64,
    pub shares: u128,
    pub referrer_shares: u128,
    pub start_day: Day,
    pub maturity_day: Day,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WithdrawReceipt {
    /// Interest removed from the position and minted to the owner.
    pub amount: u128,
    /// Shares given up by an immature withdrawal; zero once mature.
    pub forfeited_shares: u128,
    pub remaining_shares: u128,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CloseReceipt {
    pub principal: u128,
    pub reward: u128,
    pub penalty: u128,
    /// Minted to the owner: `principal + reward - penalty`.
    pub payout: u128,
    pub close_day: Day,
}

/// Events emitted by staking operations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StakingEvent {
    StakingOpened {
        launch_time: u64,
        initial_supply: u128,
    },
    PositionOpened {
        owner: AccountId,
        id: u64,
        principal: u128,
        shares: u128,
        referrer_shares: u128,
        start_day: Day,
        lock_days: u64,
    },
    PositionClosed {
        owner: AccountId,
        id: u64,
        principal: u128,
        reward: u128,
        penalty: u128,
        close_day: Day,
    },
    InterestWithdrawn {
        owner: AccountId,
        id: u64,
        amount: u128,
        forfeited_shares: u128,
    },
    ReferralInterestWithdrawn {
        referrer: AccountId,
        id: u64,
        amount: u128,
    },
    SharePriceRaised {
        old_price: u128,
        new_price: u128,
        day: Day,
    },
}
