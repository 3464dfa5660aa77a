//! Position records, share pricing and per-position accrual.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tide_core::constants::{
    BONUS_PRECISION, DAILY_BONUS, MAX_LOCK_DAYS, MIN_LOCK_DAYS, PRECISION, REFERRAL_SHARES_DIVISOR,
};
use tide_core::error::StakingError;
use tide_core::math::{self, mul_div};
use tide_core::types::{AccountId, Day, Position, PositionView};

use crate::inflation::settle;
use crate::penalty::close_penalty;
use crate::snapshot::SnapshotLedger;

/// Shares granted to a new position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShareQuote {
    /// `principal * PRECISION / share_price`.
    pub base_shares: u128,
    /// Lock-length bonus.
    pub bonus_shares: u128,
    /// Credited to the referrer, zero without one.
    pub referrer_shares: u128,
}

impl ShareQuote {
    /// Shares owned by the position itself.
    pub fn shares(&self) -> u128 {
        self.base_shares + self.bonus_shares
    }
}

/// Reject lock lengths outside `MIN_LOCK_DAYS..=MAX_LOCK_DAYS`.
pub fn check_lock_days(lock_days: u64) -> Result<(), StakingError> {
    if (MIN_LOCK_DAYS..=MAX_LOCK_DAYS).contains(&lock_days) {
        Ok(())
    } else {
        Err(StakingError::InvalidDayRange {
            day: lock_days,
            min: MIN_LOCK_DAYS,
            max: MAX_LOCK_DAYS,
        })
    }
}

/// `principal * lock_days * DAILY_BONUS / 10^19`.
pub fn time_bonus(principal: u128, lock_days: u64) -> Result<u128, StakingError> {
    let scaled = principal
        .checked_mul(lock_days as u128)
        .ok_or(StakingError::ArithmeticOverflow)?;
    mul_div(scaled, DAILY_BONUS, BONUS_PRECISION)
}

/// Price a new position.
///
/// # Examples
///
/// ```
/// use tide_core::constants::{INITIAL_SHARE_PRICE, TOKEN};
/// use tide_staking::position::quote_shares;
///
/// let q = quote_shares(100 * TOKEN, 1_825, INITIAL_SHARE_PRICE, true).unwrap();
/// assert_eq!(q.base_shares, 1_000 * TOKEN);
/// assert_eq!(q.referrer_shares, 100 * TOKEN);
/// ```
pub fn quote_shares(
    principal: u128,
    lock_days: u64,
    share_price: u128,
    with_referrer: bool,
) -> Result<ShareQuote, StakingError> {
    if principal == 0 {
        return Err(StakingError::ZeroAmount);
    }
    check_lock_days(lock_days)?;
    let base_shares = mul_div(principal, PRECISION, share_price)?;
    let bonus_shares = time_bonus(principal, lock_days)?;
    let shares = math::add(base_shares, bonus_shares)?;
    if shares == 0 {
        return Err(StakingError::ZeroAmount);
    }
    let referrer_shares = if with_referrer {
        base_shares / REFERRAL_SHARES_DIVISOR
    } else {
        0
    };
    Ok(ShareQuote {
        base_shares,
        bonus_shares,
        referrer_shares,
    })
}

/// Copy of `position` with interest settled up to `current_day`.
///
/// Accrual runs from `settled_day` to the earlier of `current_day` and the
/// maturity day; a mature position earns nothing more.
pub fn settled(
    position: &Position,
    ledger: &SnapshotLedger,
    current_day: Day,
) -> Result<Position, StakingError> {
    let (reward, to) = settle(
        ledger,
        position.shares,
        position.settled_day,
        position.maturity_day,
        current_day,
    )?;
    let mut next = position.clone();
    next.pending_reward = math::add(next.pending_reward, reward)?;
    next.settled_day = to;
    Ok(next)
}

/// Read model of `position` as of `current_day`.
pub fn view(position: &Position, ledger: &SnapshotLedger, current_day: Day) -> Result<PositionView, StakingError> {
    let (pending_reward, penalty_if_closed_now) = if position.is_open {
        (
            settled(position, ledger, current_day)?.pending_reward,
            close_penalty(position, current_day)?,
        )
    } else {
        (position.pending_reward, 0)
    };
    // A closed position is frozen as of its close day.
    let (is_mature, days_left) = match position.close_day {
        Some(close_day) => (position.is_mature_at(close_day), 0),
        None => (position.is_mature_at(current_day), position.days_left_at(current_day)),
    };
    Ok(PositionView {
        current_day,
        is_mature,
        days_left,
        pending_reward,
        penalty_if_closed_now,
        position: position.clone(),
    })
}

/// Every position ever opened, keyed by owner then id. Closed positions stay
/// as immutable history.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionBook {
    positions: HashMap<AccountId, BTreeMap<u64, Position>>,
    next_ids: HashMap<AccountId, u64>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next position of `owner` will get; ids start at 1.
    pub fn next_id(&self, owner: &AccountId) -> u64 {
        self.next_ids.get(owner).copied().unwrap_or(1)
    }

    pub fn get(&self, owner: &AccountId, id: u64) -> Option<&Position> {
        self.positions.get(owner)?.get(&id)
    }

    /// Open position `id` of `owner`; closed and unknown ids are both
    /// [`StakingError::PositionNotFound`].
    pub fn get_open(&self, owner: &AccountId, id: u64) -> Result<&Position, StakingError> {
        self.get(owner, id)
            .filter(|p| p.is_open)
            .ok_or_else(|| StakingError::PositionNotFound {
                owner: owner.clone(),
                id,
            })
    }

    /// Positions of `owner` ordered by id.
    pub fn owned_by(&self, owner: &AccountId) -> impl Iterator<Item = &Position> {
        self.positions.get(owner).into_iter().flat_map(|m| m.values())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().flat_map(|m| m.values())
    }

    pub fn open_count(&self) -> usize {
        self.iter().filter(|p| p.is_open).count()
    }

    pub(crate) fn upsert(&mut self, position: Position) {
        let next = self.next_ids.entry(position.owner.clone()).or_insert(1);
        if position.id >= *next {
            *next = position.id + 1;
        }
        self.positions
            .entry(position.owner.clone())
            .or_default()
            .insert(position.id, position);
    }
}
