//! Daily inflation pool and reward-per-share accounting.
//!
//! Each finalized day mints `total_principal / (INFLATION_RATE / INFLATION_SCALE) / 365`
//! tokens. The day's pool (inflation plus penalties) is spread over the
//! day's active shares; the per-share yield is accumulated into a running
//! sum stored with the snapshot, so a holder's reward over `[a, b)` is
//! `shares * (acc(b) - acc(a)) / PRECISION`.

use tide_core::constants::{DAYS_PER_YEAR, INFLATION_RATE, INFLATION_SCALE, PRECISION};
use tide_core::error::StakingError;
use tide_core::math::{self, mul_div};
use tide_core::types::Day;

use crate::snapshot::SnapshotLedger;

/// Tokens minted for one day given the principal staked during it.
pub fn daily_inflation(total_principal: u128) -> Result<u128, StakingError> {
    mul_div(total_principal, INFLATION_SCALE, INFLATION_RATE * DAYS_PER_YEAR)
}

/// Per-share yield of one day, scaled by `PRECISION`. Zero for an empty pool.
pub fn reward_per_share(pool: u128, active_shares: u128) -> Result<u128, StakingError> {
    if active_shares == 0 {
        return Ok(0);
    }
    mul_div(pool, PRECISION, active_shares)
}

/// Reward for `shares` between two accumulator readings.
pub fn reward_between(shares: u128, acc_from: u128, acc_to: u128) -> Result<u128, StakingError> {
    let delta = math::sub(acc_to, acc_from)?;
    mul_div(shares, delta, PRECISION)
}

/// Reward for `shares` held over days `[from, to)`, using the accumulator.
pub fn accrued_reward(
    ledger: &SnapshotLedger,
    shares: u128,
    from: Day,
    to: Day,
) -> Result<u128, StakingError> {
    if to <= from {
        return Ok(0);
    }
    reward_between(
        shares,
        ledger.reward_per_share_before(from),
        ledger.reward_per_share_before(to),
    )
}

/// Settle `shares` held from `settled_day` up to `min(current_day, end_day)`.
///
/// Never settles past the finalized boundary. Returns the reward and the new
/// settled day.
pub fn settle(
    ledger: &SnapshotLedger,
    shares: u128,
    settled_day: Day,
    end_day: Day,
    current_day: Day,
) -> Result<(u128, Day), StakingError> {
    let to = current_day
        .min(end_day)
        .min(ledger.global().next_unfinalized_day())
        .max(settled_day);
    Ok((accrued_reward(ledger, shares, settled_day, to)?, to))
}

/// Same as [`accrued_reward`] but re-summing every finalized day's yield.
///
/// Linear in the window length; exists to cross-check the accumulator.
pub fn accrued_reward_by_days(
    ledger: &SnapshotLedger,
    shares: u128,
    from: Day,
    to: Day,
) -> Result<u128, StakingError> {
    let end = to.min(ledger.global().next_unfinalized_day());
    let mut yield_sum = 0u128;
    for day in from..end {
        let snap = ledger.read(day);
        yield_sum = math::add(yield_sum, reward_per_share(snap.pool_amount, snap.active_shares)?)?;
    }
    mul_div(shares, yield_sum, PRECISION)
}
