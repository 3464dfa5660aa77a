//! Early-exit penalty calculator.
//!
//! Exiting a position before its maturity day costs
//! `100 + 800 * days_left / lock_days` permille of the principal:
//! 10% at the last day before maturity, rising linearly to 90% right after
//! the start day. The inner division floors, so the permille is an integer.
//! Exits on or after maturity, and exits before the position ever started,
//! pay nothing.
//!
//! Penalties are not burned: the engine adds them to the exit day's pool,
//! where they are shared by the holders still active on that day.

use tide_core::constants::{PENALTY_BASE_PERMILLE, PENALTY_SLOPE_PERMILLE, PERMILLE};
use tide_core::error::StakingError;
use tide_core::math::mul_div;
use tide_core::types::{Day, Position};

/// Penalty rate in permille for exiting on `exit_day`.
///
/// # Examples
///
/// ```
/// use tide_staking::penalty::penalty_permille;
/// // 15-day lock maturing on day 18, left on day 6: 12 days early.
/// assert_eq!(penalty_permille(15, 3, 18, 6), 740);
/// assert_eq!(penalty_permille(15, 3, 18, 18), 0);
/// ```
pub fn penalty_permille(lock_days: u64, start_day: Day, maturity_day: Day, exit_day: Day) -> u128 {
    if lock_days == 0 || exit_day < start_day || exit_day >= maturity_day {
        return 0;
    }
    let days_left = (maturity_day - exit_day).min(lock_days) as u128;
    PENALTY_BASE_PERMILLE + PENALTY_SLOPE_PERMILLE * days_left / lock_days as u128
}

/// Penalty on `principal` for closing the whole position on `exit_day` (floor).
pub fn close_penalty(position: &Position, exit_day: Day) -> Result<u128, StakingError> {
    let permille = penalty_permille(
        position.lock_days,
        position.start_day,
        position.maturity_day,
        exit_day,
    );
    mul_div(position.principal, permille, PERMILLE)
}

/// `value - penalty`, rejecting anything that leaves no positive payout.
pub fn net_of_penalty(value: u128, penalty: u128) -> Result<u128, StakingError> {
    match value.checked_sub(penalty) {
        Some(net) if net > 0 => Ok(net),
        _ => Err(StakingError::PenaltyExceedsValue { value, penalty }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tide_core::constants::TOKEN;
    use tide_core::types::AccountId;

    fn position(principal: u128, start_day: Day, lock_days: u64) -> Position {
        Position {
            owner: AccountId::from("alice"),
            id: 1,
            principal,
            shares: principal * 10,
            referrer_shares: 0,
            referrer: None,
            referral_id: None,
            start_day,
            lock_days,
            maturity_day: start_day + lock_days,
            close_day: None,
            withdrawn_reward: 0,
            penalty_paid: 0,
            pending_reward: 0,
            settled_day: start_day,
            is_open: true,
        }
    }

    #[test]
    fn fifteen_day_lock_three_days_in() {
        // (100 + 800 * 12 / 15) / 1000 = 0.74
        let p = position(100 * TOKEN, 1, 15);
        assert_eq!(close_penalty(&p, 4).unwrap(), 74 * TOKEN);
    }

    #[test]
    fn one_year_lock_first_days() {
        let p = position(100 * TOKEN, 51, 365);
        assert_eq!(close_penalty(&p, 51).unwrap(), 90 * TOKEN);
        // 800 * 364 / 365 floors to 797.
        assert_eq!(close_penalty(&p, 52).unwrap(), 897 * TOKEN / 10);
        assert_eq!(close_penalty(&p, 53).unwrap(), 895 * TOKEN / 10);
    }

    #[test]
    fn last_day_before_maturity_is_ten_percent_plus_slope() {
        let p = position(1_000, 0, 10);
        // days_left = 1: 100 + 80 = 180 permille
        assert_eq!(close_penalty(&p, 9).unwrap(), 180);
    }

    #[test]
    fn mature_exit_is_free() {
        let p = position(100 * TOKEN, 10, 30);
        assert_eq!(close_penalty(&p, 40).unwrap(), 0);
        assert_eq!(close_penalty(&p, 40_000).unwrap(), 0);
    }

    #[test]
    fn exit_before_start_is_free() {
        let p = position(100 * TOKEN, 10, 30);
        assert_eq!(close_penalty(&p, 9).unwrap(), 0);
    }

    #[test]
    fn net_requires_positive_payout() {
        assert_eq!(net_of_penalty(10, 3).unwrap(), 7);
        assert_eq!(
            net_of_penalty(1, 1),
            Err(StakingError::PenaltyExceedsValue { value: 1, penalty: 1 })
        );
        assert!(net_of_penalty(1, 2).is_err());
    }

    proptest! {
        #[test]
        fn permille_bounded_and_monotone(lock in 1u64..20_000, start in 0u64..1_000, offset in 0u64..20_000) {
            let maturity = start + lock;
            let exit = start + offset.min(lock.saturating_sub(1));
            let rate = penalty_permille(lock, start, maturity, exit);
            prop_assert!((100..=900).contains(&rate));
            // One day later never costs more.
            let later = penalty_permille(lock, start, maturity, exit + 1);
            prop_assert!(later <= rate);
        }

        #[test]
        fn close_never_exceeds_ninety_percent(principal in 1u128..(1u128 << 100), lock in 1u64..15_330, day in 0u64..16_000) {
            let p = position(principal, 0, lock);
            let penalty = close_penalty(&p, day).unwrap();
            prop_assert!(penalty <= principal * 9 / 10);
        }
    }
}
