//! Protocol constants. All token amounts carry 18 decimals (1 TIDE = 10^18 units).

/// One whole token in base units.
pub const TOKEN: u128 = 1_000_000_000_000_000_000;

/// Fixed-point denominator for share prices and reward-per-share values.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Share price at launch: 0.1 token per share.
///
/// # Examples
///
/// ```
/// use tide_core::constants::{INITIAL_SHARE_PRICE, PRECISION};
/// assert_eq!(INITIAL_SHARE_PRICE * 10, PRECISION);
/// ```
pub const INITIAL_SHARE_PRICE: u128 = 100_000_000_000_000_000;

/// Per-lock-day bonus factor. `365 * DAILY_BONUS / BONUS_PRECISION` is
/// (just above) 0.5, i.e. a one-year lock adds 5% of principal as shares
/// on top of the 10 shares per token the launch price yields.
pub const DAILY_BONUS: u128 = 13_698_630_136_986_302;

/// Denominator for [`DAILY_BONUS`].
pub const BONUS_PRECISION: u128 = 10_000_000_000_000_000_000;

/// Referrers receive `base_shares / REFERRAL_SHARES_DIVISOR`.
pub const REFERRAL_SHARES_DIVISOR: u128 = 10;

/// Inverse inflation rate. Annual minted fraction of total principal is
/// `INFLATION_SCALE / INFLATION_RATE` (~9.7%).
pub const INFLATION_RATE: u128 = 103_000;

/// Numerator paired with [`INFLATION_RATE`].
pub const INFLATION_SCALE: u128 = 10_000;

pub const DAYS_PER_YEAR: u128 = 365;

pub const MIN_LOCK_DAYS: u64 = 1;
pub const MAX_LOCK_DAYS: u64 = 15_330;

/// Base early-exit penalty in permille of principal.
pub const PENALTY_BASE_PERMILLE: u128 = 100;

/// Additional penalty, scaled by the fraction of the lock still remaining.
pub const PENALTY_SLOPE_PERMILLE: u128 = 800;

pub const PERMILLE: u128 = 1_000;

/// Default length of one staking day in seconds.
pub const DEFAULT_DAY_LENGTH_SECS: u64 = 86_400;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_year_bonus_is_half_a_share_per_token() {
        let per_token = 365 * DAILY_BONUS * TOKEN / BONUS_PRECISION;
        // 0.5 token-units of shares per token, rounded up by the constant.
        assert!(per_token >= TOKEN / 2);
        assert!(per_token - TOKEN / 2 < 1_000);
    }

    #[test]
    fn penalty_caps_at_ninety_percent() {
        assert_eq!(PENALTY_BASE_PERMILLE + PENALTY_SLOPE_PERMILLE, 900);
    }

    #[test]
    fn lock_bounds_ordered() {
        assert!(MIN_LOCK_DAYS > 0);
        assert!(MIN_LOCK_DAYS < MAX_LOCK_DAYS);
    }

    #[test]
    fn launch_price_is_ten_shares_per_token() {
        assert_eq!(TOKEN * PRECISION / INITIAL_SHARE_PRICE, 10 * TOKEN);
    }
}
