//! Fixed-point helpers with a 256-bit intermediate product.
//!
//! Share and reward math multiplies two 18-decimal quantities before
//! dividing, which overflows `u128` for realistic supplies. `mul_div`
//! keeps the full product and only fails when the quotient itself does
//! not fit.

use crate::error::StakingError;

const LOW_MASK: u128 = u64::MAX as u128;

/// Full 256-bit product of `a * b` as `(high, low)` halves.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let (a_lo, a_hi) = (a & LOW_MASK, a >> 64);
    let (b_lo, b_hi) = (b & LOW_MASK, b >> 64);

    let p0 = a_lo * b_lo;
    let p1 = a_lo * b_hi;
    let p2 = a_hi * b_lo;
    let p3 = a_hi * b_hi;

    // At most 3 * (2^64 - 1): no overflow.
    let mid = (p0 >> 64) + (p1 & LOW_MASK) + (p2 & LOW_MASK);
    let low = (p0 & LOW_MASK) | (mid << 64);
    let high = p3 + (p1 >> 64) + (p2 >> 64) + (mid >> 64);
    (high, low)
}

/// Divide the 256-bit value `(high, low)` by `d`, returning `(quotient, remainder)`.
///
/// Requires `high < d`, which guarantees the quotient fits in `u128`.
fn div_wide(high: u128, low: u128, d: u128) -> (u128, u128) {
    if high == 0 {
        return (low / d, low % d);
    }
    let mut rem = high;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((low >> bit) & 1);
        quotient <<= 1;
        // With the carry set the true remainder is 2^128 + rem, always >= d.
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1;
        }
    }
    (quotient, rem)
}

fn mul_div_rem(a: u128, b: u128, d: u128) -> Result<(u128, u128), StakingError> {
    if d == 0 {
        return Err(StakingError::ArithmeticOverflow);
    }
    let (high, low) = mul_wide(a, b);
    if high >= d {
        return Err(StakingError::ArithmeticOverflow);
    }
    Ok(div_wide(high, low, d))
}

/// `floor(a * b / d)`.
///
/// # Examples
///
/// ```
/// use tide_core::math::mul_div;
/// assert_eq!(mul_div(u128::MAX, 6, 3).ok(), None);
/// assert_eq!(mul_div(u128::MAX, 3, 6).unwrap(), u128::MAX / 2);
/// assert_eq!(mul_div(10, 10, 3).unwrap(), 33);
/// ```
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, StakingError> {
    mul_div_rem(a, b, d).map(|(q, _)| q)
}

/// `ceil(a * b / d)`.
pub fn mul_div_ceil(a: u128, b: u128, d: u128) -> Result<u128, StakingError> {
    let (q, rem) = mul_div_rem(a, b, d)?;
    if rem == 0 {
        Ok(q)
    } else {
        q.checked_add(1).ok_or(StakingError::ArithmeticOverflow)
    }
}

/// Checked addition mapped to the staking error type.
pub fn add(a: u128, b: u128) -> Result<u128, StakingError> {
    a.checked_add(b).ok_or(StakingError::ArithmeticOverflow)
}

/// Checked subtraction mapped to the staking error type.
pub fn sub(a: u128, b: u128) -> Result<u128, StakingError> {
    a.checked_sub(b).ok_or(StakingError::ArithmeticOverflow)
}
