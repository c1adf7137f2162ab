//! Safe exponential and natural logarithm in WAD
//!
//! exp: range-reduce x = k·ln2 + r, r ∈ [0, ln2), Taylor series for e^r, shift by k.
//! ln:  normalize x = 2^n·y, y ∈ [1, 2), ln y = 2·atanh((y-1)/(y+1)).

use super::{wdiv, MathError, WAD};

/// ln(2) in WAD.
pub const LN2_WAD: u128 = 693_147_180_559_945_309;

/// Largest exponent accepted by [`exp_wad`].
///
/// e^40 ≈ 2.35e17, leaving ~1.4e3 of multiplicative headroom below the
/// largest WAD representable in `u128` (≈ 3.4e20).
pub const MAX_EXP_INPUT: u128 = 40 * WAD;

const MAX_SERIES_TERMS: u128 = 48;

/// `e^x` for `0 <= x <= MAX_EXP_INPUT`.
///
/// Inputs above the ceiling fail; the result never saturates.
pub fn exp_wad(x: u128) -> Result<u128, MathError> {
    if x > MAX_EXP_INPUT {
        return Err(MathError::ExpInputTooLarge {
            input: x,
            max: MAX_EXP_INPUT,
        });
    }

    let k = x / LN2_WAD;
    let r = x - k * LN2_WAD;

    let mut sum = WAD;
    let mut term = WAD;
    for i in 1..=MAX_SERIES_TERMS {
        term = term * r / (i * WAD);
        if term == 0 {
            break;
        }
        sum += term;
    }

    // k <= 57 under the ceiling and sum < 2 * WAD, so this never trips in practice
    if k >= 127 || sum > (u128::MAX >> k) {
        return Err(MathError::Overflow("exp_wad"));
    }
    Ok(sum << k)
}

/// Natural logarithm of a positive WAD value, as signed WAD.
pub fn ln_wad(x: u128) -> Result<i128, MathError> {
    if x == 0 {
        return Err(MathError::LnOfNonPositive);
    }

    let mut y = x;
    let mut exponent: i32 = 0;
    if y >= 2 * WAD {
        let shift = (y / WAD).ilog2();
        y >>= shift;
        exponent = shift as i32;
    }
    while y < WAD {
        y <<= 1;
        exponent -= 1;
    }

    let z = wdiv(y - WAD, y + WAD)?;
    let z_squared = z * z / WAD;
    let mut series = z;
    let mut power = z;
    let mut denominator = 3u128;
    loop {
        power = power * z_squared / WAD;
        if power == 0 {
            break;
        }
        series += power / denominator;
        denominator += 2;
    }

    Ok(exponent as i128 * LN2_WAD as i128 + 2 * series as i128)
}
