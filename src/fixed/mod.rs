//! 18-decimal fixed-point kernel
//!
//! Values are unsigned `u128` scaled by `WAD = 10^18`. Products are formed in
//! 256 bits before division, so `mul_div` only fails when the final quotient
//! does not fit in 128 bits.
//!
//! Rounding is explicit at every call site:
//! - `Down`: truncate toward zero
//! - `Up`: round away from zero when a remainder exists
//! - `Nearest`: half-up

mod exp;
mod wide;

pub use exp::{exp_wad, ln_wad, LN2_WAD, MAX_EXP_INPUT};

use thiserror::Error;

/// One unit in 18-decimal fixed point.
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Number of fractional decimal digits carried by a WAD value.
pub const WAD_DECIMALS: usize = 18;

/// Errors raised by the numeric kernel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    /// Divisor was zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Result does not fit in the 128-bit representation.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Exponential input above the safe ceiling.
    #[error("exp input {input} exceeds safe ceiling {max}")]
    ExpInputTooLarge {
        /// Requested exponent (WAD).
        input: u128,
        /// Largest accepted exponent (WAD).
        max: u128,
    },

    /// Natural log requested for zero.
    #[error("ln is only defined for positive inputs")]
    LnOfNonPositive,

    /// Decimal string could not be converted to WAD.
    #[error("invalid decimal '{0}'")]
    InvalidDecimal(String),
}

/// Rounding direction for a fixed-point operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Truncate.
    Down,
    /// Round up when a remainder exists.
    Up,
    /// Round half up.
    Nearest,
}

/// Compute `a * b / denominator` with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }

    let (quotient, remainder) = match a.checked_mul(b) {
        Some(product) => (product / denominator, product % denominator),
        None => {
            let (hi, lo) = wide::full_mul(a, b);
            if hi >= denominator {
                return Err(MathError::Overflow("mul_div"));
            }
            wide::div_wide(hi, lo, denominator)
        }
    };

    let round_up = match rounding {
        Rounding::Down => false,
        Rounding::Up => remainder != 0,
        // remainder >= denominator - remainder, written without overflow
        Rounding::Nearest => remainder >= denominator - remainder,
    };

    if round_up {
        quotient
            .checked_add(1)
            .ok_or(MathError::Overflow("mul_div rounding"))
    } else {
        Ok(quotient)
    }
}

/// `a * b` in WAD, truncated.
#[inline]
pub fn wmul(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, WAD, Rounding::Down)
}

/// `a * b` in WAD, rounded up.
#[inline]
pub fn wmul_up(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, WAD, Rounding::Up)
}

/// `a * b` in WAD, rounded to nearest.
#[inline]
pub fn wmul_nearest(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, WAD, Rounding::Nearest)
}

/// `a / b` in WAD, truncated.
#[inline]
pub fn wdiv(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, WAD, b, Rounding::Down)
}

/// `a / b` in WAD, rounded up.
#[inline]
pub fn wdiv_up(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, WAD, b, Rounding::Up)
}

/// `a / b` in WAD, rounded to nearest.
#[inline]
pub fn wdiv_nearest(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, WAD, b, Rounding::Nearest)
}

/// Parse a non-negative decimal string ("12", "0.25", "3.") into WAD.
pub fn parse_wad(input: &str) -> Result<u128, MathError> {
    let invalid = || MathError::InvalidDecimal(input.to_string());
    let trimmed = input.trim();
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if frac_part.len() > WAD_DECIMALS
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| invalid())?
    };
    let frac: u128 = if frac_part.is_empty() {
        0
    } else {
        let digits: u128 = frac_part.parse().map_err(|_| invalid())?;
        digits * 10u128.pow((WAD_DECIMALS - frac_part.len()) as u32)
    };

    whole
        .checked_mul(WAD)
        .and_then(|scaled| scaled.checked_add(frac))
        .ok_or(MathError::Overflow("parse_wad"))
}

/// Render a WAD value as a decimal string without trailing zeros.
pub fn format_wad(value: u128) -> String {
    let whole = value / WAD;
    let frac = value % WAD;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:018}", frac);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
