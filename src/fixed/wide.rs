//! 256-bit intermediates for `mul_div`
//!
//! A 256-bit value is carried as `(hi, lo)` halves of `u128`.

const LOW_MASK: u128 = (1u128 << 64) - 1;

/// Full 128x128 -> 256-bit product, returned as `(hi, lo)`.
pub(super) fn full_mul(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & LOW_MASK);
    let (b_hi, b_lo) = (b >> 64, b & LOW_MASK);

    let lo_lo = a_lo * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_lo = a_hi * b_lo;
    let hi_hi = a_hi * b_hi;

    // Each term is < 2^64, so the sum is < 3 * 2^64.
    let middle = (lo_lo >> 64) + (lo_hi & LOW_MASK) + (hi_lo & LOW_MASK);

    let lo = (lo_lo & LOW_MASK) | (middle << 64);
    let hi = hi_hi + (lo_hi >> 64) + (hi_lo >> 64) + (middle >> 64);
    (hi, lo)
}

/// Divide the 256-bit value `(hi, lo)` by `divisor`.
///
/// Requires `hi < divisor` so the quotient fits in 128 bits.
/// Returns `(quotient, remainder)`.
pub(super) fn div_wide(hi: u128, lo: u128, divisor: u128) -> (u128, u128) {
    debug_assert!(divisor != 0 && hi < divisor);

    let mut remainder = hi;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        // remainder < divisor holds here; shifting may carry past 2^128
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= divisor {
            remainder = remainder.wrapping_sub(divisor);
            quotient |= 1;
        }
    }
    (quotient, remainder)
}
