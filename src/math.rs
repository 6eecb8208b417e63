// 2.0: checked integer helpers for micro-unit arithmetic.
// products go through u128/i128 so amount * shares never overflows before the divide.
// every helper floors and returns None on overflow or a zero denominator.

use crate::types::Bps;

pub fn mul_div(value: u64, numerator: u64, denominator: u64) -> Option<u64> {
    if denominator == 0 {
        return None;
    }
    let product = (value as u128).checked_mul(numerator as u128)?;
    u64::try_from(product / denominator as u128).ok()
}

// value * bps / 10_000. bps must be non-negative here; fees never go below zero.
pub fn mul_bps(value: u64, bps: Bps) -> Option<u64> {
    let bps = u64::try_from(bps.value()).ok()?;
    mul_div(value, bps, Bps::DENOMINATOR)
}

// signed variant for funding: size * index_delta / precision, truncated toward zero
pub fn mul_div_signed(value: i128, numerator: i128, denominator: i128) -> Option<i128> {
    if denominator == 0 {
        return None;
    }
    value.checked_mul(numerator)?.checked_div(denominator)
}

// split a fee between treasury and BLP. treasury gets the floored share, BLP the remainder,
// so the two halves always sum to the fee exactly.
pub fn split_fee(fee: u64, treasury_share: Bps) -> Option<(u64, u64)> {
    let to_treasury = mul_bps(fee, treasury_share)?;
    let to_blp = fee.checked_sub(to_treasury)?;
    Some((to_treasury, to_blp))
}
