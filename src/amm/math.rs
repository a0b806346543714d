use crate::constants::{FEE_DENOMINATOR, FEE_NUMERATOR};
use crate::error::{ConverterError, Result};
use alloy_primitives::U256;

/// Babylonian integer square root, truncating toward zero.
pub fn sqrt(y: U256) -> U256 {
    if y > U256::from(3) {
        let two = U256::from(2);
        let mut z = y;
        let mut x = y / two + U256::ONE;
        while x < z {
            z = x;
            x = (y / x + x) / two;
        }
        z
    } else if !y.is_zero() {
        U256::ONE
    } else {
        U256::ZERO
    }
}

/// Exact-input constant-product output with the 0.3% fee applied on the way
/// in. Every division truncates toward zero, so the taker always receives
/// the fractionally smaller side of the quote.
///
/// `amount_out = amount_in * 997 * reserve_out / (reserve_in * 1000 + amount_in * 997)`
pub fn amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Result<U256> {
    if amount_in.is_zero() {
        return Err(ConverterError::InsufficientInputAmount);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(ConverterError::InsufficientLiquidity);
    }

    let amount_in_with_fee = amount_in * U256::from(FEE_NUMERATOR);
    let numerator = amount_in_with_fee * reserve_out;
    let denominator = reserve_in * U256::from(FEE_DENOMINATOR) + amount_in_with_fee;
    Ok(numerator / denominator)
}
