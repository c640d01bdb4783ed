//! Marketplace service-fee arithmetic.
//!
//! Fees are expressed in basis points (10000 = 100%) and rounded down,
//! matching the integer division the marketplace contract performs.

use crate::infra::{MarketError, Result};

/// Denominator for basis-point fees.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// `floor(price * fee_bps / 10000)`.
pub fn service_fee(price: i64, fee_bps: i64) -> Result<i64> {
    if price < 0 || fee_bps < 0 || fee_bps > BPS_DENOMINATOR {
        return Err(MarketError::Internal(format!(
            "fee inputs out of range: price={price} fee_bps={fee_bps}"
        )));
    }
    let fee = (price as i128) * (fee_bps as i128) / (BPS_DENOMINATOR as i128);
    i64::try_from(fee).map_err(|_| MarketError::Internal(format!("fee overflow for price {price}")))
}

/// Total amount a buyer must attach: price plus service fee.
pub fn total_due(price: i64, fee_bps: i64) -> Result<i64> {
    let fee = service_fee(price, fee_bps)?;
    price
        .checked_add(fee)
        .ok_or_else(|| MarketError::Internal(format!("total due overflow for price {price}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_rounds_down() {
        // 90 * 250 / 10000 = 2.25 -> 2
        assert_eq!(service_fee(90, 250).unwrap(), 2);
        assert_eq!(total_due(90, 250).unwrap(), 92);
    }

    #[test]
    fn zero_fee_is_identity() {
        assert_eq!(total_due(1_000_000, 0).unwrap(), 1_000_000);
    }

    #[test]
    fn full_fee_doubles() {
        assert_eq!(total_due(77, 10_000).unwrap(), 154);
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        assert!(service_fee(-1, 250).is_err());
        assert!(service_fee(100, -1).is_err());
        assert!(service_fee(100, 10_001).is_err());
    }
}
