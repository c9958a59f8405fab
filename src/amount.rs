//! Fixed-point conversions between human decimal quantities and the 18-digit
//! integer base units the ledger works in.

use crate::errors::{Result, SimError};
use bigdecimal::BigDecimal;
use ethers::types::U256;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use std::str::FromStr;

/// Fractional digits carried by every ledger amount.
pub const DECIMALS: usize = 18;

/// One human unit expressed in base units (10^18).
pub fn one() -> U256 {
    U256::exp10(DECIMALS)
}

/// `n` whole human units in base units.
pub fn units(n: u64) -> U256 {
    U256::from(n) * one()
}

/// Parse a non-negative decimal string into base units.
///
/// Digits past the 18th fractional place are truncated, never rounded up.
pub fn to_base_units(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(SimError::MalformedAmount(format!("`{input}`")));
    }
    let parsed = BigDecimal::from_str(trimmed)
        .map_err(|e| SimError::MalformedAmount(format!("`{trimmed}`: {e}")))?;
    if parsed.sign() == Sign::Minus {
        return Err(SimError::MalformedAmount(format!("`{trimmed}` is negative")));
    }
    let (digits, _scale) = parsed.with_scale(DECIMALS as i64).into_bigint_and_exponent();
    U256::from_dec_str(&digits.to_string())
        .map_err(|_| SimError::MalformedAmount(format!("`{trimmed}` exceeds 256-bit range")))
}

/// Render base units as a decimal string with trailing zeros trimmed.
pub fn to_decimal_string(value: U256) -> String {
    let raw = value.to_string();
    let (int_part, frac_part) = if raw.len() > DECIMALS {
        let (i, f) = raw.split_at(raw.len() - DECIMALS);
        (i.to_string(), f.to_string())
    } else {
        ("0".to_string(), format!("{raw:0>width$}", width = DECIMALS))
    };
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac}")
    }
}

/// Lossy floating view used by the metrics pipeline.
pub fn to_f64(value: U256) -> f64 {
    BigInt::from_str(&value.to_string())
        .ok()
        .and_then(|raw| BigDecimal::new(raw, DECIMALS as i64).to_f64())
        .unwrap_or(0.0)
}

/// Base units for a value produced by floating arithmetic, fixed to 18 places first.
pub fn from_f64(value: f64) -> Result<U256> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::MalformedAmount(format!("{value}")));
    }
    to_base_units(&format!("{value:.18}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_integers_and_fractions() {
        assert_eq!(to_base_units("1").unwrap(), one());
        assert_eq!(
            to_base_units("1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(to_base_units("0.000000000000000001").unwrap(), U256::one());
        assert_eq!(to_base_units(" 1000 ").unwrap(), units(1000));
    }

    #[test]
    fn truncates_past_eighteen_digits() {
        assert_eq!(to_base_units("0.0000000000000000019").unwrap(), U256::one());
        assert_eq!(
            to_base_units("1.9999999999999999999").unwrap(),
            units(2) - U256::one()
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "abc", "-1", "1.2.3", "--5"] {
            assert!(
                matches!(to_base_units(bad), Err(SimError::MalformedAmount(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overflow() {
        let huge = format!("1{}", "0".repeat(80));
        assert!(matches!(
            to_base_units(&huge),
            Err(SimError::MalformedAmount(_))
        ));
    }

    #[test]
    fn renders_like_ether_units() {
        assert_eq!(to_decimal_string(U256::zero()), "0");
        assert_eq!(to_decimal_string(units(1500)), "1500");
        assert_eq!(to_decimal_string(U256::one()), "0.000000000000000001");
        assert_eq!(
            to_decimal_string(U256::from(2_250_000_000_000_000_000u128)),
            "2.25"
        );
    }

    #[test]
    fn float_helpers() {
        assert_eq!(to_f64(units(3) / U256::from(2u8)), 1.5);
        assert_eq!(from_f64(150.0).unwrap(), units(150));
        assert!(from_f64(-1.0).is_err());
        assert!(from_f64(f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn decimal_round_trip(int in 0u64..u64::MAX, frac in "[0-9]{0,18}") {
            let text = if frac.is_empty() { int.to_string() } else { format!("{int}.{frac}") };
            let rendered = to_decimal_string(to_base_units(&text).unwrap());
            let expected = BigDecimal::from_str(&text).unwrap();
            prop_assert_eq!(BigDecimal::from_str(&rendered).unwrap(), expected);
        }

        #[test]
        fn base_unit_round_trip(raw in any::<u128>()) {
            let value = U256::from(raw);
            prop_assert_eq!(to_base_units(&to_decimal_string(value)).unwrap(), value);
        }
    }
}
