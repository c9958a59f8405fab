use crate::amount;
use ethers::types::U256;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwapDirection {
    /// asset A in → asset B out → A/B ratio rises
    AToB,
    /// asset B in → asset A out → A/B ratio falls
    BToA,
}

impl SwapDirection {
    pub fn reversed(self) -> Self {
        match self {
            SwapDirection::AToB => SwapDirection::BToA,
            SwapDirection::BToA => SwapDirection::AToB,
        }
    }

    /// (input, output) reserves for a swap in this direction.
    pub fn orient(self, reserve_a: U256, reserve_b: U256) -> (U256, U256) {
        match self {
            SwapDirection::AToB => (reserve_a, reserve_b),
            SwapDirection::BToA => (reserve_b, reserve_a),
        }
    }
}

impl std::fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapDirection::AToB => write!(f, "A->B"),
            SwapDirection::BToA => write!(f, "B->A"),
        }
    }
}

/// `reserveA / reserveB` in human units; `None` when either side is empty.
pub fn reserve_ratio(reserve_a: U256, reserve_b: U256) -> Option<f64> {
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return None;
    }
    Some(amount::to_f64(reserve_a) / amount::to_f64(reserve_b))
}

/// Signed percentage deviation of the executed rate (out per in) from the
/// pre-trade reserve rate (reserve_out per reserve_in).
///
/// Returns 0.0 when any input is zero.
pub fn slippage_pct(
    amount_in: U256,
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> f64 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return 0.0;
    }
    let executed = amount::to_f64(amount_out) / amount::to_f64(amount_in);
    let pre = amount::to_f64(reserve_out) / amount::to_f64(reserve_in);
    ((executed - pre) / pre) * 100.0
}

/// Total value locked, approximated as twice the A reserve.
///
/// Only meaningful while both assets trade near 1:1 nominal value; reserve B
/// is deliberately ignored.
pub fn tvl_estimate(reserve_a: U256) -> f64 {
    amount::to_f64(reserve_a) * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;

    #[test]
    fn ratio_skips_empty_reserves() {
        assert_eq!(reserve_ratio(U256::zero(), units(5)), None);
        assert_eq!(reserve_ratio(units(5), U256::zero()), None);
        assert_eq!(reserve_ratio(units(1000), units(1500)), Some(1000.0 / 1500.0));
    }

    #[test]
    fn slippage_is_negative_when_price_moves_against_trader() {
        // 100 A in at a 1:1 pool, 90 B out.
        let s = slippage_pct(units(100), units(90), units(1000), units(1000));
        assert!((s - -10.0).abs() < 1e-9, "{s}");
    }

    #[test]
    fn slippage_zero_for_perfect_fill() {
        let s = slippage_pct(units(10), units(15), units(1000), units(1500));
        assert!(s.abs() < 1e-9);
    }

    #[test]
    fn slippage_guards_zero_inputs() {
        assert_eq!(slippage_pct(U256::zero(), units(1), units(1), units(1)), 0.0);
        assert_eq!(slippage_pct(units(1), units(1), U256::zero(), units(1)), 0.0);
    }

    #[test]
    fn tvl_doubles_reserve_a() {
        assert_eq!(tvl_estimate(units(1000)), 2000.0);
    }

    #[test]
    fn orient_follows_direction() {
        let (a, b) = (units(1), units(2));
        assert_eq!(SwapDirection::AToB.orient(a, b), (a, b));
        assert_eq!(SwapDirection::BToA.orient(a, b), (b, a));
        assert_eq!(SwapDirection::AToB.reversed(), SwapDirection::BToA);
    }
}
