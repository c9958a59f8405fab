use super::{AssetPair, Ledger, Pool, SwapDirection, calc};
use crate::errors::Result;
use ethers::types::{Address, U256};

/// Immutable view of one pool and one actor's balances, taken for a single
/// decision.
///
/// The four reads are issued together and nothing the simulator submits can
/// land between them. The ledger offers no atomic multi-read, so a
/// transaction from a third party could still slip in; that drift is
/// accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolSnapshot {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub balance_a: U256,
    pub balance_b: U256,
}

impl PoolSnapshot {
    pub fn new(reserve_a: U256, reserve_b: U256, balance_a: U256, balance_b: U256) -> Self {
        Self {
            reserve_a,
            reserve_b,
            balance_a,
            balance_b,
        }
    }

    /// Read reserves and `actor`'s balances of both assets.
    pub async fn read<P, L>(pool: &P, assets: &AssetPair<L>, actor: Address) -> Result<Self>
    where
        P: Pool,
        L: Ledger,
    {
        let (reserve_a, reserve_b, balance_a, balance_b) = futures::try_join!(
            pool.reserve_a(),
            pool.reserve_b(),
            assets.token_a.balance_of(actor),
            assets.token_b.balance_of(actor),
        )?;
        Ok(Self::new(reserve_a, reserve_b, balance_a, balance_b))
    }

    pub fn is_funded(&self) -> bool {
        !self.reserve_a.is_zero() && !self.reserve_b.is_zero()
    }

    pub fn ratio(&self) -> Option<f64> {
        calc::reserve_ratio(self.reserve_a, self.reserve_b)
    }

    /// (input reserve, output reserve) for a swap in `direction`.
    pub fn reserves_for(&self, direction: SwapDirection) -> (U256, U256) {
        direction.orient(self.reserve_a, self.reserve_b)
    }

    /// Actor balance of the asset a swap in `direction` pays in.
    pub fn balance_for(&self, direction: SwapDirection) -> U256 {
        match direction {
            SwapDirection::AToB => self.balance_a,
            SwapDirection::BToA => self.balance_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;

    #[test]
    fn orientation_helpers() {
        let snap = PoolSnapshot::new(units(1000), units(1500), units(7), units(9));
        assert!(snap.is_funded());
        assert_eq!(snap.reserves_for(SwapDirection::BToA), (units(1500), units(1000)));
        assert_eq!(snap.balance_for(SwapDirection::AToB), units(7));
        assert_eq!(snap.balance_for(SwapDirection::BToA), units(9));
    }

    #[test]
    fn empty_pool_has_no_ratio() {
        let snap = PoolSnapshot::new(U256::zero(), units(1), units(1), units(1));
        assert!(!snap.is_funded());
        assert_eq!(snap.ratio(), None);
    }
}
