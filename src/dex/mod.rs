//! Call surface of the external token ledger and AMM pool contracts.
//!
//! The simulator never looks inside these collaborators; everything it knows
//! about a pool comes through [`Ledger`] and [`Pool`]. Each state-mutating
//! call names the acting identity and resolves once the ledger has committed
//! (or rejected) the transaction.

use crate::errors::Result;
use async_trait::async_trait;
use ethers::types::{Address, U256};

pub mod calc;
pub mod client;
pub mod state;

pub use calc::{SwapDirection, reserve_ratio, slippage_pct, tvl_estimate};
pub use client::{ContractArbitrage, ContractPool, ContractToken};
pub use state::PoolSnapshot;

/// ERC-20 style token ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    fn address(&self) -> Address;

    async fn balance_of(&self, owner: Address) -> Result<U256>;

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<()>;

    async fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<()>;
}

/// Two-asset constant-product pool.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Ledger of the pool's LP share token.
    type Shares: Ledger;

    fn address(&self) -> Address;

    fn lp_token(&self) -> &Self::Shares;

    async fn reserve_a(&self) -> Result<U256>;

    async fn reserve_b(&self) -> Result<U256>;

    async fn deposit_tokens(&self, from: Address, amount_a: U256, amount_b: U256) -> Result<()>;

    async fn withdraw_tokens(&self, from: Address, shares: U256) -> Result<()>;

    async fn swap_a_to_b(&self, from: Address, amount_in: U256) -> Result<()>;

    async fn swap_b_to_a(&self, from: Address, amount_in: U256) -> Result<()>;

    /// Asset A paid out by the last swap or withdrawal.
    async fn return_a(&self, from: Address) -> Result<U256>;

    /// Asset B paid out by the last swap or withdrawal.
    async fn return_b(&self, from: Address) -> Result<U256>;

    async fn swap_fees(&self, from: Address) -> Result<U256>;

    async fn swap(&self, from: Address, direction: SwapDirection, amount_in: U256) -> Result<()> {
        match direction {
            SwapDirection::AToB => self.swap_a_to_b(from, amount_in).await,
            SwapDirection::BToA => self.swap_b_to_a(from, amount_in).await,
        }
    }

    /// Output of the last swap in the given direction.
    async fn swap_output(&self, from: Address, direction: SwapDirection) -> Result<U256> {
        match direction {
            SwapDirection::AToB => self.return_b(from).await,
            SwapDirection::BToA => self.return_a(from).await,
        }
    }
}

/// The two assets of a pool pair, A and B.
pub struct AssetPair<L> {
    pub token_a: L,
    pub token_b: L,
}

impl<L: Ledger> AssetPair<L> {
    pub fn new(token_a: L, token_b: L) -> Self {
        Self { token_a, token_b }
    }
}
