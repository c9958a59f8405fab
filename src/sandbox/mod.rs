//! In-process ledger standing in for a chain.
//!
//! Tokens, constant-product pools and the arbitrage contract share one
//! [`ChainState`] behind a mutex. Every mutating call runs against a copy of
//! the state and is committed only if it succeeds, so a rejected call leaves
//! nothing behind, like a reverted transaction.

use crate::arbitrage::{ArbitrageContract, ArbitrageReceipt};
use crate::dex::{Ledger, Pool, SwapDirection};
use crate::errors::Result;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use parking_lot::Mutex;
use std::sync::Arc;

mod state;

pub use state::quote_out;
use state::ChainState;

/// Fee charged on swap input, in basis points.
pub const DEFAULT_FEE_BPS: u64 = 30;

#[derive(Clone, Default)]
pub struct Sandbox {
    chain: Arc<Mutex<ChainState>>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Externally owned accounts `0x..01` through `0x..n`.
    pub fn accounts(count: u64) -> Vec<Address> {
        (1..=count).map(Address::from_low_u64_be).collect()
    }

    fn read<T>(&self, f: impl FnOnce(&ChainState) -> Result<T>) -> Result<T> {
        f(&self.chain.lock())
    }

    fn transact<T>(&self, f: impl FnOnce(&mut ChainState) -> Result<T>) -> Result<T> {
        let mut chain = self.chain.lock();
        let mut next = chain.clone();
        let value = f(&mut next)?;
        *chain = next;
        Ok(value)
    }

    pub fn deploy_token(&self, supply: U256, owner: Address) -> SandboxToken {
        let address = self.chain.lock().deploy_token(supply, owner);
        SandboxToken {
            sandbox: self.clone(),
            address,
        }
    }

    pub fn deploy_pool(&self, token_a: &SandboxToken, token_b: &SandboxToken) -> SandboxPool {
        self.deploy_pool_with_fee(token_a, token_b, DEFAULT_FEE_BPS)
    }

    pub fn deploy_pool_with_fee(
        &self,
        token_a: &SandboxToken,
        token_b: &SandboxToken,
        fee_bps: u64,
    ) -> SandboxPool {
        let (address, lp_token) = self
            .chain
            .lock()
            .deploy_pool(token_a.address, token_b.address, fee_bps);
        SandboxPool {
            address,
            lp_token: SandboxToken {
                sandbox: self.clone(),
                address: lp_token,
            },
        }
    }

    /// Deploy an arbitrage contract over two pools of the same asset pair.
    /// Trades only when the best route clears `min_profit`.
    pub fn deploy_arbitrage(
        &self,
        pool_1: &SandboxPool,
        pool_2: &SandboxPool,
        min_profit: U256,
    ) -> Result<SandboxArbitrage> {
        let address = self.transact(|chain| {
            chain.deploy_arbitrage(pool_1.address, pool_2.address, min_profit)
        })?;
        Ok(SandboxArbitrage {
            sandbox: self.clone(),
            address,
        })
    }

    /// Make every mutating call on `pool` revert until unpaused.
    pub fn set_paused(&self, pool: &SandboxPool, paused: bool) -> Result<()> {
        self.transact(|chain| chain.set_paused(pool.address, paused))
    }
}

#[derive(Clone)]
pub struct SandboxToken {
    sandbox: Sandbox,
    address: Address,
}

#[async_trait]
impl Ledger for SandboxToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.sandbox.read(|chain| chain.balance_of(self.address, owner))
    }

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.sandbox
            .transact(|chain| chain.transfer(self.address, from, to, amount))
    }

    async fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        self.sandbox
            .transact(|chain| chain.approve(self.address, owner, spender, amount))
    }
}

#[derive(Clone)]
pub struct SandboxPool {
    address: Address,
    lp_token: SandboxToken,
}

impl SandboxPool {
    fn sandbox(&self) -> &Sandbox {
        &self.lp_token.sandbox
    }

    fn field(&self, call: &'static str, pick: fn(&state::PoolBook) -> U256) -> Result<U256> {
        self.sandbox()
            .read(|chain| chain.pool(self.address, call).map(pick))
    }
}

#[async_trait]
impl Pool for SandboxPool {
    type Shares = SandboxToken;

    fn address(&self) -> Address {
        self.address
    }

    fn lp_token(&self) -> &SandboxToken {
        &self.lp_token
    }

    async fn reserve_a(&self) -> Result<U256> {
        self.field("reserveA", |p| p.reserve_a)
    }

    async fn reserve_b(&self) -> Result<U256> {
        self.field("reserveB", |p| p.reserve_b)
    }

    async fn deposit_tokens(&self, from: Address, amount_a: U256, amount_b: U256) -> Result<()> {
        self.sandbox()
            .transact(|chain| chain.deposit(self.address, from, amount_a, amount_b))
    }

    async fn withdraw_tokens(&self, from: Address, shares: U256) -> Result<()> {
        self.sandbox()
            .transact(|chain| chain.withdraw(self.address, from, shares))
    }

    async fn swap_a_to_b(&self, from: Address, amount_in: U256) -> Result<()> {
        self.sandbox()
            .transact(|chain| chain.swap(self.address, from, SwapDirection::AToB, amount_in))
            .map(drop)
    }

    async fn swap_b_to_a(&self, from: Address, amount_in: U256) -> Result<()> {
        self.sandbox()
            .transact(|chain| chain.swap(self.address, from, SwapDirection::BToA, amount_in))
            .map(drop)
    }

    async fn return_a(&self, _from: Address) -> Result<U256> {
        self.field("returnA", |p| p.return_a)
    }

    async fn return_b(&self, _from: Address) -> Result<U256> {
        self.field("returnB", |p| p.return_b)
    }

    async fn swap_fees(&self, _from: Address) -> Result<U256> {
        self.field("swapFees", |p| p.swap_fees)
    }
}

#[derive(Clone)]
pub struct SandboxArbitrage {
    sandbox: Sandbox,
    address: Address,
}

#[async_trait]
impl ArbitrageContract for SandboxArbitrage {
    fn address(&self) -> Address {
        self.address
    }

    async fn perform_arbitrage(&self, from: Address) -> Result<Option<ArbitrageReceipt>> {
        self.sandbox
            .transact(|chain| chain.perform_arbitrage(self.address, from))
            .map(Some)
    }
}
