//! Book-keeping behind the sandbox ledger: token balances and allowances,
//! constant-product pools and the two-pool arbitrage search.

use crate::arbitrage::{ArbitrageReceipt, Route};
use crate::dex::SwapDirection;
use crate::errors::{Result, SimError};
use ethers::types::{Address, U256};
use std::collections::HashMap;

const BPS: u64 = 10_000;
/// Candidate trade sizes tried per route, as fractions of the route cap.
const SEARCH_STEPS: u64 = 64;

fn revert(call: &'static str, reason: &str) -> SimError {
    SimError::external(call, format!("reverted: {reason}"))
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TokenBook {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,
}

#[derive(Debug, Clone)]
pub(crate) struct PoolBook {
    pub token_a: Address,
    pub token_b: Address,
    pub lp_token: Address,
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub return_a: U256,
    pub return_b: U256,
    pub swap_fees: U256,
    pub fee_bps: u64,
    pub paused: bool,
}

impl PoolBook {
    fn tokens(&self, direction: SwapDirection) -> (Address, Address) {
        match direction {
            SwapDirection::AToB => (self.token_a, self.token_b),
            SwapDirection::BToA => (self.token_b, self.token_a),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ArbitrageBook {
    pub pool_1: Address,
    pub pool_2: Address,
    pub min_profit: U256,
}

/// Output of a constant-product swap after the input-side fee.
pub fn quote_out(reserve_in: U256, reserve_out: U256, amount_in: U256, fee_bps: u64) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::zero();
    }
    let fee = amount_in * U256::from(fee_bps) / U256::from(BPS);
    let net_in = amount_in - fee;
    reserve_out * net_in / (reserve_in + net_in)
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ChainState {
    deployed: u64,
    tokens: HashMap<Address, TokenBook>,
    pools: HashMap<Address, PoolBook>,
    arbitrages: HashMap<Address, ArbitrageBook>,
}

impl ChainState {
    fn next_address(&mut self) -> Address {
        self.deployed += 1;
        Address::from_low_u64_be(0xC0DE_0000 + self.deployed)
    }

    pub fn deploy_token(&mut self, supply: U256, owner: Address) -> Address {
        let address = self.next_address();
        let mut book = TokenBook::default();
        if !supply.is_zero() {
            book.balances.insert(owner, supply);
            book.total_supply = supply;
        }
        self.tokens.insert(address, book);
        address
    }

    pub fn deploy_pool(&mut self, token_a: Address, token_b: Address, fee_bps: u64) -> (Address, Address) {
        let lp_token = self.deploy_token(U256::zero(), Address::zero());
        let address = self.next_address();
        self.pools.insert(
            address,
            PoolBook {
                token_a,
                token_b,
                lp_token,
                reserve_a: U256::zero(),
                reserve_b: U256::zero(),
                return_a: U256::zero(),
                return_b: U256::zero(),
                swap_fees: U256::zero(),
                fee_bps,
                paused: false,
            },
        );
        (address, lp_token)
    }

    pub fn deploy_arbitrage(&mut self, pool_1: Address, pool_2: Address, min_profit: U256) -> Result<Address> {
        let address = self.next_address();
        for pool in [pool_1, pool_2] {
            let book = self.pool(pool, "deploy")?.clone();
            for token in [book.token_a, book.token_b] {
                self.approve(token, address, pool, U256::MAX)?;
            }
        }
        self.arbitrages.insert(
            address,
            ArbitrageBook {
                pool_1,
                pool_2,
                min_profit,
            },
        );
        Ok(address)
    }

    fn token(&self, token: Address, call: &'static str) -> Result<&TokenBook> {
        self.tokens
            .get(&token)
            .ok_or_else(|| revert(call, "unknown token"))
    }

    fn token_mut(&mut self, token: Address, call: &'static str) -> Result<&mut TokenBook> {
        self.tokens
            .get_mut(&token)
            .ok_or_else(|| revert(call, "unknown token"))
    }

    pub fn pool(&self, pool: Address, call: &'static str) -> Result<&PoolBook> {
        self.pools.get(&pool).ok_or_else(|| revert(call, "unknown pool"))
    }

    fn pool_mut(&mut self, pool: Address, call: &'static str) -> Result<&mut PoolBook> {
        self.pools
            .get_mut(&pool)
            .ok_or_else(|| revert(call, "unknown pool"))
    }

    pub fn set_paused(&mut self, pool: Address, paused: bool) -> Result<()> {
        self.pool_mut(pool, "pause")?.paused = paused;
        Ok(())
    }

    pub fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self
            .token(token, "balanceOf")?
            .balances
            .get(&owner)
            .copied()
            .unwrap_or_default())
    }

    fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        Ok(self
            .token(token, "allowance")?
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        let book = self.token_mut(token, "transfer")?;
        let from_balance = book.balances.get(&from).copied().unwrap_or_default();
        if from_balance < amount {
            return Err(revert("transfer", "insufficient balance"));
        }
        book.balances.insert(from, from_balance - amount);
        *book.balances.entry(to).or_default() += amount;
        Ok(())
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) -> Result<()> {
        self.token_mut(token, "approve")?
            .allowances
            .insert((owner, spender), amount);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        amount: U256,
        call: &'static str,
    ) -> Result<()> {
        let book = self.token_mut(token, call)?;
        let allowance = book
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(revert(call, "insufficient allowance"));
        }
        if allowance != U256::MAX {
            book.allowances.insert((owner, spender), allowance - amount);
        }
        self.transfer(token, owner, to, amount)
            .map_err(|_| revert(call, "insufficient balance"))
    }

    fn mint(&mut self, token: Address, to: Address, amount: U256) -> Result<()> {
        let book = self.token_mut(token, "mint")?;
        *book.balances.entry(to).or_default() += amount;
        book.total_supply += amount;
        Ok(())
    }

    fn burn(&mut self, token: Address, from: Address, amount: U256) -> Result<()> {
        let book = self.token_mut(token, "burn")?;
        let balance = book.balances.get(&from).copied().unwrap_or_default();
        if balance < amount {
            return Err(revert("withdrawTokens", "insufficient LP balance"));
        }
        book.balances.insert(from, balance - amount);
        book.total_supply -= amount;
        Ok(())
    }

    pub fn deposit(&mut self, pool: Address, from: Address, amount_a: U256, amount_b: U256) -> Result<()> {
        const CALL: &str = "depositTokens";
        let book = self.pool(pool, CALL)?.clone();
        if book.paused {
            return Err(revert(CALL, "paused"));
        }
        if amount_a.is_zero() || amount_b.is_zero() {
            return Err(revert(CALL, "zero amount"));
        }
        let supply = self.token(book.lp_token, CALL)?.total_supply;
        let minted = if supply.is_zero() || book.reserve_a.is_zero() || book.reserve_b.is_zero() {
            amount_a
        } else {
            // Amounts must follow the reserve ratio to within 1%.
            let lhs = amount_a * book.reserve_b;
            let rhs = amount_b * book.reserve_a;
            let gap = if lhs > rhs { lhs - rhs } else { rhs - lhs };
            if gap * U256::from(100u8) > lhs {
                return Err(revert(CALL, "ratio mismatch"));
            }
            (amount_a * supply / book.reserve_a).min(amount_b * supply / book.reserve_b)
        };
        if minted.is_zero() {
            return Err(revert(CALL, "nothing to mint"));
        }
        self.transfer_from(book.token_a, pool, from, pool, amount_a, CALL)?;
        self.transfer_from(book.token_b, pool, from, pool, amount_b, CALL)?;
        self.mint(book.lp_token, from, minted)?;
        let book = self.pool_mut(pool, CALL)?;
        book.reserve_a += amount_a;
        book.reserve_b += amount_b;
        Ok(())
    }

    pub fn withdraw(&mut self, pool: Address, from: Address, shares: U256) -> Result<()> {
        const CALL: &str = "withdrawTokens";
        let book = self.pool(pool, CALL)?.clone();
        if book.paused {
            return Err(revert(CALL, "paused"));
        }
        let supply = self.token(book.lp_token, CALL)?.total_supply;
        if shares.is_zero() || supply.is_zero() {
            return Err(revert(CALL, "zero amount"));
        }
        let amount_a = shares * book.reserve_a / supply;
        let amount_b = shares * book.reserve_b / supply;
        self.burn(book.lp_token, from, shares)?;
        self.transfer(book.token_a, pool, from, amount_a)?;
        self.transfer(book.token_b, pool, from, amount_b)?;
        let book = self.pool_mut(pool, CALL)?;
        book.reserve_a -= amount_a;
        book.reserve_b -= amount_b;
        book.return_a = amount_a;
        book.return_b = amount_b;
        Ok(())
    }

    pub fn swap(
        &mut self,
        pool: Address,
        payer: Address,
        direction: SwapDirection,
        amount_in: U256,
    ) -> Result<U256> {
        let call = match direction {
            SwapDirection::AToB => "swapAToB",
            SwapDirection::BToA => "swapBToA",
        };
        let book = self.pool(pool, call)?.clone();
        if book.paused {
            return Err(revert(call, "paused"));
        }
        let (reserve_in, reserve_out) = direction.orient(book.reserve_a, book.reserve_b);
        let amount_out = quote_out(reserve_in, reserve_out, amount_in, book.fee_bps);
        if amount_out.is_zero() || amount_out >= reserve_out {
            return Err(revert(call, "insufficient output"));
        }
        let fee = amount_in * U256::from(book.fee_bps) / U256::from(BPS);
        let (token_in, token_out) = book.tokens(direction);
        self.transfer_from(token_in, pool, payer, pool, amount_in, call)?;
        self.transfer(token_out, pool, payer, amount_out)?;

        let book = self.pool_mut(pool, call)?;
        match direction {
            SwapDirection::AToB => {
                book.reserve_a += amount_in;
                book.reserve_b -= amount_out;
                book.return_b = amount_out;
            }
            SwapDirection::BToA => {
                book.reserve_b += amount_in;
                book.reserve_a -= amount_out;
                book.return_a = amount_out;
            }
        }
        book.swap_fees = fee;
        Ok(amount_out)
    }

    /// Search both cycles for the direction of the gap and trade the best one.
    pub fn perform_arbitrage(&mut self, arbitrage: Address, caller: Address) -> Result<ArbitrageReceipt> {
        const CALL: &str = "performArbitrage";
        let arb = self
            .arbitrages
            .get(&arbitrage)
            .cloned()
            .ok_or_else(|| revert(CALL, "unknown arbitrage contract"))?;
        let p1 = self.pool(arb.pool_1, CALL)?.clone();
        let p2 = self.pool(arb.pool_2, CALL)?.clone();

        // B per A in each pool, compared by cross-multiplication.
        let price_1 = p1.reserve_b * p2.reserve_a;
        let price_2 = p2.reserve_b * p1.reserve_a;
        if price_1 == price_2 {
            return Ok(receipt(0, U256::zero(), U256::zero()));
        }

        // (route, first pool, second pool, first-hop direction)
        let candidates = if price_1 > price_2 {
            // A is dearer in pool 1.
            [
                (Route::BabPool2First, &p2, arb.pool_2, &p1, arb.pool_1, SwapDirection::BToA),
                (Route::AbaPool1First, &p1, arb.pool_1, &p2, arb.pool_2, SwapDirection::AToB),
            ]
        } else {
            [
                (Route::BabPool1First, &p1, arb.pool_1, &p2, arb.pool_2, SwapDirection::BToA),
                (Route::AbaPool2First, &p2, arb.pool_2, &p1, arb.pool_1, SwapDirection::AToB),
            ]
        };

        let mut best: Option<(Route, Address, Address, SwapDirection, U256, U256)> = None;
        for (route, first, first_addr, second, second_addr, direction) in candidates {
            let (token_in, _) = first.tokens(direction);
            let balance = self
                .balance_of(token_in, caller)?
                .min(self.allowance(token_in, caller, arbitrage)?);
            let (first_in, first_out) = direction.orient(first.reserve_a, first.reserve_b);
            let (second_in, second_out) = direction.reversed().orient(second.reserve_a, second.reserve_b);
            let cap = balance.min(first_in / U256::from(10u8));
            for step in 1..=SEARCH_STEPS {
                let amount = cap * U256::from(step) / U256::from(SEARCH_STEPS);
                let mid = quote_out(first_in, first_out, amount, first.fee_bps);
                let back = quote_out(second_in, second_out, mid, second.fee_bps);
                if back > amount && back - amount > arb.min_profit {
                    let profit = back - amount;
                    if best.as_ref().is_none_or(|b| profit > b.5) {
                        best = Some((route, first_addr, second_addr, direction, amount, profit));
                    }
                }
            }
        }

        let Some((route, first, second, direction, amount, _)) = best else {
            return Ok(receipt(5, U256::zero(), U256::zero()));
        };
        let (token_in, _) = p1.tokens(direction);
        self.transfer_from(token_in, arbitrage, caller, arbitrage, amount, CALL)?;
        let mid = self.swap(first, arbitrage, direction, amount)?;
        let back = self.swap(second, arbitrage, direction.reversed(), mid)?;
        if back <= amount {
            return Err(revert(CALL, "trade lost value"));
        }
        self.transfer(token_in, arbitrage, caller, back)?;
        Ok(receipt(route.code(), amount, back - amount))
    }
}

fn receipt(code: u64, amount_chosen: U256, profit_achieved: U256) -> ArbitrageReceipt {
    ArbitrageReceipt {
        action_type: U256::from(code),
        amount_chosen,
        profit_achieved,
    }
}
