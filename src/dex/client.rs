//! On-chain handles for the token, pool and arbitrage contracts, driven
//! through an `eth_accounts`-unlocked node over HTTP.

use crate::arbitrage::{ArbitrageContract, ArbitrageReceipt};
use crate::dex::{Ledger, Pool};
use crate::errors::{Result, SimError};
use async_trait::async_trait;
use ethers::{
    abi::{Detokenize, RawLog},
    contract::{ContractCall, EthLogDecode, abigen},
    providers::{Http, Middleware, Provider},
    types::{Address, TransactionReceipt, U64, U256},
};
use std::sync::Arc;
use tracing::debug;
use url::Url;

abigen!(
    Token,
    r"[
        function balanceOf(address owner) view returns (uint256)
        function transfer(address to, uint256 amount) returns (bool)
        function approve(address spender, uint256 amount) returns (bool)
    ]",
);

abigen!(
    DexPool,
    r"[
        function reserveA() view returns (uint256)
        function reserveB() view returns (uint256)
        function returnA() view returns (uint256)
        function returnB() view returns (uint256)
        function swapFees() view returns (uint256)
        function lpToken() view returns (address)
        function depositTokens(uint256 amountA, uint256 amountB)
        function withdrawTokens(uint256 lpAmount)
        function swapAToB(uint256 amountA)
        function swapBToA(uint256 amountB)
    ]",
);

abigen!(
    ArbitrageBot,
    r"[
        function performArbitrage()
        event ArbitrageExecuted(uint256 amountChosen, uint256 actionType, uint256 profitAchieved)
    ]",
);

type Client = Provider<Http>;

/// HTTP provider for `rpc_url`.
pub fn connect(rpc_url: &str) -> Result<Arc<Client>> {
    let url = Url::parse(rpc_url)?;
    Ok(Arc::new(Provider::new(Http::new(url))))
}

/// Accounts the node signs for, in node order.
pub async fn unlocked_accounts(provider: &Client) -> Result<Vec<Address>> {
    Ok(provider.get_accounts().await?)
}

/// Send `call` from `from` and wait for its receipt; a status-0 receipt is a revert.
async fn send_tx<D>(
    call: ContractCall<Client, D>,
    name: &'static str,
    from: Address,
) -> Result<TransactionReceipt>
where
    D: Detokenize + Send + Sync + 'static,
{
    let call = call.from(from);
    let pending = call.send().await.map_err(|e| SimError::external(name, e))?;
    let receipt = pending
        .await
        .map_err(|e| SimError::external(name, e))?
        .ok_or_else(|| SimError::external(name, "transaction dropped without a receipt"))?;
    if receipt.status == Some(U64::zero()) {
        return Err(SimError::external(
            name,
            format!("reverted in {:?}", receipt.transaction_hash),
        ));
    }
    debug!(call = name, tx = ?receipt.transaction_hash, "[CHAIN] committed");
    Ok(receipt)
}

/// Handle for an ERC-20 token contract.
#[derive(Clone)]
pub struct ContractToken {
    token: Token<Client>,
}

impl ContractToken {
    pub fn new(provider: Arc<Client>, address: Address) -> Self {
        Self {
            token: Token::new(address, provider),
        }
    }
}

#[async_trait]
impl Ledger for ContractToken {
    fn address(&self) -> Address {
        self.token.address()
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.token
            .balance_of(owner)
            .from(owner)
            .call()
            .await
            .map_err(|e| SimError::external("balanceOf", e))
    }

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<()> {
        send_tx(self.token.transfer(to, amount), "transfer", from).await?;
        Ok(())
    }

    async fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        send_tx(self.token.approve(spender, amount), "approve", owner).await?;
        Ok(())
    }
}

/// Handle for a deployed DEX pool and its LP share token.
#[derive(Clone)]
pub struct ContractPool {
    pool: DexPool<Client>,
    shares: ContractToken,
}

impl ContractPool {
    /// Bind to the pool at `address` and resolve its LP token.
    pub async fn connect(provider: Arc<Client>, address: Address) -> Result<Self> {
        let pool = DexPool::new(address, provider.clone());
        let lp_address = pool
            .lp_token()
            .call()
            .await
            .map_err(|e| SimError::MissingArtifact(format!("pool {address:?} lpToken(): {e}")))?;
        Ok(Self {
            pool,
            shares: ContractToken::new(provider, lp_address),
        })
    }
}

#[async_trait]
impl Pool for ContractPool {
    type Shares = ContractToken;

    fn address(&self) -> Address {
        self.pool.address()
    }

    fn lp_token(&self) -> &ContractToken {
        &self.shares
    }

    async fn reserve_a(&self) -> Result<U256> {
        self.pool
            .reserve_a()
            .call()
            .await
            .map_err(|e| SimError::external("reserveA", e))
    }

    async fn reserve_b(&self) -> Result<U256> {
        self.pool
            .reserve_b()
            .call()
            .await
            .map_err(|e| SimError::external("reserveB", e))
    }

    async fn deposit_tokens(&self, from: Address, amount_a: U256, amount_b: U256) -> Result<()> {
        send_tx(
            self.pool.deposit_tokens(amount_a, amount_b),
            "depositTokens",
            from,
        )
        .await?;
        Ok(())
    }

    async fn withdraw_tokens(&self, from: Address, shares: U256) -> Result<()> {
        send_tx(self.pool.withdraw_tokens(shares), "withdrawTokens", from).await?;
        Ok(())
    }

    async fn swap_a_to_b(&self, from: Address, amount_in: U256) -> Result<()> {
        send_tx(self.pool.swap_a_to_b(amount_in), "swapAToB", from).await?;
        Ok(())
    }

    async fn swap_b_to_a(&self, from: Address, amount_in: U256) -> Result<()> {
        send_tx(self.pool.swap_b_to_a(amount_in), "swapBToA", from).await?;
        Ok(())
    }

    async fn return_a(&self, from: Address) -> Result<U256> {
        self.pool
            .return_a()
            .from(from)
            .call()
            .await
            .map_err(|e| SimError::external("returnA", e))
    }

    async fn return_b(&self, from: Address) -> Result<U256> {
        self.pool
            .return_b()
            .from(from)
            .call()
            .await
            .map_err(|e| SimError::external("returnB", e))
    }

    async fn swap_fees(&self, from: Address) -> Result<U256> {
        self.pool
            .swap_fees()
            .from(from)
            .call()
            .await
            .map_err(|e| SimError::external("swapFees", e))
    }
}

/// Handle for the two-pool arbitrage contract.
#[derive(Clone)]
pub struct ContractArbitrage {
    contract: ArbitrageBot<Client>,
}

impl ContractArbitrage {
    pub fn new(provider: Arc<Client>, address: Address) -> Self {
        Self {
            contract: ArbitrageBot::new(address, provider),
        }
    }
}

#[async_trait]
impl ArbitrageContract for ContractArbitrage {
    fn address(&self) -> Address {
        self.contract.address()
    }

    async fn perform_arbitrage(&self, from: Address) -> Result<Option<ArbitrageReceipt>> {
        let receipt = send_tx(
            self.contract.perform_arbitrage(),
            "performArbitrage",
            from,
        )
        .await?;
        let own = self.contract.address();
        let decoded = receipt
            .logs
            .iter()
            .filter(|log| log.address == own)
            .find_map(|log| {
                let raw = RawLog {
                    topics: log.topics.clone(),
                    data: log.data.to_vec(),
                };
                ArbitrageExecutedFilter::decode_log(&raw).ok()
            });
        Ok(decoded.map(|event| ArbitrageReceipt {
            action_type: event.action_type,
            amount_chosen: event.amount_chosen,
            profit_achieved: event.profit_achieved,
        }))
    }
}
