//! Two-pool arbitrage: the contract call surface, outcome decoding and the
//! staged divergence scenarios.

use crate::errors::Result;
use async_trait::async_trait;
use ethers::types::Address;

pub mod evaluator;
pub mod orchestrator;
pub mod types;

pub use evaluator::decode_receipt;
pub use orchestrator::ArbitrageOrchestrator;
pub use types::{
    ArbitrageOutcome, ArbitrageReceipt, ArbitrageReport, ExecutedTrade, OrchestratorConfig, Route,
};

/// Contract that looks for and trades a price gap between two pools.
#[async_trait]
pub trait ArbitrageContract: Send + Sync {
    fn address(&self) -> Address;

    /// Attempt arbitrage as `from`. `None` means the call committed but
    /// emitted no `ArbitrageExecuted` event.
    async fn perform_arbitrage(&self, from: Address) -> Result<Option<ArbitrageReceipt>>;
}
