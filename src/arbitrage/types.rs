use ethers::types::{Address, U256};
use serde::Serialize;

/// Raw `ArbitrageExecuted` payload, all fields in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrageReceipt {
    pub action_type: U256,
    pub amount_chosen: U256,
    pub profit_achieved: U256,
}

/// Which cycle the contract traded and which pool it hit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    /// B → A → B, pool 1 then pool 2.
    BabPool1First,
    /// A → B → A, pool 2 then pool 1.
    AbaPool2First,
    /// B → A → B, pool 2 then pool 1.
    BabPool2First,
    /// A → B → A, pool 1 then pool 2.
    AbaPool1First,
}

impl Route {
    pub fn code(self) -> u64 {
        match self {
            Route::BabPool1First => 1,
            Route::AbaPool2First => 2,
            Route::BabPool2First => 3,
            Route::AbaPool1First => 4,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::BabPool1First => write!(f, "B -> A -> B, from pool 1 to pool 2"),
            Route::AbaPool2First => write!(f, "A -> B -> A, from pool 2 to pool 1"),
            Route::BabPool2First => write!(f, "B -> A -> B, from pool 2 to pool 1"),
            Route::AbaPool1First => write!(f, "A -> B -> A, from pool 1 to pool 2"),
        }
    }
}

/// Classification of one `performArbitrage` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArbitrageOutcome {
    NoOpportunity,
    Executed(Route),
    Unprofitable,
    Unrecognized(u64),
}

impl ArbitrageOutcome {
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => ArbitrageOutcome::NoOpportunity,
            1 => ArbitrageOutcome::Executed(Route::BabPool1First),
            2 => ArbitrageOutcome::Executed(Route::AbaPool2First),
            3 => ArbitrageOutcome::Executed(Route::BabPool2First),
            4 => ArbitrageOutcome::Executed(Route::AbaPool1First),
            5 => ArbitrageOutcome::Unprofitable,
            other => ArbitrageOutcome::Unrecognized(other),
        }
    }

    pub fn code(self) -> u64 {
        match self {
            ArbitrageOutcome::NoOpportunity => 0,
            ArbitrageOutcome::Executed(route) => route.code(),
            ArbitrageOutcome::Unprofitable => 5,
            ArbitrageOutcome::Unrecognized(code) => code,
        }
    }
}

impl std::fmt::Display for ArbitrageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbitrageOutcome::NoOpportunity => write!(f, "No profit exists"),
            ArbitrageOutcome::Executed(route) => write!(f, "{route}"),
            ArbitrageOutcome::Unprofitable => {
                write!(f, "Opportunity exists but not profitable enough")
            }
            ArbitrageOutcome::Unrecognized(code) => write!(f, "Unrecognized action type {code}"),
        }
    }
}

/// A trade the contract actually executed, amounts as decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedTrade {
    pub amount_chosen: String,
    pub profit_achieved: String,
}

/// Decoded result of one invocation, ready for logging and the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageReport {
    pub scenario: String,
    pub caller: Address,
    /// `None` when the call reverted or emitted no `ArbitrageExecuted` event.
    pub outcome: Option<ArbitrageOutcome>,
    /// Present only for routes 1-4.
    pub trade: Option<ExecutedTrade>,
}

/// Knobs for staging the arbitrage scenarios.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Rounds of noisy trading in scenario 3.
    pub rounds: usize,
    /// Scenario-2 one-sided swap, in basis points of pool 2's reserve A.
    pub divergence_bps: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            divergence_bps: 1_000,
        }
    }
}
