//! Shared data structures used throughout the simulator.

use crate::dex::SwapDirection;
use ethers::types::{Address, U256};
use serde::Serialize;

/// The fixed set of identities taking part in a run.
#[derive(Debug, Clone)]
pub struct Roster {
    /// Holder of the initial token supply; funds everyone else.
    pub deployer: Address,
    pub lps: Vec<Address>,
    pub traders: Vec<Address>,
}

impl Roster {
    /// Split an account list the way the node hands them out: one deployer,
    /// five LPs, eight traders.
    pub fn from_accounts(accounts: &[Address]) -> Option<Self> {
        if accounts.len() < 14 {
            return None;
        }
        Some(Self {
            deployer: accounts[0],
            lps: accounts[1..6].to_vec(),
            traders: accounts[6..14].to_vec(),
        })
    }

    /// LPs followed by traders.
    pub fn users(&self) -> impl Iterator<Item = Address> + '_ {
        self.lps.iter().chain(self.traders.iter()).copied()
    }

    /// Every account including the deployer.
    pub fn accounts(&self) -> impl Iterator<Item = Address> + '_ {
        std::iter::once(self.deployer).chain(self.users())
    }

    pub fn user_count(&self) -> usize {
        self.lps.len() + self.traders.len()
    }
}

/// Action kind drawn at the start of every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    Deposit,
    Withdraw,
    Swap,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Deposit => write!(f, "DEPOSIT"),
            ActionKind::Withdraw => write!(f, "WITHDRAWAL"),
            ActionKind::Swap => write!(f, "SWAPPING"),
        }
    }
}

/// What a committed step did, in base units.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Deposited {
        lp: Address,
        amount_a: U256,
        amount_b: U256,
        minted: U256,
    },
    Withdrew {
        lp: Address,
        shares: U256,
        amount_a: U256,
        amount_b: U256,
    },
    Swapped {
        trader: Address,
        direction: SwapDirection,
        amount_in: U256,
        amount_out: U256,
        fee: U256,
        slippage_pct: f64,
    },
    /// The action had nothing to act on (an empty pool).
    NoOp { action: ActionKind },
}
