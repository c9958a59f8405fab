//! Configuration loader and run settings.

use crate::errors::{Result, SimError};
use ethers::types::Address;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Which workload the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Randomized deposits, withdrawals and swaps against one pool.
    Dex,
    /// The three staged two-pool arbitrage scenarios.
    Arbitrage,
}

impl FromStr for Mode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dex" => Ok(Mode::Dex),
            "arbitrage" | "arb" => Ok(Mode::Arbitrage),
            other => Err(SimError::Config(format!(
                "SIM_MODE must be `dex` or `arbitrage`, got `{other}`"
            ))),
        }
    }
}

/// Deployed contract addresses on a live node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainAddresses {
    pub token_a: Address,
    pub token_b: Address,
    pub pool_1: Address,
    /// Arbitrage mode only.
    pub pool_2: Option<Address>,
    /// Arbitrage mode only.
    pub arbitrage: Option<Address>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    /// In-process ledger; contracts are deployed at startup.
    Sandbox,
    Rpc {
        url: String,
        addresses: ChainAddresses,
    },
}

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub mode: Mode,
    /// Total initial token distribution, in whole units.
    pub distribution: u64,
    pub steps: usize,
    pub arb_rounds: usize,
    pub seed: u64,
    pub max_retries: usize,
    pub divergence_bps: u32,
    pub report_path: Option<String>,
    pub backend: Backend,
}

impl SimConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of a
    /// variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = get("SIM_MODE").map(|v| v.parse::<Mode>()).transpose()?.unwrap_or(Mode::Dex);
        let distribution = parse_or(&get, "SIM_DISTRIBUTION", 15_000_000_000_000u64)?;
        let steps = parse_or(&get, "SIM_STEPS", 80usize)?;
        let arb_rounds = parse_or(&get, "SIM_ARB_ROUNDS", 5usize)?;
        let seed = match get("SIM_SEED") {
            Some(raw) => parse("SIM_SEED", &raw)?,
            None => clock_seed(),
        };
        let max_retries = parse_or(&get, "SIM_MAX_RETRIES", 64usize)?;
        if max_retries == 0 {
            return Err(SimError::Config("SIM_MAX_RETRIES must be at least 1".into()));
        }
        let divergence_bps = parse_or(&get, "SIM_DIVERGENCE_BPS", 1_000u32)?;
        if divergence_bps == 0 || divergence_bps > 10_000 {
            return Err(SimError::Config(format!(
                "SIM_DIVERGENCE_BPS must be in 1..=10000, got {divergence_bps}"
            )));
        }

        let backend = match get("RPC_URL") {
            None => Backend::Sandbox,
            Some(url) => {
                let address = |key: &str| -> Result<Address> {
                    let raw = get(key).ok_or_else(|| {
                        SimError::MissingArtifact(format!("{key} must be set when RPC_URL is"))
                    })?;
                    raw.trim()
                        .parse()
                        .map_err(|_| SimError::Config(format!("{key} is not an address: {raw}")))
                };
                let arbitrage_mode = mode == Mode::Arbitrage;
                Backend::Rpc {
                    url,
                    addresses: ChainAddresses {
                        token_a: address("TOKEN_A")?,
                        token_b: address("TOKEN_B")?,
                        pool_1: address("POOL_1")?,
                        pool_2: arbitrage_mode.then(|| address("POOL_2")).transpose()?,
                        arbitrage: arbitrage_mode.then(|| address("ARBITRAGE")).transpose()?,
                    },
                }
            }
        };

        Ok(Self {
            mode,
            distribution,
            steps,
            arb_rounds,
            seed,
            max_retries,
            divergence_bps,
            report_path: get("SIM_REPORT_PATH"),
            backend,
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .replace('_', "")
        .parse()
        .map_err(|_| SimError::Config(format!("{key} has an invalid value: {raw}")))
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match get(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SimConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SimConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_select_sandbox_dex_run() {
        let cfg = load(&[("SIM_SEED", "9")]).unwrap();
        assert_eq!(cfg.mode, Mode::Dex);
        assert_eq!(cfg.distribution, 15_000_000_000_000);
        assert_eq!(cfg.steps, 80);
        assert_eq!(cfg.arb_rounds, 5);
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.max_retries, 64);
        assert_eq!(cfg.divergence_bps, 1_000);
        assert_eq!(cfg.backend, Backend::Sandbox);
        assert!(cfg.report_path.is_none());
    }

    #[test]
    fn rpc_backend_requires_addresses() {
        let err = load(&[("RPC_URL", "http://localhost:8545")]).unwrap_err();
        assert!(matches!(err, SimError::MissingArtifact(_)));

        let token = "0x0000000000000000000000000000000000000001";
        let cfg = load(&[
            ("RPC_URL", "http://localhost:8545"),
            ("TOKEN_A", token),
            ("TOKEN_B", token),
            ("POOL_1", token),
        ])
        .unwrap();
        match cfg.backend {
            Backend::Rpc { addresses, .. } => {
                assert!(addresses.pool_2.is_none());
                assert!(addresses.arbitrage.is_none());
            }
            Backend::Sandbox => panic!("expected rpc backend"),
        }
    }

    #[test]
    fn arbitrage_mode_needs_second_pool_on_chain() {
        let token = "0x0000000000000000000000000000000000000001";
        let err = load(&[
            ("SIM_MODE", "arbitrage"),
            ("RPC_URL", "http://localhost:8545"),
            ("TOKEN_A", token),
            ("TOKEN_B", token),
            ("POOL_1", token),
        ])
        .unwrap_err();
        assert!(matches!(err, SimError::MissingArtifact(_)));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(load(&[("SIM_STEPS", "many")]).is_err());
        assert!(load(&[("SIM_MODE", "cex")]).is_err());
        assert!(load(&[("SIM_MAX_RETRIES", "0")]).is_err());
        assert!(load(&[("SIM_DIVERGENCE_BPS", "20000")]).is_err());
        assert_eq!(load(&[("SIM_DISTRIBUTION", "1_000")]).unwrap().distribution, 1_000);
    }
}
