//! Wires a backend to the selected workload.

use crate::amount::units;
use crate::arbitrage::{ArbitrageContract, ArbitrageOrchestrator, OrchestratorConfig};
use crate::config::{Backend, ChainAddresses, Mode, SimConfig};
use crate::dex::{AssetPair, ContractArbitrage, ContractPool, ContractToken, Ledger, Pool, client};
use crate::errors::{Result, SimError};
use crate::models::Roster;
use crate::report::RunReport;
use crate::sandbox::Sandbox;
use crate::simulation::{ActionSelector, DexSimulation, RunConfig, SelectorConfig};
use ethers::types::U256;
use tracing::info;

const ROSTER_SIZE: u64 = 14;

/// Run the configured mode against the configured backend.
pub async fn run(config: &SimConfig) -> Result<RunReport> {
    info!(
        mode = ?config.mode,
        seed = config.seed,
        steps = config.steps,
        distribution = config.distribution,
        "[INIT] starting run"
    );
    match &config.backend {
        Backend::Sandbox => run_sandbox(config).await,
        Backend::Rpc { url, addresses } => run_chain(config, url, addresses).await,
    }
}

async fn run_sandbox(config: &SimConfig) -> Result<RunReport> {
    let sandbox = Sandbox::new();
    let roster = Roster::from_accounts(&Sandbox::accounts(ROSTER_SIZE))
        .ok_or_else(|| SimError::MissingArtifact("sandbox roster".into()))?;
    let supply = units(config.distribution);
    let token_a = sandbox.deploy_token(supply, roster.deployer);
    let token_b = sandbox.deploy_token(supply, roster.deployer);
    let pool_1 = sandbox.deploy_pool(&token_a, &token_b);
    info!(backend = "sandbox", "[INIT] contracts deployed");

    match config.mode {
        Mode::Dex => run_dex(config, pool_1, AssetPair::new(token_a, token_b), roster).await,
        Mode::Arbitrage => {
            let pool_2 = sandbox.deploy_pool(&token_a, &token_b);
            let arbitrage = sandbox.deploy_arbitrage(&pool_1, &pool_2, U256::zero())?;
            run_arbitrage(
                config,
                (pool_1, pool_2),
                AssetPair::new(token_a, token_b),
                arbitrage,
                roster,
            )
            .await
        }
    }
}

async fn run_chain(config: &SimConfig, url: &str, addresses: &ChainAddresses) -> Result<RunReport> {
    let provider = client::connect(url)?;
    let accounts = client::unlocked_accounts(&provider).await?;
    let roster = Roster::from_accounts(&accounts).ok_or_else(|| {
        SimError::MissingArtifact(format!(
            "node exposes {} unlocked accounts, {ROSTER_SIZE} needed",
            accounts.len()
        ))
    })?;
    let assets = AssetPair::new(
        ContractToken::new(provider.clone(), addresses.token_a),
        ContractToken::new(provider.clone(), addresses.token_b),
    );
    let pool_1 = ContractPool::connect(provider.clone(), addresses.pool_1).await?;
    info!(backend = %url, "[INIT] contracts attached");

    match config.mode {
        Mode::Dex => run_dex(config, pool_1, assets, roster).await,
        Mode::Arbitrage => {
            let pool_2 = addresses
                .pool_2
                .ok_or_else(|| SimError::MissingArtifact("POOL_2 address".into()))?;
            let arbitrage = addresses
                .arbitrage
                .ok_or_else(|| SimError::MissingArtifact("ARBITRAGE address".into()))?;
            let pool_2 = ContractPool::connect(provider.clone(), pool_2).await?;
            let arbitrage = ContractArbitrage::new(provider, arbitrage);
            run_arbitrage(config, (pool_1, pool_2), assets, arbitrage, roster).await
        }
    }
}

async fn run_dex<P: Pool, L: Ledger>(
    config: &SimConfig,
    pool: P,
    assets: AssetPair<L>,
    roster: Roster,
) -> Result<RunReport> {
    let mut sim = DexSimulation::new(
        pool,
        assets,
        roster,
        ActionSelector::new(SelectorConfig::default(), config.seed),
        RunConfig {
            steps: config.steps,
            max_retries: config.max_retries,
            ..RunConfig::default()
        },
    );
    sim.provision(config.distribution).await?;
    sim.seed().await?;
    let series = sim.run().await?;
    Ok(RunReport::dex(config.seed, series))
}

async fn run_arbitrage<P, L, A>(
    config: &SimConfig,
    pools: (P, P),
    assets: AssetPair<L>,
    arbitrage: A,
    roster: Roster,
) -> Result<RunReport>
where
    P: Pool,
    L: Ledger,
    A: ArbitrageContract,
{
    let mut orchestrator = ArbitrageOrchestrator::new(
        pools,
        assets,
        arbitrage,
        roster,
        ActionSelector::new(SelectorConfig::default(), config.seed),
        OrchestratorConfig {
            rounds: config.arb_rounds,
            divergence_bps: config.divergence_bps,
        },
    );
    orchestrator.provision(units(config.distribution)).await?;
    let invocations = orchestrator.run_scenarios().await?;
    Ok(RunReport::arbitrage(config.seed, invocations))
}
