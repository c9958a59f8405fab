use amm_sim::amount::units;
use amm_sim::arbitrage::{ArbitrageOrchestrator, ArbitrageOutcome, OrchestratorConfig};
use amm_sim::dex::AssetPair;
use amm_sim::models::Roster;
use amm_sim::sandbox::{Sandbox, SandboxArbitrage, SandboxPool, SandboxToken};
use amm_sim::simulation::{ActionSelector, SelectorConfig};
use ethers::types::U256;

type Orchestrator = ArbitrageOrchestrator<SandboxPool, SandboxToken, SandboxArbitrage>;

async fn staged(seed: u64, min_profit: U256, config: OrchestratorConfig) -> Orchestrator {
    let sandbox = Sandbox::new();
    let roster = Roster::from_accounts(&Sandbox::accounts(14)).unwrap();
    let a = sandbox.deploy_token(units(14_000_000), roster.deployer);
    let b = sandbox.deploy_token(units(14_000_000), roster.deployer);
    let pool_1 = sandbox.deploy_pool(&a, &b);
    let pool_2 = sandbox.deploy_pool(&a, &b);
    let arbitrage = sandbox.deploy_arbitrage(&pool_1, &pool_2, min_profit).unwrap();
    let mut orchestrator = ArbitrageOrchestrator::new(
        (pool_1, pool_2),
        AssetPair::new(a, b),
        arbitrage,
        roster,
        ActionSelector::new(SelectorConfig::default(), seed),
        config,
    );
    orchestrator.provision(units(14_000_000)).await.unwrap();
    orchestrator
}

#[tokio::test]
async fn balanced_pools_have_no_opportunity() {
    let mut o = staged(1, U256::zero(), OrchestratorConfig::default()).await;
    let report = o.balanced().await.unwrap();
    assert_eq!(report.outcome, Some(ArbitrageOutcome::NoOpportunity));
    assert!(report.trade.is_none());
}

#[tokio::test]
async fn ten_percent_divergence_is_traded() {
    let mut o = staged(2, U256::zero(), OrchestratorConfig::default()).await;
    let report = o.small_divergence().await.unwrap();
    let outcome = report.outcome.expect("arbitrage call succeeds");
    assert!(matches!(outcome, ArbitrageOutcome::Executed(_)), "{outcome:?}");
    let trade = report.trade.expect("executed routes carry a trade");
    assert!(!trade.profit_achieved.starts_with('-'));
    assert_ne!(trade.profit_achieved, "0");
}

#[tokio::test]
async fn high_profit_floor_reports_unprofitable() {
    let floor = units(1_000_000_000);
    let mut o = staged(3, floor, OrchestratorConfig::default()).await;
    let report = o.small_divergence().await.unwrap();
    assert_eq!(report.outcome, Some(ArbitrageOutcome::Unprofitable));
    assert!(report.trade.is_none());
}

#[tokio::test]
async fn sustained_divergence_reports_every_round() {
    let config = OrchestratorConfig {
        rounds: 4,
        ..OrchestratorConfig::default()
    };
    let mut o = staged(4, U256::zero(), config).await;
    let reports = o.sustained_divergence().await.unwrap();
    assert_eq!(reports.len(), 4);
    for (round, report) in reports.iter().enumerate() {
        assert_eq!(report.scenario, format!("sustained-divergence-{}", round + 1));
        match report.outcome {
            Some(ArbitrageOutcome::Executed(_)) => assert!(report.trade.is_some()),
            _ => assert!(report.trade.is_none()),
        }
    }
}
