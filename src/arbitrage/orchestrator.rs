//! Stages two pools into known states and asks the arbitrage contract to act.

use super::evaluator::{decode_receipt, log_outcome};
use super::types::{ArbitrageReport, OrchestratorConfig};
use super::ArbitrageContract;
use crate::amount::{self, one, units};
use crate::dex::{AssetPair, Ledger, Pool, calc};
use crate::errors::{Result, SimError};
use crate::models::Roster;
use crate::simulation::{ActionSelector, provision};
use ethers::types::{Address, U256};
use rand::Rng;
use tracing::{info, warn};

pub struct ArbitrageOrchestrator<P, L, A> {
    pool_1: P,
    pool_2: P,
    assets: AssetPair<L>,
    arbitrage: A,
    roster: Roster,
    selector: ActionSelector,
    config: OrchestratorConfig,
}

impl<P, L, A> ArbitrageOrchestrator<P, L, A>
where
    P: Pool,
    L: Ledger,
    A: ArbitrageContract,
{
    pub fn new(
        pools: (P, P),
        assets: AssetPair<L>,
        arbitrage: A,
        roster: Roster,
        selector: ActionSelector,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            pool_1: pools.0,
            pool_2: pools.1,
            assets,
            arbitrage,
            roster,
            selector,
            config,
        }
    }

    pub fn pools(&self) -> (&P, &P) {
        (&self.pool_1, &self.pool_2)
    }

    /// Split `total_base` evenly over every account, approve both pools and
    /// the arbitrage contract, then have each LP add the same random amount
    /// of both assets to both pools.
    pub async fn provision(&mut self, total_base: U256) -> Result<U256> {
        let accounts: Vec<Address> = self.roster.accounts().collect();
        let per_user = total_base / U256::from(accounts.len());
        provision::distribute(
            &self.assets,
            self.roster.deployer,
            self.roster.users(),
            per_user,
        )
        .await?;
        for spender in [
            self.pool_1.address(),
            self.pool_2.address(),
            self.arbitrage.address(),
        ] {
            provision::approve_all(&self.assets, accounts.iter().copied(), spender, per_user)
                .await?;
        }

        let quarter_units = (per_user / U256::from(4u8) / one()).min(U256::from(u64::MAX)).as_u64();
        if quarter_units == 0 {
            return Err(SimError::Config(format!(
                "distribution of {} per user is too small to seed liquidity",
                amount::to_decimal_string(per_user)
            )));
        }
        for lp in self.roster.lps.clone() {
            let liquidity = units(self.selector.rng().gen_range(1..=quarter_units));
            self.pool_1.deposit_tokens(lp, liquidity, liquidity).await?;
            self.pool_2.deposit_tokens(lp, liquidity, liquidity).await?;
            let (shares_1, shares_2) = futures::try_join!(
                self.pool_1.lp_token().balance_of(lp),
                self.pool_2.lp_token().balance_of(lp),
            )?;
            info!(
                lp = ?lp,
                liquidity = %amount::to_decimal_string(liquidity),
                shares_1 = %amount::to_decimal_string(shares_1),
                shares_2 = %amount::to_decimal_string(shares_2),
                "[INIT] liquidity added to both pools"
            );
        }
        Ok(per_user)
    }

    /// Run the balanced, small-divergence and sustained-divergence scenarios.
    pub async fn run_scenarios(&mut self) -> Result<Vec<ArbitrageReport>> {
        let mut reports = vec![self.balanced().await?, self.small_divergence().await?];
        reports.extend(self.sustained_divergence().await?);
        Ok(reports)
    }

    pub async fn balanced(&mut self) -> Result<ArbitrageReport> {
        info!("[ARB] scenario 1: balanced pools");
        self.log_reserves().await?;
        let caller = self.first_trader()?;
        self.invoke("balanced", caller).await
    }

    pub async fn small_divergence(&mut self) -> Result<ArbitrageReport> {
        info!(divergence_bps = self.config.divergence_bps, "[ARB] scenario 2: small divergence");
        let caller = self.first_trader()?;
        let reserve_a = self.pool_2.reserve_a().await?;
        let swap_in = reserve_a * U256::from(self.config.divergence_bps) / U256::from(10_000u32);
        match self.pool_2.swap_a_to_b(caller, swap_in).await {
            Ok(()) => info!(
                amount_in = %amount::to_decimal_string(swap_in),
                "[SWAP] pool 2 pushed A -> B"
            ),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "[SWAP] divergence swap failed, invoking anyway")
            }
            Err(e) => return Err(e),
        }
        self.log_reserves().await?;
        self.invoke("small-divergence", caller).await
    }

    pub async fn sustained_divergence(&mut self) -> Result<Vec<ArbitrageReport>> {
        info!(rounds = self.config.rounds, "[ARB] scenario 3: sustained divergence");
        let mut reports = Vec::with_capacity(self.config.rounds);
        for round in 1..=self.config.rounds {
            info!(round, "[ARB] ---------------- round ----------------");
            for trader in self.roster.traders.clone() {
                for (label, pool) in [("pool 1", &self.pool_1), ("pool 2", &self.pool_2)] {
                    match self.selector.noise_swap(pool, &self.assets, trader).await {
                        Ok(Some(plan)) => info!(
                            trader = ?trader,
                            pool = label,
                            direction = %plan.direction,
                            amount_in = %amount::to_decimal_string(plan.amount_in),
                            "[SWAP] noise swap"
                        ),
                        Ok(None) => {}
                        Err(e) if e.is_recoverable() => {
                            warn!(trader = ?trader, pool = label, error = %e, "[SWAP] noise swap failed")
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            self.log_reserves().await?;

            let caller = self.selector.pick(&self.roster.traders)?;
            let before = self.balances(caller).await?;
            let report = self.invoke(&format!("sustained-divergence-{round}"), caller).await?;
            let after = self.balances(caller).await?;
            info!(
                caller = ?caller,
                a_before = %amount::to_decimal_string(before.0),
                b_before = %amount::to_decimal_string(before.1),
                a_after = %amount::to_decimal_string(after.0),
                b_after = %amount::to_decimal_string(after.1),
                "[ARB] caller balances"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Call the contract as `caller` and decode what it reports. Reverts and
    /// missing events become a report with no outcome.
    async fn invoke(&self, scenario: &str, caller: Address) -> Result<ArbitrageReport> {
        let (outcome, trade) = match self.arbitrage.perform_arbitrage(caller).await {
            Ok(Some(receipt)) => {
                let (outcome, trade) = decode_receipt(&receipt);
                log_outcome(outcome, trade.as_ref(), &receipt);
                (Some(outcome), trade)
            }
            Ok(None) => {
                warn!(scenario, "[ARB] no ArbitrageExecuted event in receipt");
                (None, None)
            }
            Err(e) if e.is_recoverable() => {
                warn!(scenario, error = %e, "[ARB] arbitrage call failed");
                (None, None)
            }
            Err(e) => return Err(e),
        };
        Ok(ArbitrageReport {
            scenario: scenario.to_string(),
            caller,
            outcome,
            trade,
        })
    }

    async fn log_reserves(&self) -> Result<()> {
        let (a1, b1, a2, b2) = futures::try_join!(
            self.pool_1.reserve_a(),
            self.pool_1.reserve_b(),
            self.pool_2.reserve_a(),
            self.pool_2.reserve_b(),
        )?;
        info!(
            reserve_a = %amount::to_decimal_string(a1),
            reserve_b = %amount::to_decimal_string(b1),
            ratio = calc::reserve_ratio(a1, b1).unwrap_or(0.0),
            "[ARB] pool 1"
        );
        info!(
            reserve_a = %amount::to_decimal_string(a2),
            reserve_b = %amount::to_decimal_string(b2),
            ratio = calc::reserve_ratio(a2, b2).unwrap_or(0.0),
            "[ARB] pool 2"
        );
        Ok(())
    }

    async fn balances(&self, owner: Address) -> Result<(U256, U256)> {
        futures::try_join!(
            self.assets.token_a.balance_of(owner),
            self.assets.token_b.balance_of(owner),
        )
    }

    fn first_trader(&self) -> Result<Address> {
        self.roster
            .traders
            .first()
            .copied()
            .ok_or_else(|| SimError::Config("roster has no trader".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::ArbitrageOutcome;
    use crate::sandbox::{Sandbox, SandboxArbitrage, SandboxPool, SandboxToken};
    use crate::simulation::SelectorConfig;

    type Orchestrator = ArbitrageOrchestrator<SandboxPool, SandboxToken, SandboxArbitrage>;

    async fn staged(seed: u64, config: OrchestratorConfig) -> Orchestrator {
        let sandbox = Sandbox::new();
        let roster = Roster::from_accounts(&Sandbox::accounts(14)).unwrap();
        let supply = units(15_000_000_000_000);
        let a = sandbox.deploy_token(supply, roster.deployer);
        let b = sandbox.deploy_token(supply, roster.deployer);
        let pool_1 = sandbox.deploy_pool(&a, &b);
        let pool_2 = sandbox.deploy_pool(&a, &b);
        let arbitrage = sandbox
            .deploy_arbitrage(&pool_1, &pool_2, U256::zero())
            .unwrap();
        let mut orchestrator = ArbitrageOrchestrator::new(
            (pool_1, pool_2),
            AssetPair::new(a, b),
            arbitrage,
            roster,
            ActionSelector::new(SelectorConfig::default(), seed),
            config,
        );
        orchestrator.provision(units(15_000_000)).await.unwrap();
        orchestrator
    }

    #[tokio::test]
    async fn provisioning_keeps_pools_symmetric() {
        let o = staged(3, OrchestratorConfig::default()).await;
        let (p1, p2) = o.pools();
        assert_eq!(p1.reserve_a().await.unwrap(), p1.reserve_b().await.unwrap());
        assert_eq!(p1.reserve_a().await.unwrap(), p2.reserve_a().await.unwrap());
    }

    #[tokio::test]
    async fn balanced_pools_report_no_trade() {
        let mut o = staged(4, OrchestratorConfig::default()).await;
        let report = o.balanced().await.unwrap();
        assert_eq!(report.outcome, Some(ArbitrageOutcome::NoOpportunity));
        assert!(report.trade.is_none());
    }

    #[tokio::test]
    async fn scenarios_produce_one_report_per_invocation() {
        let config = OrchestratorConfig {
            rounds: 3,
            ..OrchestratorConfig::default()
        };
        let mut o = staged(5, config).await;
        let reports = o.run_scenarios().await.unwrap();
        assert_eq!(reports.len(), 5);
        assert_eq!(reports[0].scenario, "balanced");
        assert_ne!(reports[1].outcome, Some(ArbitrageOutcome::NoOpportunity));
    }
}
