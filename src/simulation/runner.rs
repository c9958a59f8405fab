//! Drives N randomized steps against one pool and fills the metrics series.

use super::metrics::{MetricsSeries, Observation};
use super::provision;
use super::selector::{ActionSelector, StepResult};
use crate::amount::{self, units};
use crate::dex::{AssetPair, Ledger, Pool, PoolSnapshot};
use crate::errors::{Result, SimError};
use crate::models::Roster;
use ethers::types::U256;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of metric slots, including the seeded slot 0.
    pub steps: usize,
    /// Draws allowed per step before the run aborts.
    pub max_retries: usize,
    pub seed_a_units: u64,
    pub seed_b_units: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 80,
            max_retries: 64,
            seed_a_units: 1_000,
            seed_b_units: 1_500,
        }
    }
}

pub struct DexSimulation<P, L> {
    pool: P,
    assets: AssetPair<L>,
    roster: Roster,
    selector: ActionSelector,
    config: RunConfig,
}

impl<P: Pool, L: Ledger> DexSimulation<P, L> {
    pub fn new(
        pool: P,
        assets: AssetPair<L>,
        roster: Roster,
        selector: ActionSelector,
        config: RunConfig,
    ) -> Self {
        Self {
            pool,
            assets,
            roster,
            selector,
            config,
        }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Hand every LP and trader an equal whole-unit share of `total_units`
    /// of both assets and approve the pool to pull it.
    pub async fn provision(&self, total_units: u64) -> Result<U256> {
        let users = self.roster.user_count() as u64;
        if users == 0 {
            return Err(SimError::Config("roster has no users".into()));
        }
        let per_user = units(total_units / users);
        provision::distribute(
            &self.assets,
            self.roster.deployer,
            self.roster.users(),
            per_user,
        )
        .await?;
        provision::approve_all(&self.assets, self.roster.users(), self.pool.address(), per_user)
            .await?;
        Ok(per_user)
    }

    /// Initial liquidity from the first LP.
    pub async fn seed(&self) -> Result<()> {
        let lp = *self
            .roster
            .lps
            .first()
            .ok_or_else(|| SimError::Config("roster has no liquidity provider".into()))?;
        let (amount_a, amount_b) = (units(self.config.seed_a_units), units(self.config.seed_b_units));
        self.pool.deposit_tokens(lp, amount_a, amount_b).await?;
        info!(
            lp = ?lp,
            amount_a = %amount::to_decimal_string(amount_a),
            amount_b = %amount::to_decimal_string(amount_b),
            "[INIT] pool seeded"
        );
        Ok(())
    }

    /// Run every step and return the filled series.
    pub async fn run(&mut self) -> Result<MetricsSeries> {
        let steps = self.config.steps;
        let mut metrics = MetricsSeries::new(steps, &self.roster.lps);
        if steps == 0 {
            return Ok(metrics);
        }

        let initial = Observation::read(&self.pool, &self.roster.lps).await?;
        metrics.refresh(0, None, &initial)?;
        info!(
            ratio = metrics.reserve_ratio[0],
            tvl = metrics.tvl[0],
            "[METRICS] initial state recorded"
        );

        for index in 1..steps {
            info!(index, "[STEP] ---------------- step ----------------");
            let ratio = self.run_step(index, &mut metrics).await?;
            match Observation::read(&self.pool, &self.roster.lps).await {
                Ok(observed) => metrics.refresh(index, ratio, &observed)?,
                Err(e) if e.is_recoverable() => {
                    warn!(index, error = %e, "[METRICS] state refresh failed, slot keeps defaults");
                }
                Err(e) => return Err(e),
            }
        }

        let totals = metrics.totals();
        info!(
            steps,
            swap_volume_a = totals.swap_volume_a,
            swap_volume_b = totals.swap_volume_b,
            fees_a = totals.fees_a,
            fees_b = totals.fees_b,
            final_ratio = totals.final_ratio,
            final_tvl = totals.final_tvl,
            "[METRICS] simulation complete"
        );
        Ok(metrics)
    }

    /// Draw until the step commits or fails. Returns the ratio the step was
    /// decided on, when a snapshot was read.
    async fn run_step(&mut self, index: usize, metrics: &mut MetricsSeries) -> Result<Option<f64>> {
        let budget = self.config.max_retries;
        for draw in 1..=budget {
            let attempt = self
                .selector
                .attempt(&self.pool, &self.assets, &self.roster)
                .await?;
            let ratio = attempt.snapshot.as_ref().and_then(PoolSnapshot::ratio);
            match attempt.result {
                StepResult::Retry(why) => {
                    let reason = SimError::from(why);
                    debug!(index, draw, action = %attempt.action, %reason, "[STEP] drawing again");
                }
                StepResult::Committed(outcome) => {
                    metrics.commit(index, &outcome)?;
                    return Ok(ratio);
                }
                StepResult::Failed(e) => {
                    warn!(
                        index,
                        action = %attempt.action,
                        actor = ?attempt.actor,
                        error = %e,
                        "[STEP] step failed, moving on"
                    );
                    return Ok(ratio);
                }
            }
        }
        error!(index, budget, "[STEP] no feasible action found");
        Err(SimError::RetryBudgetExhausted {
            step: index,
            attempts: budget,
        })
    }
}
