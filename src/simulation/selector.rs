//! Randomized action selection with feasibility checks.
//!
//! Planning is pure: each `plan_*` function takes an immutable
//! [`PoolSnapshot`] and either returns a concrete plan or the reason it is
//! infeasible. Only [`ActionSelector::attempt`] talks to the ledger.

use crate::amount::{self, one, units};
use crate::dex::{AssetPair, Ledger, Pool, PoolSnapshot, SwapDirection, calc};
use crate::errors::{Result, SimError};
use crate::models::{ActionKind, Roster, StepOutcome};
use ethers::types::{Address, U256};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Bounds applied when sizing actions. Amounts are whole human units unless noted.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub min_swap_units: u64,
    /// Upper bound for B→A swaps only.
    pub max_reverse_swap_units: u64,
    /// A swap may take at most `reserve / reserve_cap_divisor` of the input reserve.
    pub reserve_cap_divisor: u64,
    /// Allowed gap between target and realized deposit ratio.
    pub ratio_epsilon: f64,
    /// Withdrawal granularity and minimum, in base units (0.1 units).
    pub withdraw_step: U256,
    pub deposit_unit: u64,
    pub deposit_multiplier_max: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_swap_units: 10,
            max_reverse_swap_units: 1_000,
            reserve_cap_divisor: 10,
            ratio_epsilon: 1e-4,
            withdraw_step: U256::exp10(17),
            deposit_unit: 100,
            deposit_multiplier_max: 10,
        }
    }
}

/// Why a drawn action cannot go ahead against the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Infeasible {
    InsufficientBalance {
        required_a: U256,
        required_b: U256,
        available_a: U256,
        available_b: U256,
    },
    RatioMismatch { expected: f64, computed: f64 },
    InsufficientShares { balance: U256 },
    BelowMinimumSwap { direction: SwapDirection, cap: U256 },
}

impl std::fmt::Display for Infeasible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Infeasible::InsufficientBalance {
                required_a,
                required_b,
                available_a,
                available_b,
            } => write!(
                f,
                "insufficient balance: required A {} & B {}, available A {} & B {}",
                amount::to_decimal_string(*required_a),
                amount::to_decimal_string(*required_b),
                amount::to_decimal_string(*available_a),
                amount::to_decimal_string(*available_b),
            ),
            Infeasible::RatioMismatch { expected, computed } => {
                write!(f, "ratio mismatch: expected {expected} vs computed {computed}")
            }
            Infeasible::InsufficientShares { balance } => write!(
                f,
                "LP share balance {} below withdrawal minimum",
                amount::to_decimal_string(*balance)
            ),
            Infeasible::BelowMinimumSwap { direction, cap } => write!(
                f,
                "{direction} cap {} below minimum swap",
                amount::to_decimal_string(*cap)
            ),
        }
    }
}

impl From<Infeasible> for SimError {
    fn from(why: Infeasible) -> Self {
        SimError::InfeasibleAction(why.to_string())
    }
}

pub type Plan<T> = std::result::Result<T, Infeasible>;

#[derive(Debug, Clone, PartialEq)]
pub struct DepositPlan {
    pub amount_a: U256,
    pub amount_b: U256,
    /// Target B-per-A ratio taken from the reserves.
    pub expected_ratio: f64,
    /// B-per-A ratio implied by the rounded base-unit amounts.
    pub computed_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawPlan {
    pub shares: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    pub direction: SwapDirection,
    pub amount_in: U256,
}

/// Tagged result of one attempt at a step.
#[derive(Debug)]
pub enum StepResult {
    /// Infeasible against the snapshot; draw again for the same step.
    Retry(Infeasible),
    Committed(StepOutcome),
    /// The ledger rejected a call; the step is given up.
    Failed(SimError),
}

/// One attempt at a step, with the snapshot it was decided on.
#[derive(Debug)]
pub struct Attempt {
    pub action: ActionKind,
    pub actor: Address,
    /// Absent only when reading the snapshot itself failed.
    pub snapshot: Option<PoolSnapshot>,
    pub result: StepResult,
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Draws actions, actors and sizes from a seeded ChaCha stream.
pub struct ActionSelector {
    config: SelectorConfig,
    rng: ChaCha8Rng,
}

impl ActionSelector {
    pub fn new(config: SelectorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Shared random stream, for callers that need draws in the same sequence.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn draw_action(&mut self) -> ActionKind {
        match self.rng.gen_range(0..3) {
            0 => ActionKind::Deposit,
            1 => ActionKind::Withdraw,
            _ => ActionKind::Swap,
        }
    }

    pub fn draw_direction(&mut self) -> SwapDirection {
        if self.rng.gen_bool(0.5) {
            SwapDirection::AToB
        } else {
            SwapDirection::BToA
        }
    }

    pub fn pick(&mut self, actors: &[Address]) -> Result<Address> {
        if actors.is_empty() {
            return Err(SimError::Config("roster has no eligible actor".into()));
        }
        Ok(actors[self.rng.gen_range(0..actors.len())])
    }

    /// Size a deposit at the snapshot's ratio. Expects a funded pool.
    pub fn plan_deposit(&mut self, snapshot: &PoolSnapshot) -> Result<Plan<DepositPlan>> {
        let cfg = &self.config;
        let multiplier = self.rng.gen_range(1..=cfg.deposit_multiplier_max);
        let deposit_a_units = multiplier * cfg.deposit_unit;

        let expected_ratio =
            amount::to_f64(snapshot.reserve_b) / amount::to_f64(snapshot.reserve_a);
        let amount_a = units(deposit_a_units);
        let amount_b = match amount::from_f64(deposit_a_units as f64 * expected_ratio) {
            Ok(amount_b) => amount_b,
            // A B leg past U256 can never be covered by a balance.
            Err(SimError::MalformedAmount(_)) => {
                return Ok(Err(Infeasible::InsufficientBalance {
                    required_a: amount_a,
                    required_b: U256::MAX,
                    available_a: snapshot.balance_a,
                    available_b: snapshot.balance_b,
                }));
            }
            Err(e) => return Err(e),
        };

        if amount_a > snapshot.balance_a || amount_b > snapshot.balance_b {
            return Ok(Err(Infeasible::InsufficientBalance {
                required_a: amount_a,
                required_b: amount_b,
                available_a: snapshot.balance_a,
                available_b: snapshot.balance_b,
            }));
        }

        let computed_ratio = amount::to_f64(amount_b) / deposit_a_units as f64;
        if amount_b.is_zero() || (expected_ratio - computed_ratio).abs() > cfg.ratio_epsilon {
            return Ok(Err(Infeasible::RatioMismatch {
                expected: expected_ratio,
                computed: computed_ratio,
            }));
        }

        Ok(Ok(DepositPlan {
            amount_a,
            amount_b,
            expected_ratio,
            computed_ratio,
        }))
    }

    /// Pick a multiple of the withdrawal step, uniformly up to the full balance.
    pub fn plan_withdraw(&mut self, share_balance: U256) -> Plan<WithdrawPlan> {
        let step = self.config.withdraw_step;
        let steps = saturating_u64(share_balance / step);
        if steps == 0 {
            return Err(Infeasible::InsufficientShares {
                balance: share_balance,
            });
        }
        let chosen = self.rng.gen_range(1..=steps);
        Ok(WithdrawPlan {
            shares: step * U256::from(chosen),
        })
    }

    /// Size a swap between the minimum and `min(balance, reserve / divisor)`.
    /// Expects a funded pool.
    pub fn plan_swap(&mut self, snapshot: &PoolSnapshot, direction: SwapDirection) -> Plan<SwapPlan> {
        let cfg = &self.config;
        let (reserve_in, _) = snapshot.reserves_for(direction);
        let cap = snapshot
            .balance_for(direction)
            .min(reserve_in / U256::from(cfg.reserve_cap_divisor));
        let cap_units = saturating_u64(cap / one());
        if cap_units < cfg.min_swap_units {
            return Err(Infeasible::BelowMinimumSwap { direction, cap });
        }
        let upper = match direction {
            SwapDirection::AToB => cap_units,
            SwapDirection::BToA => cap_units.min(cfg.max_reverse_swap_units),
        };
        let size = self.rng.gen_range(cfg.min_swap_units..=upper);
        Ok(SwapPlan {
            direction,
            amount_in: units(size),
        })
    }

    /// Draw and try one action against `pool`.
    ///
    /// Ledger rejections come back as [`StepResult::Failed`]; only fatal
    /// errors surface as `Err`.
    pub async fn attempt<P, L>(
        &mut self,
        pool: &P,
        assets: &AssetPair<L>,
        roster: &Roster,
    ) -> Result<Attempt>
    where
        P: Pool,
        L: Ledger,
    {
        let action = self.draw_action();
        let actor = match action {
            ActionKind::Deposit | ActionKind::Withdraw => self.pick(&roster.lps)?,
            ActionKind::Swap => self.pick(&roster.traders)?,
        };
        info!(%action, actor = ?actor, "[STEP] action drawn");

        let snapshot = match PoolSnapshot::read(pool, assets, actor).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_recoverable() => {
                return Ok(Attempt {
                    action,
                    actor,
                    snapshot: None,
                    result: StepResult::Failed(e),
                });
            }
            Err(e) => return Err(e),
        };
        info!(
            reserve_a = %amount::to_decimal_string(snapshot.reserve_a),
            reserve_b = %amount::to_decimal_string(snapshot.reserve_b),
            ratio = snapshot.ratio().unwrap_or(0.0),
            "[STEP] pool state"
        );

        let executed = match action {
            ActionKind::Deposit => self.deposit(pool, &snapshot, actor).await,
            ActionKind::Withdraw => self.withdraw(pool, actor).await,
            ActionKind::Swap => self.swap(pool, &snapshot, actor).await,
        };
        let result = match executed {
            Ok(result) => result,
            Err(e) if e.is_recoverable() => StepResult::Failed(e),
            Err(e) => return Err(e),
        };
        Ok(Attempt {
            action,
            actor,
            snapshot: Some(snapshot),
            result,
        })
    }

    async fn deposit<P: Pool>(
        &mut self,
        pool: &P,
        snapshot: &PoolSnapshot,
        lp: Address,
    ) -> Result<StepResult> {
        if !snapshot.is_funded() {
            return Ok(StepResult::Committed(StepOutcome::NoOp {
                action: ActionKind::Deposit,
            }));
        }
        let plan = match self.plan_deposit(snapshot)? {
            Ok(plan) => plan,
            Err(why) => return Ok(StepResult::Retry(why)),
        };

        let shares = pool.lp_token();
        let before = shares.balance_of(lp).await?;
        pool.deposit_tokens(lp, plan.amount_a, plan.amount_b).await?;
        let after = shares.balance_of(lp).await?;
        let minted = after.saturating_sub(before);

        info!(
            amount_a = %amount::to_decimal_string(plan.amount_a),
            amount_b = %amount::to_decimal_string(plan.amount_b),
            minted = %amount::to_decimal_string(minted),
            "[DEPOSIT] liquidity added"
        );
        Ok(StepResult::Committed(StepOutcome::Deposited {
            lp,
            amount_a: plan.amount_a,
            amount_b: plan.amount_b,
            minted,
        }))
    }

    async fn withdraw<P: Pool>(&mut self, pool: &P, lp: Address) -> Result<StepResult> {
        let balance = pool.lp_token().balance_of(lp).await?;
        let plan = match self.plan_withdraw(balance) {
            Ok(plan) => plan,
            Err(why) => return Ok(StepResult::Retry(why)),
        };

        pool.withdraw_tokens(lp, plan.shares).await?;
        let (amount_a, amount_b) = futures::try_join!(pool.return_a(lp), pool.return_b(lp))?;

        info!(
            shares = %amount::to_decimal_string(plan.shares),
            amount_a = %amount::to_decimal_string(amount_a),
            amount_b = %amount::to_decimal_string(amount_b),
            "[WITHDRAW] liquidity removed"
        );
        Ok(StepResult::Committed(StepOutcome::Withdrew {
            lp,
            shares: plan.shares,
            amount_a,
            amount_b,
        }))
    }

    async fn swap<P: Pool>(
        &mut self,
        pool: &P,
        snapshot: &PoolSnapshot,
        trader: Address,
    ) -> Result<StepResult> {
        let direction = self.draw_direction();
        if !snapshot.is_funded() {
            return Ok(StepResult::Committed(StepOutcome::NoOp {
                action: ActionKind::Swap,
            }));
        }
        let plan = match self.plan_swap(snapshot, direction) {
            Ok(plan) => plan,
            Err(why) => return Ok(StepResult::Retry(why)),
        };

        pool.swap(trader, direction, plan.amount_in).await?;
        let (amount_out, fee) = futures::try_join!(
            pool.swap_output(trader, direction),
            pool.swap_fees(trader)
        )?;
        let (reserve_in, reserve_out) = snapshot.reserves_for(direction);
        let slippage_pct = calc::slippage_pct(plan.amount_in, amount_out, reserve_in, reserve_out);

        info!(
            %direction,
            amount_in = %amount::to_decimal_string(plan.amount_in),
            amount_out = %amount::to_decimal_string(amount_out),
            fee = %amount::to_decimal_string(fee),
            slippage_pct,
            "[SWAP] swapped"
        );
        Ok(StepResult::Committed(StepOutcome::Swapped {
            trader,
            direction,
            amount_in: plan.amount_in,
            amount_out,
            fee,
            slippage_pct,
        }))
    }

    /// Background swap for `trader` against `pool` with no metrics attached.
    ///
    /// Returns the executed plan, or `None` when the drawn swap was infeasible.
    pub async fn noise_swap<P, L>(
        &mut self,
        pool: &P,
        assets: &AssetPair<L>,
        trader: Address,
    ) -> Result<Option<SwapPlan>>
    where
        P: Pool,
        L: Ledger,
    {
        let snapshot = PoolSnapshot::read(pool, assets, trader).await?;
        let direction = self.draw_direction();
        if !snapshot.is_funded() {
            return Ok(None);
        }
        match self.plan_swap(&snapshot, direction) {
            Ok(plan) => {
                pool.swap(trader, plan.direction, plan.amount_in).await?;
                Ok(Some(plan))
            }
            Err(why) => {
                debug!(trader = ?trader, reason = %why, "[SWAP] noise swap skipped");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(reserve_a: u64, reserve_b: u64, balance_a: u64, balance_b: u64) -> PoolSnapshot {
        PoolSnapshot::new(
            units(reserve_a),
            units(reserve_b),
            units(balance_a),
            units(balance_b),
        )
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = ActionSelector::new(SelectorConfig::default(), 7);
        let mut b = ActionSelector::new(SelectorConfig::default(), 7);
        let snap = snapshot(100_000, 150_000, 50_000, 50_000);
        for _ in 0..50 {
            assert_eq!(a.draw_action(), b.draw_action());
            let dir = a.draw_direction();
            assert_eq!(dir, b.draw_direction());
            assert_eq!(a.plan_swap(&snap, dir), b.plan_swap(&snap, dir));
        }
    }

    #[test]
    fn deposit_matches_pool_ratio() {
        let mut sel = ActionSelector::new(SelectorConfig::default(), 1);
        let snap = snapshot(1_000, 1_500, 1_000_000, 1_000_000);
        let plan = sel.plan_deposit(&snap).unwrap().unwrap();
        let a = amount::to_f64(plan.amount_a);
        let b = amount::to_f64(plan.amount_b);
        assert!((b / a - 1.5).abs() < 1e-9);
        assert!(a >= 100.0 && a <= 1_000.0);
        assert_eq!(a % 100.0, 0.0);
    }

    #[test]
    fn deposit_needs_both_legs_covered() {
        let mut sel = ActionSelector::new(SelectorConfig::default(), 1);
        let snap = snapshot(1_000, 1_500, 1_000_000, 10);
        let why = sel.plan_deposit(&snap).unwrap().unwrap_err();
        assert!(matches!(why, Infeasible::InsufficientBalance { .. }));
    }

    #[test]
    fn deposit_rejects_unrepresentable_ratio() {
        let mut sel = ActionSelector::new(SelectorConfig::default(), 3);
        // B per A so small the rounded B leg collapses to zero.
        let snap = PoolSnapshot::new(units(1_000_000_000), U256::one(), units(10_000), units(10_000));
        let why = sel.plan_deposit(&snap).unwrap().unwrap_err();
        assert!(matches!(why, Infeasible::RatioMismatch { .. }));
    }

    #[test]
    fn infeasibility_converts_to_recoverable_error() {
        let err = SimError::from(Infeasible::InsufficientShares {
            balance: U256::zero(),
        });
        assert!(matches!(err, SimError::InfeasibleAction(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn oversized_b_leg_is_infeasible_not_fatal() {
        let mut sel = ActionSelector::new(SelectorConfig::default(), 2);
        // One base unit of A against the largest B reserve: B per A overflows U256.
        let snap = PoolSnapshot::new(U256::one(), U256::MAX, units(10_000), units(10_000));
        let why = sel.plan_deposit(&snap).unwrap().unwrap_err();
        assert!(matches!(
            why,
            Infeasible::InsufficientBalance { required_b, .. } if required_b == U256::MAX
        ));
    }

    #[test]
    fn withdraw_requires_a_tenth_of_a_share() {
        let mut sel = ActionSelector::new(SelectorConfig::default(), 5);
        let dust = U256::exp10(17) - U256::one();
        assert!(matches!(
            sel.plan_withdraw(dust),
            Err(Infeasible::InsufficientShares { .. })
        ));
        let plan = sel.plan_withdraw(U256::exp10(17)).unwrap();
        assert_eq!(plan.shares, U256::exp10(17));
    }

    #[test]
    fn swap_below_minimum_is_infeasible() {
        let mut sel = ActionSelector::new(SelectorConfig::default(), 5);
        // 10% of 90 is 9 units.
        let snap = snapshot(90, 90, 1_000, 1_000);
        assert!(sel.plan_swap(&snap, SwapDirection::AToB).is_err());
        // Balance of 9 caps below the minimum too.
        let snap = snapshot(10_000, 10_000, 9, 9);
        assert!(sel.plan_swap(&snap, SwapDirection::BToA).is_err());
    }

    proptest! {
        #[test]
        fn deposits_stay_within_tolerance(
            reserve_a in 1u64..10_000_000,
            reserve_b in 1u64..10_000_000,
            balance_a in 0u64..20_000,
            balance_b in 0u64..20_000_000,
            seed in any::<u64>(),
        ) {
            let mut sel = ActionSelector::new(SelectorConfig::default(), seed);
            let snap = snapshot(reserve_a, reserve_b, balance_a, balance_b);
            if let Ok(plan) = sel.plan_deposit(&snap).unwrap() {
                prop_assert!((plan.expected_ratio - plan.computed_ratio).abs() <= 1e-4);
                prop_assert!(plan.amount_a <= snap.balance_a);
                prop_assert!(plan.amount_b <= snap.balance_b);
                prop_assert!(!plan.amount_b.is_zero());
            }
        }

        #[test]
        fn swaps_respect_bounds(
            reserve_a in 1u64..10_000_000,
            reserve_b in 1u64..10_000_000,
            balance_a in 0u64..100_000,
            balance_b in 0u64..100_000,
            a_to_b in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let mut sel = ActionSelector::new(SelectorConfig::default(), seed);
            let snap = snapshot(reserve_a, reserve_b, balance_a, balance_b);
            let direction = if a_to_b { SwapDirection::AToB } else { SwapDirection::BToA };
            if let Ok(plan) = sel.plan_swap(&snap, direction) {
                let (reserve_in, _) = snap.reserves_for(direction);
                let cap = snap.balance_for(direction).min(reserve_in / U256::from(10u8));
                prop_assert!(plan.amount_in >= units(10));
                prop_assert!(plan.amount_in <= cap);
                if direction == SwapDirection::BToA {
                    prop_assert!(plan.amount_in <= units(1_000));
                }
            }
        }

        #[test]
        fn withdrawals_are_tenth_multiples_within_balance(raw in 0u128..(1u128 << 100), seed in any::<u64>()) {
            let mut sel = ActionSelector::new(SelectorConfig::default(), seed);
            let balance = U256::from(raw);
            if let Ok(plan) = sel.plan_withdraw(balance) {
                prop_assert!(plan.shares <= balance);
                prop_assert!(!plan.shares.is_zero());
                prop_assert!((plan.shares % U256::exp10(17)).is_zero());
            }
        }
    }
}
