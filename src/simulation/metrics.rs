//! Index-aligned time series for one run.
//!
//! Slot 0 holds the seeded starting state, slot `i` the outcome of step `i`.
//! Outcome fields of a slot are written together by [`MetricsSeries::commit`]
//! and never twice; state fields (ratio, TVL, LP shares) are refreshed after
//! every step whether it committed or failed.

use crate::amount;
use crate::dex::{Ledger, Pool, SwapDirection, calc};
use crate::errors::{Result, SimError};
use crate::models::StepOutcome;
use ethers::types::{Address, U256};
use serde::Serialize;

/// LP share balance of one provider over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LpSeries {
    pub lp: Address,
    pub shares: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSeries {
    pub swap_volume_a: Vec<f64>,
    pub swap_volume_b: Vec<f64>,
    pub fees_a: Vec<f64>,
    pub fees_b: Vec<f64>,
    pub reserve_ratio: Vec<f64>,
    pub slippage_a_to_b: Vec<f64>,
    pub slippage_b_to_a: Vec<f64>,
    pub tvl: Vec<f64>,
    pub lp_distribution: Vec<LpSeries>,
    #[serde(skip)]
    committed: Vec<bool>,
}

/// Pool state read back after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub lp_shares: Vec<(Address, U256)>,
}

impl Observation {
    /// Read reserves and every LP's share balance.
    pub async fn read<P: Pool>(pool: &P, lps: &[Address]) -> Result<Self> {
        let (reserve_a, reserve_b) = futures::try_join!(pool.reserve_a(), pool.reserve_b())?;
        let mut lp_shares = Vec::with_capacity(lps.len());
        for &lp in lps {
            lp_shares.push((lp, pool.lp_token().balance_of(lp).await?));
        }
        Ok(Self {
            reserve_a,
            reserve_b,
            lp_shares,
        })
    }
}

/// Run-level aggregates of a finished series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsTotals {
    pub swap_volume_a: f64,
    pub swap_volume_b: f64,
    pub fees_a: f64,
    pub fees_b: f64,
    pub final_ratio: f64,
    pub final_tvl: f64,
}

impl MetricsSeries {
    pub fn new(steps: usize, lps: &[Address]) -> Self {
        Self {
            swap_volume_a: vec![0.0; steps],
            swap_volume_b: vec![0.0; steps],
            fees_a: vec![0.0; steps],
            fees_b: vec![0.0; steps],
            reserve_ratio: vec![0.0; steps],
            slippage_a_to_b: vec![0.0; steps],
            slippage_b_to_a: vec![0.0; steps],
            tvl: vec![0.0; steps],
            lp_distribution: lps
                .iter()
                .map(|&lp| LpSeries {
                    lp,
                    shares: vec![0.0; steps],
                })
                .collect(),
            committed: vec![false; steps],
        }
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    pub fn is_committed(&self, index: usize) -> bool {
        self.committed.get(index).copied().unwrap_or(false)
    }

    fn check_slot(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(SimError::Config(format!(
                "metrics slot {index} outside run of {} steps",
                self.len()
            )));
        }
        Ok(())
    }

    /// Write the outcome fields of slot `index`.
    pub fn commit(&mut self, index: usize, outcome: &StepOutcome) -> Result<()> {
        self.check_slot(index)?;
        if self.committed[index] {
            return Err(SimError::SlotRewrite { index });
        }
        if let StepOutcome::Swapped {
            direction,
            amount_in,
            amount_out,
            fee,
            slippage_pct,
            ..
        } = outcome
        {
            let (volume_a, volume_b) = match direction {
                SwapDirection::AToB => (*amount_in, *amount_out),
                SwapDirection::BToA => (*amount_out, *amount_in),
            };
            self.swap_volume_a[index] += amount::to_f64(volume_a);
            self.swap_volume_b[index] += amount::to_f64(volume_b);
            match direction {
                SwapDirection::AToB => {
                    self.fees_a[index] += amount::to_f64(*fee);
                    self.slippage_a_to_b[index] = *slippage_pct;
                }
                SwapDirection::BToA => {
                    self.fees_b[index] += amount::to_f64(*fee);
                    self.slippage_b_to_a[index] = *slippage_pct;
                }
            }
        }
        self.committed[index] = true;
        Ok(())
    }

    /// Refresh the state fields of slot `index`.
    ///
    /// `ratio` is the ratio observed when the step was decided; without one
    /// the observation's own reserves are used. TVL is `2 x reserveA`.
    pub fn refresh(&mut self, index: usize, ratio: Option<f64>, observed: &Observation) -> Result<()> {
        self.check_slot(index)?;
        if let Some(ratio) =
            ratio.or_else(|| calc::reserve_ratio(observed.reserve_a, observed.reserve_b))
        {
            self.reserve_ratio[index] = ratio;
        }
        self.tvl[index] = calc::tvl_estimate(observed.reserve_a);
        for series in &mut self.lp_distribution {
            if let Some((_, shares)) = observed.lp_shares.iter().find(|(lp, _)| *lp == series.lp) {
                series.shares[index] = amount::to_f64(*shares);
            }
        }
        Ok(())
    }

    pub fn totals(&self) -> MetricsTotals {
        MetricsTotals {
            swap_volume_a: self.swap_volume_a.iter().sum(),
            swap_volume_b: self.swap_volume_b.iter().sum(),
            fees_a: self.fees_a.iter().sum(),
            fees_b: self.fees_b.iter().sum(),
            final_ratio: self.reserve_ratio.last().copied().unwrap_or(0.0),
            final_tvl: self.tvl.last().copied().unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::units;
    use crate::models::ActionKind;

    fn lp(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn swap(direction: SwapDirection) -> StepOutcome {
        StepOutcome::Swapped {
            trader: lp(9),
            direction,
            amount_in: units(20),
            amount_out: units(25),
            fee: units(1),
            slippage_pct: -2.5,
        }
    }

    #[test]
    fn every_series_has_run_length() {
        let m = MetricsSeries::new(12, &[lp(1), lp(2)]);
        assert_eq!(m.len(), 12);
        for series in [
            &m.swap_volume_a,
            &m.swap_volume_b,
            &m.fees_a,
            &m.fees_b,
            &m.reserve_ratio,
            &m.slippage_a_to_b,
            &m.slippage_b_to_a,
            &m.tvl,
        ] {
            assert_eq!(series.len(), 12);
        }
        assert!(m.lp_distribution.iter().all(|s| s.shares.len() == 12));
    }

    #[test]
    fn swap_commit_fills_direction_fields() {
        let mut m = MetricsSeries::new(3, &[]);
        m.commit(1, &swap(SwapDirection::AToB)).unwrap();
        assert_eq!(m.swap_volume_a[1], 20.0);
        assert_eq!(m.swap_volume_b[1], 25.0);
        assert_eq!(m.fees_a[1], 1.0);
        assert_eq!(m.fees_b[1], 0.0);
        assert_eq!(m.slippage_a_to_b[1], -2.5);
        assert_eq!(m.slippage_b_to_a[1], 0.0);

        m.commit(2, &swap(SwapDirection::BToA)).unwrap();
        assert_eq!(m.swap_volume_a[2], 25.0);
        assert_eq!(m.swap_volume_b[2], 20.0);
        assert_eq!(m.fees_b[2], 1.0);
        assert_eq!(m.slippage_b_to_a[2], -2.5);
    }

    #[test]
    fn slot_is_written_once() {
        let mut m = MetricsSeries::new(2, &[]);
        m.commit(1, &StepOutcome::NoOp { action: ActionKind::Deposit }).unwrap();
        assert!(matches!(
            m.commit(1, &swap(SwapDirection::AToB)),
            Err(SimError::SlotRewrite { index: 1 })
        ));
        assert_eq!(m.swap_volume_a[1], 0.0);
        assert!(m.commit(2, &swap(SwapDirection::AToB)).is_err());
    }

    #[test]
    fn refresh_tracks_state() {
        let mut m = MetricsSeries::new(2, &[lp(1), lp(2)]);
        let observed = Observation {
            reserve_a: units(1000),
            reserve_b: units(1500),
            lp_shares: vec![(lp(1), units(3)), (lp(2), U256::zero())],
        };
        m.refresh(0, None, &observed).unwrap();
        assert_eq!(m.reserve_ratio[0], 1000.0 / 1500.0);
        assert_eq!(m.tvl[0], 2000.0);
        assert_eq!(m.lp_distribution[0].shares[0], 3.0);

        m.refresh(1, Some(0.5), &observed).unwrap();
        assert_eq!(m.reserve_ratio[1], 0.5);
        assert!(!m.is_committed(1));
    }

    #[test]
    fn totals_sum_series() {
        let mut m = MetricsSeries::new(3, &[]);
        m.commit(1, &swap(SwapDirection::AToB)).unwrap();
        m.commit(2, &swap(SwapDirection::AToB)).unwrap();
        let t = m.totals();
        assert_eq!(t.swap_volume_a, 40.0);
        assert_eq!(t.fees_a, 2.0);
    }
}
