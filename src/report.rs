//! Final run report.

use crate::arbitrage::ArbitrageReport;
use crate::simulation::{MetricsSeries, MetricsTotals};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunReport {
    Dex {
        seed: u64,
        totals: MetricsTotals,
        series: MetricsSeries,
    },
    Arbitrage {
        seed: u64,
        invocations: Vec<ArbitrageReport>,
    },
}

impl RunReport {
    pub fn dex(seed: u64, series: MetricsSeries) -> Self {
        RunReport::Dex {
            seed,
            totals: series.totals(),
            series,
        }
    }

    pub fn arbitrage(seed: u64, invocations: Vec<ArbitrageReport>) -> Self {
        RunReport::Arbitrage { seed, invocations }
    }

    pub fn seed(&self) -> u64 {
        match self {
            RunReport::Dex { seed, .. } | RunReport::Arbitrage { seed, .. } => *seed,
        }
    }
}
