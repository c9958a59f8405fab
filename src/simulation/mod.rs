//! Randomized single-pool workload and the metrics it produces.

pub mod metrics;
pub mod provision;
pub mod runner;
pub mod selector;

pub use metrics::{LpSeries, MetricsSeries, MetricsTotals, Observation};
pub use runner::{DexSimulation, RunConfig};
pub use selector::{ActionSelector, Attempt, Infeasible, SelectorConfig, StepResult};
