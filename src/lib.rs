//! Workload simulator for constant-product AMM pools.
//!
//! Drives randomized deposits, withdrawals and swaps against a pool and
//! records per-step metrics, or stages two pools into divergent states and
//! reports what an arbitrage contract does about it. The pools live either
//! on a node reached over JSON-RPC or in the in-process [`sandbox`].

pub mod amount;
pub mod arbitrage;
pub mod config;
pub mod dex;
pub mod errors;
pub mod models;
pub mod report;
pub mod runtime;
pub mod sandbox;
pub mod simulation;
pub mod utils;
