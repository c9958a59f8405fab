use amm_sim::{config::SimConfig, report::RunReport, runtime, utils};
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = SimConfig::from_env().context("loading configuration")?;
    tracing::info!(seed = config.seed, "[INIT] amm-sim starting");

    let report = match runtime::run(&config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, seed = config.seed, "[INIT] run aborted");
            return Err(e.into());
        }
    };

    match &report {
        RunReport::Dex { totals, series, .. } => tracing::info!(
            steps = series.len(),
            swap_volume_a = totals.swap_volume_a,
            swap_volume_b = totals.swap_volume_b,
            fees_a = totals.fees_a,
            fees_b = totals.fees_b,
            final_ratio = totals.final_ratio,
            final_tvl = totals.final_tvl,
            "[METRICS] run summary"
        ),
        RunReport::Arbitrage { invocations, .. } => {
            for invocation in invocations {
                let outcome = invocation
                    .outcome
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "call failed".into());
                let profit = invocation
                    .trade
                    .as_ref()
                    .map(|t| t.profit_achieved.as_str())
                    .unwrap_or("-");
                tracing::info!(
                    scenario = %invocation.scenario,
                    outcome = %outcome,
                    profit = %profit,
                    "[ARB] run summary"
                );
            }
        }
    }

    if let Some(path) = &config.report_path {
        utils::write_json(path, &report)
            .with_context(|| format!("writing report to {path}"))?;
        tracing::info!(path = %path, seed = report.seed(), "[METRICS] report written");
    }
    Ok(())
}
