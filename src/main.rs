//! # Load Balancer Simulator - Main Entry Point
//!
//! Runs one simulation and prints its result as JSON on stdout.
//!
//! ## Environment
//!
//! - `LBSIM_CONFIG_PATH`: YAML or JSON config file; built-in defaults when unset
//! - `LBSIM_MODE`: `ab-test` (default), `quick-sim` or `dispatch`
//! - any `LBSIM_*` override understood by `SimulatorConfig`
//!
//! In `ab-test` mode Ctrl-C stops the run early and the partial, finalized
//! results are printed.

use anyhow::{bail, Context};
use tokio::signal;
use tracing::{error, info, warn};

use lb_simulator::observability::init_logging;
use lb_simulator::traffic::run_configured_quick_sim;
use lb_simulator::{AbTestSession, QuickSimRequest, SimulatorConfig, TrafficDispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting load balancer simulator");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mode = std::env::var("LBSIM_MODE").unwrap_or_else(|_| "ab-test".to_string());
    let output = match mode.as_str() {
        "ab-test" => run_ab_test(&config).await?,
        "quick-sim" => {
            let report = run_configured_quick_sim(&config, &QuickSimRequest::default());
            serde_json::to_string_pretty(&report)?
        }
        "dispatch" => {
            let mut dispatcher = TrafficDispatcher::from_config(&config)?;
            let batch = dispatcher
                .dispatch(config.quick_sim.count)
                .context("Dispatch failed")?;
            serde_json::to_string_pretty(&batch)?
        }
        other => bail!("Unknown LBSIM_MODE '{}': expected ab-test, quick-sim or dispatch", other),
    };

    println!("{}", output);
    info!("Simulator finished");
    Ok(())
}

async fn load_config() -> anyhow::Result<SimulatorConfig> {
    let config = match std::env::var("LBSIM_CONFIG_PATH") {
        Ok(path) => SimulatorConfig::load(&path)
            .await
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => SimulatorConfig::from_env().context("Invalid environment configuration")?,
    };
    Ok(config)
}

/// Run the timed comparison until it completes or Ctrl-C arrives
async fn run_ab_test(config: &SimulatorConfig) -> anyhow::Result<String> {
    let session = AbTestSession::from_config(config)?;
    let ack = session.start()?;
    info!(
        group_a = ack.config.group_a_algorithm.as_str(),
        group_b = ack.config.group_b_algorithm.as_str(),
        request_count = ack.config.request_count,
        "A/B run in progress"
    );

    tokio::select! {
        _ = session.wait_until_finished() => {}
        result = signal::ctrl_c() => match result {
            Ok(()) => {
                warn!("Received Ctrl-C, stopping A/B run");
                if let Err(e) = session.stop() {
                    // the run may have finished between the signal and the stop
                    info!("Stop skipped: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to listen for Ctrl-C, running to completion: {}", e);
                session.wait_until_finished().await;
            }
        },
    }

    Ok(serde_json::to_string_pretty(&session.status())?)
}
