//! health-monitor: run the self-healing loop over a configured topology

use anyhow::{Context, Result};
use clap::Parser;
use component_health::config::MonitorConfig;
use component_health::Orchestrator;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "health-monitor")]
#[command(about = "Component health tracking with cascading status and self-healing")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the default search order)
    #[arg(short, long, env = "HEALTH_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between self-healer cycles (overrides recovery.interval_secs)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Stop after this many cycles instead of running until Ctrl+C
    #[arg(long)]
    cycles: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let mut config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MonitorConfig::load(),
    };
    if let Some(secs) = args.interval_secs {
        config.recovery.interval_secs = secs;
    }
    config.validate().context("invalid configuration")?;

    let orchestrator = Orchestrator::from_config(&config);
    orchestrator.bridge_alerts();
    orchestrator.dispatcher().register_listener(|event| {
        info!(component = %event.component, state = %event.state, reason = %event.reason, "Health event");
        Ok(())
    });

    info!(
        monitor = %config.monitor.name,
        components = orchestrator.registry().len(),
        interval_secs = config.recovery.interval_secs,
        "Health monitor starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut healer = orchestrator.self_healer();
    if let Some(cycles) = args.cycles {
        healer = healer.with_max_cycles(cycles);
    }
    let summary = healer.run(cancel_token).await;

    info!(
        cycles = summary.check_cycles,
        recoveries = summary.total_recoveries,
        errors = summary.total_errors,
        "Health monitor stopped"
    );

    let report = serde_json::to_string_pretty(&orchestrator.report().to_value())?;
    println!("{report}");
    Ok(())
}
