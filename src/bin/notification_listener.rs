//! Notification Listener
//!
//! Connects the delivery layer using `config/relay.yaml` (or
//! `RELAY_CONFIG_PATH`), logs every notification it receives and reports
//! transport status periodically until Ctrl+C.

use anyhow::{Context, Result};
use notification_relay::bin_common::{format_status, load_config_from_env, parse_args, ConfigType, RunConfig};
use notification_relay::config::RelayConfig;
use notification_relay::logging::init_tracing_with_level;
use notification_relay::realtime::DeliveryOrchestrator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_type = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::Relay,
    };
    let config_path = load_config_from_env(config_type);

    let config = RelayConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    init_tracing_with_level(&config.log_level);

    let run_config = RunConfig::new("Notification Listener").with_status_interval(config.status_interval_secs);
    run_config.print_banner();

    let transport = config
        .transport_config()
        .context("Failed to build transport configuration")?;
    let orchestrator = DeliveryOrchestrator::new(transport);

    let received = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&received);
    let _subscription = orchestrator.subscribe_fn(move |message| {
        counter.fetch_add(1, Ordering::Relaxed);
        info!("Notification: {}", message);
    });

    let mode = orchestrator.initialize().await;
    info!("Delivery active in {} mode", mode);

    let mut status = tokio::time::interval(Duration::from_secs(run_config.status_interval_secs));
    status.tick().await;

    loop {
        tokio::select! {
            _ = status.tick() => {
                let diagnostics = orchestrator.diagnostics();
                info!("{}", format_status(&diagnostics, received.load(Ordering::Relaxed)));
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received shutdown signal (Ctrl+C)");
                break;
            }
        }
    }

    orchestrator.disconnect();

    let stats = format!("Received {} notifications", received.load(Ordering::Relaxed));
    run_config.print_shutdown(Some(&stats));
    Ok(())
}
