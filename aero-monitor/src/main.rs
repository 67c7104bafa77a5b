//! Aero Monitor binary
//!
//! The scheduler runs on its own OS thread (sensor reads and InfluxDB writes
//! block); the tokio runtime drives the MQTT connection and waits for
//! SIGINT/SIGTERM.

use aero_monitor::config::MonitorConfig;
use aero_monitor::daemon::{build_scheduler, SinkSet};
use aero_monitor::sinks::mqtt;
use aero_monitor::StopSignal;
use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aero_monitor=info")),
        )
        .init();

    info!("Aero monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::load().context("Failed to load configuration")?;

    let bus = if config.mqtt.enabled {
        let (client, eventloop) = mqtt::connect(&config.mqtt);
        mqtt::spawn_event_loop(eventloop);
        info!("MQTT publishing to {}:{}", config.mqtt.host, config.mqtt.port);
        Some(client)
    } else {
        None
    };

    let stop = StopSignal::new();
    let (done_tx, mut done_rx) = oneshot::channel();
    let loop_stop = stop.clone();
    std::thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || {
            let outcome = SinkSet::new(&config, bus)
                .and_then(|sinks| build_scheduler(&config, &sinks))
                .and_then(|mut scheduler| scheduler.run(&loop_stop).map_err(Into::into));
            let _ = done_tx.send(outcome);
        })
        .context("Failed to spawn scheduler thread")?;

    let outcome = tokio::select! {
        outcome = &mut done_rx => outcome,
        _ = shutdown_signal() => {
            info!("Stop signal received, releasing sensors...");
            stop.trigger();
            done_rx.await
        }
    };

    outcome.context("Scheduler thread exited without reporting")??;
    info!("Aero monitor stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
