//! Aero Bridge
//!
//! Listens on `aero/#`, records pump, pressure and mister events in
//! InfluxDB, and hands the last mist time back to the controller whenever it
//! reports `CONNECTED`.

mod config;
mod influx;
mod routing;

use anyhow::Result;
use config::BridgeConfig;
use influx::EventWriter;
use rumqttc::{AsyncClient, Event, Incoming, QoS};
use routing::{route, Action, BridgeState, SUBSCRIPTION};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aero_bridge=info")),
        )
        .init();

    info!("Aero bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = BridgeConfig::from_env(|key| std::env::var(key).ok())?;
    let writer = Arc::new(EventWriter::new(&config.influx)?);
    let (client, mut eventloop) = aero_monitor::sinks::mqtt::connect(&config.mqtt);
    info!("Listening on {}:{} for {}", config.mqtt.host, config.mqtt.port, SUBSCRIPTION);

    let mut state = BridgeState::default();
    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                // clean session: subscribe again after every reconnect
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("MQTT connected");
                    if let Err(e) = client.try_subscribe(SUBSCRIPTION, QoS::AtLeastOnce) {
                        error!("Subscribe to {} failed: {}", SUBSCRIPTION, e);
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    debug!(topic = %p.topic, payload = %String::from_utf8_lossy(&p.payload), "message");
                    let action = state.apply(route(&p.topic, &p.payload, &state));
                    handle(action, &client, &writer);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stop signal received");
                break;
            }
        }
    }

    client.try_disconnect().ok();
    info!("Aero bridge stopped");
    Ok(())
}

/// Never awaits: this runs on the task that polls the event loop.
fn handle(action: Action, client: &AsyncClient, writer: &Arc<EventWriter>) {
    match action {
        Action::Publish { topic, payload } => {
            info!("Sending {}={}", topic, payload);
            if let Err(e) = client.try_publish(topic, QoS::AtLeastOnce, false, payload) {
                error!("Publish to {} failed: {}", topic, e);
            }
        }
        Action::Remember(value) => info!("Saved lastMistTime={}", value),
        Action::Record(point) => {
            let writer = Arc::clone(writer);
            tokio::spawn(async move {
                match writer.write(point).await {
                    Ok(line) => info!("Recorded {}", line),
                    Err(e) => error!("Failed to record event: {:#}", e),
                }
            });
        }
        Action::Malformed { topic, reason } => warn!("Ignoring {}: {}", topic, reason),
        Action::Ignore => {}
    }
}
