//! Wiring from configuration to a ready-to-run scheduler

use crate::clock::SystemClock;
use crate::config::MonitorConfig;
use crate::model::SensorId;
use crate::scheduler::{Scheduler, SensorSpec};
use crate::sensors::{AmbientPort, IioDht11, SensorPort};
use crate::sinks::{BusClient, BusPublisher, HttpTransport, InfluxWriter, ReadingSink};
use anyhow::{Context, Result};
use tracing::{error, info};

/// Builds the sinks for one sensor registration.
///
/// Each sensor gets its own sink instances; they share the underlying
/// MQTT request queue and HTTP connection pool.
pub struct SinkSet<C> {
    bus: Option<C>,
    influx: Option<HttpTransport>,
    config: MonitorConfig,
}

impl<C: BusClient + Clone + 'static> SinkSet<C> {
    /// Must run outside an async context: the HTTP transport is blocking.
    pub fn new(config: &MonitorConfig, bus: Option<C>) -> Result<Self> {
        let influx = if config.influx.enabled {
            Some(HttpTransport::new(&config.influx).context("Failed to build InfluxDB client")?)
        } else {
            None
        };
        Ok(Self { bus, influx, config: config.clone() })
    }

    pub fn build(&self) -> Vec<Box<dyn ReadingSink>> {
        let mut sinks: Vec<Box<dyn ReadingSink>> = Vec::new();
        if let Some(client) = &self.bus {
            sinks.push(Box::new(BusPublisher::new(client.clone(), self.config.mqtt.topics.clone())));
        }
        if let Some(transport) = &self.influx {
            sinks.push(Box::new(InfluxWriter::new(transport.clone(), self.config.influx.host_tag.clone())));
        }
        sinks
    }
}

/// Register every enabled sensor whose hardware can be opened.
///
/// A sensor that cannot be opened is treated like a fatal driver error at
/// startup: logged and left out, the others still run.
pub fn build_scheduler<C: BusClient + Clone + 'static>(
    config: &MonitorConfig,
    sinks: &SinkSet<C>,
) -> Result<Scheduler> {
    let mut scheduler = Scheduler::new(SystemClock::new()).with_idle(config.scheduler.idle());

    if config.light.enabled {
        match open_light(config) {
            Ok(port) => {
                let spec = SensorSpec { id: SensorId::Light, interval: config.light.interval(), port };
                scheduler.register(spec, sinks.build()).context("Failed to register light sensor")?;
            }
            Err(e) => error!(sensor = %SensorId::Light, error = %e, "light sensor unavailable"),
        }
    }

    if config.ambient.enabled {
        let port = AmbientPort::new(IioDht11::new(&config.ambient.device));
        let spec = SensorSpec::new(SensorId::Ambient, config.ambient.interval(), port);
        scheduler.register(spec, sinks.build()).context("Failed to register ambient sensor")?;
    }

    info!(active = scheduler.active_sensors(), "scheduler configured");
    Ok(scheduler)
}

#[cfg(target_os = "linux")]
fn open_light(config: &MonitorConfig) -> Result<Box<dyn SensorPort>> {
    use crate::sensors::gpio::GpioLine;
    use crate::sensors::RcTimingLight;

    let line = GpioLine::open(config.light.bcm_pin)?;
    Ok(Box::new(RcTimingLight::new(line, SystemClock::new(), config.light.timing())))
}

#[cfg(not(target_os = "linux"))]
fn open_light(_config: &MonitorConfig) -> Result<Box<dyn SensorPort>> {
    anyhow::bail!("GPIO light sensing requires Linux")
}
