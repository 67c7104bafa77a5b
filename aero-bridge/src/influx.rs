use aero_monitor::config::InfluxConfig;
use aero_monitor::sinks::influx::{authorization, write_endpoint};
use aero_monitor::sinks::Point;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use std::time::Duration;

/// Async line-protocol writer for event points.
pub struct EventWriter {
    client: Client,
    url: String,
    query: Vec<(&'static str, String)>,
    authorization: Option<String>,
}

impl EventWriter {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let (url, query) = write_endpoint(config);
        Ok(Self { client, url, query, authorization: authorization(config) })
    }

    /// Stamps the point with the current time and writes it.
    pub async fn write(&self, point: Point) -> Result<String> {
        let nanos = Utc::now().timestamp_nanos_opt().context("System time out of range")?;
        let line = point.timestamp_ns(nanos).to_line();

        let mut request = self.client.post(&self.url).query(&self.query).body(line.clone());
        if let Some(auth) = &self.authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        let response = request.send().await.context("InfluxDB unreachable")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("InfluxDB rejected write ({}): {}", status.as_u16(), body);
        }
        Ok(line)
    }
}
