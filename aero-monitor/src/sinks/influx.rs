//! Time-series writer sink
//!
//! One reading becomes one point tagged with the host label; multi-field
//! readings share a single timestamp, `captured_at` at nanosecond precision.

use super::line_protocol::Point;
use super::ReadingSink;
use crate::config::{InfluxApi, InfluxConfig};
use crate::error::SinkError;
use crate::model::{Reading, Sample};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use std::time::Duration;
use tracing::debug;

/// Delivers encoded line-protocol bodies.
pub trait LineTransport: Send {
    fn write(&self, body: &str) -> Result<(), SinkError>;
}

/// Write endpoint and query for the configured API version.
pub fn write_endpoint(config: &InfluxConfig) -> (String, Vec<(&'static str, String)>) {
    let base = config.url.trim_end_matches('/');
    match config.api {
        InfluxApi::V1 => (
            format!("{base}/write"),
            vec![("db", config.database.clone()), ("precision", "ns".to_string())],
        ),
        InfluxApi::V2 => (
            format!("{base}/api/v2/write"),
            vec![
                ("org", config.org.clone().unwrap_or_default()),
                ("bucket", config.bucket.clone().unwrap_or_default()),
                ("precision", "ns".to_string()),
            ],
        ),
    }
}

/// `Authorization` header value, if a token is configured.
pub fn authorization(config: &InfluxConfig) -> Option<String> {
    config.token.as_ref().map(|token| format!("Token {token}"))
}

/// Blocking HTTP transport. Must be created and dropped outside async contexts.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    query: Vec<(&'static str, String)>,
    authorization: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &InfluxConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let (url, query) = write_endpoint(config);
        Ok(Self { client, url, query, authorization: authorization(config) })
    }
}

impl LineTransport for HttpTransport {
    fn write(&self, body: &str) -> Result<(), SinkError> {
        let mut request = self.client.post(&self.url).query(&self.query).body(body.to_string());
        if let Some(auth) = &self.authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        let response = request.send().map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(SinkError::Rejected { status: status.as_u16(), body })
    }
}

/// Point for one sample: `light` or `ambient`, tagged `host=<host_tag>`.
pub fn point_for(sample: &Sample, host_tag: &str) -> Result<Point, SinkError> {
    let nanos = sample.captured_at.unix_nanos().ok_or(SinkError::TimestampOutOfRange)?;
    let point = match sample.reading {
        Reading::Light { intensity } => Point::new("light").tag("host", host_tag).field("light", intensity),
        Reading::Ambient { temperature_f, humidity_pct } => Point::new("ambient")
            .tag("host", host_tag)
            .field("temperature", temperature_f)
            .field("humidity", humidity_pct),
    };
    Ok(point.timestamp_ns(nanos))
}

pub struct InfluxWriter<T> {
    transport: T,
    host_tag: String,
}

impl<T: LineTransport> InfluxWriter<T> {
    pub fn new(transport: T, host_tag: impl Into<String>) -> Self {
        Self { transport, host_tag: host_tag.into() }
    }
}

impl<T: LineTransport> ReadingSink for InfluxWriter<T> {
    fn name(&self) -> &str {
        "influx"
    }

    fn emit(&mut self, sample: &Sample) -> Result<(), SinkError> {
        let line = point_for(sample, &self.host_tag)?.to_line();
        debug!(%line, "writing point");
        self.transport.write(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timestamp;
    use chrono::{TimeZone, Utc};

    fn sample(reading: Reading) -> Sample {
        Sample {
            reading,
            captured_at: Timestamp {
                since_start: Duration::from_secs(3),
                wall: Utc.timestamp_opt(1_700_000_000, 250).unwrap(),
            },
        }
    }

    #[test]
    fn test_light_point() {
        let line = point_for(&sample(Reading::Light { intensity: 123.5 }), "raspberrypi")
            .unwrap()
            .to_line();
        assert_eq!(line, "light,host=raspberrypi light=123.5 1700000000000000250");
    }

    #[test]
    fn test_ambient_point_shares_timestamp() {
        let reading = Reading::Ambient { temperature_f: 70.5, humidity_pct: 38.25 };
        let line = point_for(&sample(reading), "pi").unwrap().to_line();
        assert_eq!(line, "ambient,host=pi temperature=70.5,humidity=38.25 1700000000000000250");
    }

    #[test]
    fn test_endpoints() {
        let v1 = InfluxConfig::default();
        let (url, query) = write_endpoint(&v1);
        assert_eq!(url, "http://localhost:8086/write");
        assert_eq!(query, vec![("db", "aero".to_string()), ("precision", "ns".to_string())]);
        assert!(authorization(&v1).is_none());

        let v2 = InfluxConfig {
            url: "https://cloud.example/".to_string(),
            api: InfluxApi::V2,
            org: Some("home".to_string()),
            bucket: Some("aero".to_string()),
            token: Some("abc".to_string()),
            ..InfluxConfig::default()
        };
        let (url, query) = write_endpoint(&v2);
        assert_eq!(url, "https://cloud.example/api/v2/write");
        assert_eq!(query[0], ("org", "home".to_string()));
        assert_eq!(authorization(&v2).as_deref(), Some("Token abc"));
    }
}
