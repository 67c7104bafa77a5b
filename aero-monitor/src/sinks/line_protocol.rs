//! InfluxDB line protocol encoding

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

/// One point: `measurement,tag=v field=v timestamp`
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp_ns: Option<i64>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ns: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), FieldValue::Float(value)));
        self
    }

    pub fn int_field(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.push((key.into(), FieldValue::Integer(value)));
        self
    }

    pub fn timestamp_ns(mut self, nanos: i64) -> Self {
        self.timestamp_ns = Some(nanos);
        self
    }

    pub fn to_line(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape(key, TAG_SPECIALS), escape(value, TAG_SPECIALS));
        }
        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape(key, TAG_SPECIALS));
            line.push('=');
            match value {
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{v}i");
                }
            }
        }
        if let Some(ts) = self.timestamp_ns {
            let _ = write!(line, " {ts}");
        }
        line
    }
}

const TAG_SPECIALS: &[char] = &[',', '=', ' '];

fn escape(raw: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
