//! Reading sinks: where every successful sample is delivered
//!
//! - `mqtt`: one scalar message per reading field
//! - `influx`: one line-protocol point per reading
//! - `line_protocol`: point encoding shared with the bridge daemon

pub mod influx;
pub mod line_protocol;
pub mod mqtt;

use crate::error::SinkError;
use crate::model::Sample;

pub use influx::{HttpTransport, InfluxWriter, LineTransport};
pub use line_protocol::{FieldValue, Point};
pub use mqtt::{BusClient, BusPublisher, Topics};

/// A downstream consumer of samples. Emission is fire-and-forget: the
/// scheduler only looks at success or failure.
pub trait ReadingSink: Send {
    fn name(&self) -> &str;

    fn emit(&mut self, sample: &Sample) -> Result<(), SinkError>;
}

impl<S: ReadingSink + ?Sized> ReadingSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn emit(&mut self, sample: &Sample) -> Result<(), SinkError> {
        (**self).emit(sample)
    }
}
