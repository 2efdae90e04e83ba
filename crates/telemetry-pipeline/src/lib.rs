//! Telemetry Pipeline
//!
//! Concurrent tasks that turn ECU traffic into one stream of converted
//! readings:
//! - scheduler -> raw responses -> decoder -> readings (polled protocol)
//! - gauge frames -> readings (streaming protocol)
//! - `<sensorKey>|<value>` lines -> readings (ingest listener)

mod decoder;
mod error;
mod ingest;
mod pipeline;
mod stream;

pub use decoder::ResponseDecoder;
pub use error::{IngestError, PipelineError};
pub use ingest::{parse_line, IngestListener};
pub use pipeline::{PipelineBuilder, PipelineHandle, DEFAULT_CHANNEL_CAPACITY};
pub use stream::{StreamDecoder, StreamStats};
