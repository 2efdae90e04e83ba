//! ECU Sensor Registry
//!
//! Static sensor tables for the polled ECU protocol and the streaming gauge
//! protocol, their conversion formulas, and the reading type published by the
//! telemetry pipeline.

mod conversion;
mod error;
mod reading;
mod sensor;
mod tables;

pub use conversion::Conversion;
pub use error::RegistryError;
pub use reading::{SensorReading, SourceType};
pub use sensor::{SensorDefinition, SensorRegistry, Tier};
pub use tables::{POLLED_SENSORS, STREAMING_SENSORS};
