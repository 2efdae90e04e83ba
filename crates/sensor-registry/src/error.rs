//! Registry Error Types

use thiserror::Error;

/// Errors raised while turning a raw magnitude into a reading
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Id not present in the sensor table
    #[error("Unknown sensor id {0:#06x}")]
    UnknownSensor(u16),

    /// Conversion produced NaN or infinity
    #[error("Sensor {id:#06x} conversion of raw value {raw} is not a finite number")]
    NonFiniteValue { id: u16, raw: f64 },
}
