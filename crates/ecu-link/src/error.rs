//! ECU Link Error Types

use sensor_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur while talking to the ECU or the gauge stream
#[derive(Debug, Error)]
pub enum EcuError {
    /// Serial port could not be opened, configured or used
    #[error("Serial link error: {0}")]
    Link(String),

    /// No USB serial bridge matched the vendor/product id
    #[error("No USB serial adapter with VID {vendor_id:04X} PID {product_id:04X} found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The device end of the link went away
    #[error("Serial link closed by the device")]
    LinkClosed,

    /// Identification exchange returned an unexpected byte count
    #[error("ECU initialization failed after sending {sent:#04x}: expected 1..=2 byte(s), got {received}")]
    Handshake { sent: u8, received: usize },

    /// Polled request produced no response bytes
    #[error("Sensor {sensor_id:#06x}: expected at least one byte, got 0")]
    EmptyResponse { sensor_id: u16 },

    /// Raw value could not be turned into a reading
    #[error("Protocol error: {0}")]
    Protocol(#[from] RegistryError),

    /// Streaming frame shorter than the minimum viable length
    #[error("Malformed frame detected (runt): {len} byte(s)")]
    MalformedFrame { len: usize },
}

impl EcuError {
    /// Whether the error ends the task that hit it.
    ///
    /// Link and handshake failures are fatal; everything else is confined to a
    /// single request, record or frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EcuError::Link(_)
                | EcuError::DeviceNotFound { .. }
                | EcuError::LinkClosed
                | EcuError::Handshake { .. }
        )
    }
}

impl From<std::io::Error> for EcuError {
    fn from(err: std::io::Error) -> Self {
        EcuError::Link(err.to_string())
    }
}

impl From<tokio_serial::Error> for EcuError {
    fn from(err: tokio_serial::Error) -> Self {
        EcuError::Link(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(EcuError::LinkClosed.is_fatal());
        assert!(EcuError::Handshake { sent: 0xFF, received: 0 }.is_fatal());
        assert!(!EcuError::EmptyResponse { sensor_id: 0x21 }.is_fatal());
        assert!(!EcuError::MalformedFrame { len: 3 }.is_fatal());
        assert!(!EcuError::Protocol(RegistryError::UnknownSensor(99)).is_fatal());
    }

    #[test]
    fn test_io_error_is_link_error() {
        let err: EcuError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, EcuError::Link(_)));
    }
}
