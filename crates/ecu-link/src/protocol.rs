//! Wire Protocol Definitions

use serde::{Deserialize, Serialize};
use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// The two telemetry protocols spoken over serial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkProtocol {
    /// Request/response ECU protocol behind a USB serial bridge
    Polled,
    /// Continuous gauge stream on a fixed serial port
    Streaming,
}

impl LinkProtocol {
    /// Line speed for this protocol
    pub fn baud_rate(&self) -> u32 {
        match self {
            LinkProtocol::Polled => 15625,
            LinkProtocol::Streaming => 19200,
        }
    }

    /// Whether the ECU must be woken and identified before use
    pub fn needs_handshake(&self) -> bool {
        matches!(self, LinkProtocol::Polled)
    }

    /// Full line configuration: 8-N-1, no flow control
    pub fn line_settings(&self) -> LineSettings {
        LineSettings {
            baud_rate: self.baud_rate(),
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            low_latency: matches!(self, LinkProtocol::Polled),
        }
    }
}

/// Serial line parameters applied during link initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// Ask the adapter for its smallest receive latency timer
    pub low_latency: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polled_line_settings() {
        let settings = LinkProtocol::Polled.line_settings();
        assert_eq!(settings.baud_rate, 15625);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.flow_control, FlowControl::None);
        assert!(settings.low_latency);
    }

    #[test]
    fn test_streaming_line_settings() {
        let settings = LinkProtocol::Streaming.line_settings();
        assert_eq!(settings.baud_rate, 19200);
        assert!(!settings.low_latency);
        assert!(!LinkProtocol::Streaming.needs_handshake());
    }
}
