//! Serial Link Abstraction
//!
//! `EcuLink` is the byte pipe plus the handful of line controls the ECU
//! handshake needs. The real implementation is `tokio_serial::SerialStream`;
//! tests use [`crate::MockLink`].

use crate::error::EcuError;
use crate::protocol::LineSettings;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialPortType, SerialStream};
use tracing::{debug, info, warn};

/// A byte-oriented serial link with line control
pub trait EcuLink: AsyncRead + AsyncWrite + Unpin + Send {
    /// Reset the adapter
    fn reset(&mut self) -> Result<(), EcuError>;

    /// Discard anything buffered in either direction
    fn purge(&mut self) -> Result<(), EcuError>;

    /// Apply line parameters
    fn configure(&mut self, settings: &LineSettings) -> Result<(), EcuError>;

    /// Assert (`true`) or release (`false`) a break condition on TX
    fn set_break_condition(&mut self, asserted: bool) -> Result<(), EcuError>;
}

impl EcuLink for SerialStream {
    fn reset(&mut self) -> Result<(), EcuError> {
        // Drop and raise DTR; USB bridges treat this as a modem-line reset.
        SerialPort::write_data_terminal_ready(self, false)?;
        SerialPort::write_data_terminal_ready(self, true)?;
        Ok(())
    }

    fn purge(&mut self) -> Result<(), EcuError> {
        SerialPort::clear(self, ClearBuffer::All)?;
        Ok(())
    }

    fn configure(&mut self, settings: &LineSettings) -> Result<(), EcuError> {
        SerialPort::set_baud_rate(self, settings.baud_rate)?;
        SerialPort::set_data_bits(self, settings.data_bits)?;
        SerialPort::set_stop_bits(self, settings.stop_bits)?;
        SerialPort::set_parity(self, settings.parity)?;
        SerialPort::set_flow_control(self, settings.flow_control)?;

        if settings.low_latency {
            if let Some(name) = SerialPort::name(self) {
                request_low_latency(&name);
            }
        }
        Ok(())
    }

    fn set_break_condition(&mut self, asserted: bool) -> Result<(), EcuError> {
        if asserted {
            SerialPort::set_break(self)?;
        } else {
            SerialPort::clear_break(self)?;
        }
        Ok(())
    }
}

/// Find the device path of the first USB serial bridge matching `vendor_id`/`product_id`
pub fn find_usb_port(vendor_id: u16, product_id: u16) -> Result<String, EcuError> {
    let ports = tokio_serial::available_ports()?;
    debug!("Enumerated {} serial port(s)", ports.len());

    ports
        .into_iter()
        .find_map(|port| match port.port_type {
            SerialPortType::UsbPort(info) if info.vid == vendor_id && info.pid == product_id => {
                Some(port.port_name)
            }
            _ => None,
        })
        .ok_or(EcuError::DeviceNotFound {
            vendor_id,
            product_id,
        })
}

/// Open a serial device with the given line settings
pub fn open_serial(path: &str, settings: &LineSettings) -> Result<SerialStream, EcuError> {
    info!("Opening serial link {} at {} baud", path, settings.baud_rate);

    tokio_serial::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .stop_bits(settings.stop_bits)
        .parity(settings.parity)
        .flow_control(settings.flow_control)
        .open_native_async()
        .map_err(|e| EcuError::Link(format!("{}: {}", path, e)))
}

/// FTDI bridges buffer received bytes for up to 16ms by default; the kernel
/// exposes the timer through sysfs. Failure only costs latency.
#[cfg(target_os = "linux")]
fn request_low_latency(device: &str) {
    let Some(tty) = std::path::Path::new(device).file_name() else {
        return;
    };
    let path = std::path::Path::new("/sys/bus/usb-serial/devices")
        .join(tty)
        .join("latency_timer");

    match std::fs::write(&path, "1") {
        Ok(()) => debug!("Latency timer set to 1ms via {}", path.display()),
        Err(e) => warn!("Could not lower latency timer at {}: {}", path.display(), e),
    }
}

#[cfg(not(target_os = "linux"))]
fn request_low_latency(device: &str) {
    debug!("Latency timer tuning not supported for {}", device);
}
