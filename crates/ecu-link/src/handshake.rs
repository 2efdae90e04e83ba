//! Link Initialization and ECU Handshake
//!
//! The polled ECU only starts talking after a 0x00 byte sent at 5 baud. UART
//! hardware cannot go that slow, so the line is held in break for the length
//! of that byte instead, then the ECU is asked for its id.

use crate::error::EcuError;
use crate::link::{find_usb_port, open_serial, EcuLink};
use crate::protocol::LinkProtocol;
use crate::wire::{HANDSHAKE_BYTES, POLLED_PRODUCT_ID, POLLED_VENDOR_ID};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Default length of the wake-up break
pub const DEFAULT_BREAK_MS: u64 = 1800;

/// Default time to wait for the ECU to answer a byte
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 500;

/// Where to find the polled-protocol adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledTarget {
    /// USB vendor id of the serial bridge
    pub vendor_id: u16,
    /// USB product id of the serial bridge
    pub product_id: u16,
    /// Explicit device path, bypassing USB enumeration
    pub device: Option<String>,
}

impl Default for PolledTarget {
    fn default() -> Self {
        Self {
            vendor_id: POLLED_VENDOR_ID,
            product_id: POLLED_PRODUCT_ID,
            device: None,
        }
    }
}

/// Timing of the wake-up and identification exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTiming {
    /// How long the break condition is held
    pub break_duration: Duration,
    /// How long to wait for each identification reply
    pub response_timeout: Duration,
}

impl Default for HandshakeTiming {
    fn default() -> Self {
        Self {
            break_duration: Duration::from_millis(DEFAULT_BREAK_MS),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
        }
    }
}

/// Bytes the ECU returned during identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcuIdentity(pub Vec<u8>);

impl fmt::Display for EcuIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Reset the adapter, drop stale bytes and apply the protocol's line settings
pub fn prepare<L: EcuLink>(link: &mut L, protocol: LinkProtocol) -> Result<(), EcuError> {
    link.reset()?;
    link.purge()?;
    link.configure(&protocol.line_settings())?;
    debug!("Link prepared for {:?} protocol", protocol);
    Ok(())
}

/// Wake the ECU and read back its identification.
///
/// Runs exactly once; any unexpected reply length is fatal.
pub async fn handshake<L: EcuLink>(
    link: &mut L,
    timing: &HandshakeTiming,
) -> Result<EcuIdentity, EcuError> {
    link.set_break_condition(true)?;
    sleep(timing.break_duration).await;
    link.set_break_condition(false)?;

    let mut identity = Vec::with_capacity(HANDSHAKE_BYTES.len() * 2);
    // One spare slot so an over-long reply is detected instead of truncated
    let mut buf = [0u8; 3];

    for sent in HANDSHAKE_BYTES {
        link.write_all(&[sent]).await?;
        link.flush().await?;

        let received = match timeout(timing.response_timeout, link.read(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => 0,
        };
        if !(1..=2).contains(&received) {
            return Err(EcuError::Handshake { sent, received });
        }
        identity.extend_from_slice(&buf[..received]);
    }

    let identity = EcuIdentity(identity);
    info!("ECU ID: {}", identity);
    Ok(identity)
}

/// Open and configure the polled ECU adapter.
///
/// The ECU is not woken yet; run [`handshake`] on the returned port before use.
pub fn open_polled(target: &PolledTarget) -> Result<SerialStream, EcuError> {
    let path = match &target.device {
        Some(path) => path.clone(),
        None => find_usb_port(target.vendor_id, target.product_id)?,
    };

    let protocol = LinkProtocol::Polled;
    let mut link = open_serial(&path, &protocol.line_settings())?;
    prepare(&mut link, protocol)?;
    Ok(link)
}

/// Open and configure the streaming gauge port. No handshake is needed.
pub fn open_streaming(device: &str) -> Result<SerialStream, EcuError> {
    let protocol = LinkProtocol::Streaming;
    let mut link = open_serial(device, &protocol.line_settings())?;
    prepare(&mut link, protocol)?;
    Ok(link)
}
