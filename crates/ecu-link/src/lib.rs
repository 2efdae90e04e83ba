//! ECU Link
//!
//! Serial link setup for the two telemetry protocols, the polled ECU wake-up
//! handshake, and the codecs that turn device bytes into raw sensor values.

mod error;
mod frame;
mod handshake;
mod link;
mod mock;
mod polled;
mod protocol;

pub use error::EcuError;
pub use frame::{records, FrameReader, FrameRecord, MAX_FRAME_LEN, MIN_FRAME_LEN, RECORD_LEN};
pub use handshake::{
    handshake, open_polled, open_streaming, prepare, EcuIdentity, HandshakeTiming, PolledTarget,
    DEFAULT_BREAK_MS, DEFAULT_RESPONSE_TIMEOUT_MS,
};
pub use link::{find_usb_port, open_serial, EcuLink};
pub use mock::{EventLog, LinkEvent, MockLink, MockReply};
pub use polled::{PolledCodec, RawResponse, SensorRequest, RESPONSE_CAPACITY};
pub use protocol::{LineSettings, LinkProtocol};

/// Wire constants
pub mod wire {
    /// USB vendor id of the polled-protocol serial bridge (FTDI)
    pub const POLLED_VENDOR_ID: u16 = 0x0403;
    /// USB product id of the polled-protocol serial bridge (FT232R)
    pub const POLLED_PRODUCT_ID: u16 = 0x6001;
    /// Identification bytes sent after the wake-up break
    pub const HANDSHAKE_BYTES: [u8; 2] = [0xFF, 0xFE];
    /// Default serial device of the streaming gauge
    pub const STREAMING_DEVICE: &str = "/dev/ttyS0";
    /// Streaming frame terminator, `@`
    pub const FRAME_SENTINEL: u8 = 0x40;
}
