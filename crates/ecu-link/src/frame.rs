//! Streaming Frame Codec
//!
//! The gauge stream is a run of `@`-terminated frames. After one leading
//! framing byte each frame carries fixed 5-byte records, followed by two
//! trailing bytes (the last being the sentinel):
//!
//! ```text
//! [start] [type_hi type_lo instance value_hi value_lo]* [x] [@]
//! ```
//!
//! Type and value are split 6-bit fields: `(hi << 6) | lo`.

use crate::error::EcuError;
use crate::wire::FRAME_SENTINEL;
use sensor_registry::{RegistryError, SensorReading, SensorRegistry};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

/// Frames shorter than this are runts
pub const MIN_FRAME_LEN: usize = 7;

/// Width of one sensor record
pub const RECORD_LEN: usize = 5;

/// Longest run of bytes accepted while waiting for a sentinel
pub const MAX_FRAME_LEN: usize = 512;

const LEADING_BYTES: usize = 1;
const TRAILING_BYTES: usize = 2;

/// One sensor record from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    pub sensor_type: u16,
    pub instance: u8,
    pub raw_value: u16,
}

impl FrameRecord {
    /// Parse a 5-byte record
    pub fn parse(bytes: &[u8; RECORD_LEN]) -> Self {
        Self {
            sensor_type: join_fields(bytes[0], bytes[1]),
            instance: bytes[2],
            raw_value: join_fields(bytes[3], bytes[4]),
        }
    }

    /// Convert through the streaming registry
    pub fn decode(&self, registry: &SensorRegistry) -> Result<SensorReading, RegistryError> {
        registry.decode(self.sensor_type, self.raw_value as f64, self.instance)
    }
}

fn join_fields(hi: u8, lo: u8) -> u16 {
    ((hi as u16) << 6) | lo as u16
}

/// Split a complete frame (sentinel included) into its records.
///
/// Only records lying wholly between the leading byte and the two trailing
/// bytes are returned; a partial record at the end is ignored.
pub fn records(frame: &[u8]) -> Result<impl Iterator<Item = FrameRecord> + '_, EcuError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(EcuError::MalformedFrame { len: frame.len() });
    }

    let body = &frame[LEADING_BYTES..frame.len() - TRAILING_BYTES];
    let leftover = body.len() % RECORD_LEN;
    if leftover != 0 {
        debug!("Ignoring {} trailing byte(s) of a {} byte frame", leftover, frame.len());
    }

    Ok(body.chunks_exact(RECORD_LEN).map(|chunk| {
        let mut record = [0u8; RECORD_LEN];
        record.copy_from_slice(chunk);
        FrameRecord::parse(&record)
    }))
}

/// Reads sentinel-terminated frames from a byte stream
pub struct FrameReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    overruns: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::with_capacity(64),
            overruns: 0,
        }
    }

    /// Times the reader gave up on a sentinel and resynchronized
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Next frame including its sentinel, or `None` at end of stream.
    ///
    /// More than [`MAX_FRAME_LEN`] bytes without a sentinel are discarded up to
    /// and including the next sentinel.
    ///
    /// Cancel-safe only between frames: dropping the future mid-frame loses the
    /// partial bytes already consumed.
    pub async fn next_frame(&mut self) -> Result<Option<&[u8]>, EcuError> {
        let mut discarding = false;
        loop {
            self.buf.clear();
            let read = (&mut self.inner)
                .take(MAX_FRAME_LEN as u64)
                .read_until(FRAME_SENTINEL, &mut self.buf)
                .await?;
            if read == 0 {
                return Ok(None);
            }

            if self.buf.last() == Some(&FRAME_SENTINEL) {
                if !discarding {
                    return Ok(Some(&self.buf));
                }
                debug!("Frame stream resynchronized");
                discarding = false;
                continue;
            }
            if read < MAX_FRAME_LEN {
                debug!("Stream ended inside a frame, dropping {} byte(s)", read);
                return Ok(None);
            }
            if !discarding {
                self.overruns += 1;
                warn!("No frame sentinel within {} bytes, resynchronizing", MAX_FRAME_LEN);
                discarding = true;
            }
        }
    }
}
