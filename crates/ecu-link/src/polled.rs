//! Polled Request/Response Codec

use crate::error::EcuError;
use crate::link::EcuLink;
use sensor_registry::{RegistryError, SensorReading, SensorRegistry};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Largest response accepted from a single read
pub const RESPONSE_CAPACITY: usize = 4;

/// A sensor id waiting to be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorRequest {
    pub sensor_id: u16,
}

impl SensorRequest {
    pub fn new(sensor_id: u16) -> Self {
        Self { sensor_id }
    }

    /// Wire form: the id as two big-endian bytes
    pub fn encode(&self) -> [u8; 2] {
        self.sensor_id.to_be_bytes()
    }

    /// Inverse of [`SensorRequest::encode`]
    pub fn decode(bytes: [u8; 2]) -> Self {
        Self::new(u16::from_be_bytes(bytes))
    }
}

/// Unconverted answer to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawResponse {
    pub sensor_id: u16,
    pub raw_value: u32,
}

impl RawResponse {
    /// Build a response from the bytes the device returned.
    ///
    /// The magnitude is the content of the bytes read as an unsigned big-endian
    /// integer, never the number of bytes.
    pub fn from_bytes(sensor_id: u16, bytes: &[u8]) -> Result<Self, EcuError> {
        if bytes.is_empty() {
            return Err(EcuError::EmptyResponse { sensor_id });
        }
        let raw_value = bytes
            .iter()
            .take(RESPONSE_CAPACITY)
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        Ok(Self {
            sensor_id,
            raw_value,
        })
    }

    /// Apply the sensor's conversion. Polled readings are always instance 0.
    pub fn decode(&self, registry: &SensorRegistry) -> Result<SensorReading, RegistryError> {
        registry.decode(self.sensor_id, self.raw_value as f64, 0)
    }
}

/// Sends sensor requests and collects raw responses over an [`EcuLink`]
#[derive(Debug, Clone, Copy)]
pub struct PolledCodec {
    response_timeout: Duration,
}

impl PolledCodec {
    pub fn new(response_timeout: Duration) -> Self {
        Self { response_timeout }
    }

    /// One request/response round trip.
    ///
    /// A reply that never arrives is an [`EcuError::EmptyResponse`]; an EOF means
    /// the link itself is gone. Input still pending from an earlier request is
    /// discarded first.
    pub async fn request<L: EcuLink>(
        &self,
        link: &mut L,
        sensor_id: u16,
    ) -> Result<RawResponse, EcuError> {
        link.purge()?;
        let request = SensorRequest::new(sensor_id);
        link.write_all(&request.encode()).await?;
        link.flush().await?;

        let mut buf = [0u8; RESPONSE_CAPACITY];
        let received = match timeout(self.response_timeout, link.read(&mut buf)).await {
            Ok(Ok(0)) => return Err(EcuError::LinkClosed),
            Ok(result) => result?,
            Err(_) => 0,
        };

        let response = RawResponse::from_bytes(sensor_id, &buf[..received])?;
        debug!(
            "Sensor {:#06x} answered {:02X?} -> raw {}",
            sensor_id,
            &buf[..received],
            response.raw_value
        );
        Ok(response)
    }
}

impl Default for PolledCodec {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::handshake::DEFAULT_RESPONSE_TIMEOUT_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{LinkEvent, MockLink, MockReply};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn request_id_round_trip(id in 0u16..=0xFFFF) {
            let request = SensorRequest::new(id);
            prop_assert_eq!(SensorRequest::decode(request.encode()), request);
        }
    }

    #[test]
    fn test_encode_is_big_endian() {
        assert_eq!(SensorRequest::new(0x0021).encode(), [0x00, 0x21]);
        assert_eq!(SensorRequest::new(0x1234).encode(), [0x12, 0x34]);
    }

    #[test]
    fn test_magnitude_uses_byte_content_not_count() {
        // A single byte 0x3C must decode to 60, not to the byte count 1
        let response = RawResponse::from_bytes(0x07, &[0x3C]).unwrap();
        assert_eq!(response.raw_value, 60);

        let reading = response.decode(&SensorRegistry::polled()).unwrap();
        assert_eq!(reading.value, 20.0);
    }

    #[test]
    fn test_two_byte_magnitude() {
        let response = RawResponse::from_bytes(0x21, &[0x01, 0x00]).unwrap();
        assert_eq!(response.raw_value, 256);
        let reading = response.decode(&SensorRegistry::polled()).unwrap();
        assert_eq!(reading.label, "Engine RPM");
        assert_eq!(reading.value, 8000.0);
        assert_eq!(reading.instance, 0);
    }

    #[test]
    fn test_empty_bytes_rejected() {
        assert!(matches!(
            RawResponse::from_bytes(0x21, &[]),
            Err(EcuError::EmptyResponse { sensor_id: 0x21 })
        ));
    }

    #[tokio::test]
    async fn test_request_round_trip() {
        let mut link = MockLink::ecu(|id| match id {
            0x21 => MockReply::Bytes(vec![0x01, 0x00]),
            _ => MockReply::Silence,
        });
        let log = link.event_log();

        let response = PolledCodec::default().request(&mut link, 0x21).await.unwrap();
        assert_eq!(
            response,
            RawResponse {
                sensor_id: 0x21,
                raw_value: 256
            }
        );
        assert_eq!(log.writes(), vec![vec![0x00, 0x21]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_sensor_is_recoverable() {
        let mut link = MockLink::ecu(|_| MockReply::Silence);
        let err = PolledCodec::default()
            .request(&mut link, 0x26)
            .await
            .unwrap_err();
        assert!(matches!(err, EcuError::EmptyResponse { sensor_id: 0x26 }));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leftover_bytes_never_answer_the_next_request() {
        // 0x21 answers with one byte more than a response can hold
        let mut link = MockLink::ecu(|id| match id {
            0x21 => MockReply::Bytes(vec![0x01, 0x00, 0x00, 0x00, 0x3C]),
            _ => MockReply::Silence,
        });
        let codec = PolledCodec::default();

        let rpm = codec.request(&mut link, 0x21).await.unwrap();
        assert_eq!(rpm.raw_value, 0x0100_0000);

        let err = codec.request(&mut link, 0x07).await.unwrap_err();
        assert!(matches!(err, EcuError::EmptyResponse { sensor_id: 0x07 }));
    }

    #[tokio::test]
    async fn test_purges_before_each_request() {
        let mut link = MockLink::ecu(|_| MockReply::Bytes(vec![0x10]));
        let log = link.event_log();
        PolledCodec::default().request(&mut link, 0x26).await.unwrap();

        assert_eq!(
            log.events(),
            vec![LinkEvent::Purge, LinkEvent::Write(vec![0x00, 0x26])]
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_fatal() {
        let mut link = MockLink::ecu(|_| MockReply::Disconnect);
        let err = PolledCodec::default()
            .request(&mut link, 0x26)
            .await
            .unwrap_err();
        assert!(matches!(err, EcuError::LinkClosed));
        assert!(err.is_fatal());
    }
}
