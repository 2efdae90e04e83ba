//! Streaming Gauge Task

use ecu_link::{records, EcuError, FrameReader};
use sensor_registry::{SensorReading, SensorRegistry};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Counters kept by the streaming task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub runts: u64,
    pub readings: u64,
    pub skipped_records: u64,
}

/// Reads gauge frames and publishes one reading per record as soon as it is parsed
pub struct StreamDecoder {
    registry: Arc<SensorRegistry>,
    stats: StreamStats,
}

impl StreamDecoder {
    pub fn new(registry: Arc<SensorRegistry>) -> Self {
        Self {
            registry,
            stats: StreamStats::default(),
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Run until shutdown, end of stream, or until nobody reads the output.
    ///
    /// Runt frames and undecodable records are dropped; only a failing link is
    /// returned as an error.
    pub async fn run<R: AsyncRead + Unpin>(
        &mut self,
        reader: R,
        out_tx: mpsc::Sender<SensorReading>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), EcuError> {
        info!("Streaming gauge task started");
        let mut frames = FrameReader::new(reader);

        while !*shutdown.borrow() {
            let frame = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                frame = frames.next_frame() => frame?,
            };
            let Some(frame) = frame else {
                info!("Gauge stream ended");
                break;
            };

            if !self.publish_frame(frame, &out_tx).await {
                debug!("Output stream closed");
                break;
            }
        }

        info!(
            "Streaming gauge task stopped: {} frame(s), {} runt(s), {} reading(s)",
            self.stats.frames, self.stats.runts, self.stats.readings
        );
        Ok(())
    }

    /// Decode one frame. Returns `false` once the output channel is closed.
    async fn publish_frame(&mut self, frame: &[u8], out_tx: &mpsc::Sender<SensorReading>) -> bool {
        self.stats.frames += 1;

        let frame_records = match records(frame) {
            Ok(frame_records) => frame_records,
            Err(e) => {
                self.stats.runts += 1;
                warn!("{}: {:02X?}", e, frame);
                return true;
            }
        };

        for record in frame_records {
            let reading = match record.decode(&self.registry) {
                Ok(reading) => reading,
                Err(e) => {
                    self.stats.skipped_records += 1;
                    warn!("Skipping record {:?}: {}", record, e);
                    continue;
                }
            };

            debug!("Event fired: {}", reading.key());
            self.stats.readings += 1;
            if out_tx.send(reading).await.is_err() {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecu_link::wire::FRAME_SENTINEL;

    async fn decode_all(stream: &[u8]) -> (Vec<SensorReading>, StreamStats) {
        let mut decoder = StreamDecoder::new(Arc::new(SensorRegistry::streaming()));
        let (out_tx, mut out_rx) = mpsc::channel(32);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        decoder.run(stream, out_tx, shutdown_rx).await.unwrap();

        let mut readings = Vec::new();
        while let Some(reading) = out_rx.recv().await {
            readings.push(reading);
        }
        (readings, decoder.stats())
    }

    #[tokio::test]
    async fn test_runt_frames_emit_nothing() {
        let stream = [0x80, 0x01, FRAME_SENTINEL, 0x80, 0, 0, 0, 0, FRAME_SENTINEL];
        let (readings, stats) = decode_all(&stream).await;
        assert!(readings.is_empty());
        assert_eq!(stats.runts, 2);
    }

    #[tokio::test]
    async fn test_twelve_byte_frame_emits_one_reading() {
        // Boost, instance 3, raw (5 << 6) | 9 = 329
        let stream = [0x80, 0x00, 0x04, 0x03, 0x05, 0x09, 0, 0, 0, 0, 0x00, FRAME_SENTINEL];
        let (readings, stats) = decode_all(&stream).await;

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].key(), "/streaming-sensor/Boost");
        assert_eq!(readings[0].instance, 3);
        assert!((readings[0].value - 329.0 / 329.48 * 0.0689476).abs() < 1e-12);
        assert_eq!(stats.frames, 1);
    }

    #[tokio::test]
    async fn test_bad_record_does_not_stop_the_stream() {
        let stream = [
            0x80, // unknown sensor type 63
            0x00, 0x3F, 0x00, 0x00, 0x01, // timing, raw 100
            0x00, 0x0B, 0x00, 0x01, 0x24, 0x00, FRAME_SENTINEL,
            // next frame still decoded: fuel level 42
            0x80, 0x00, 0x11, 0x00, 0x00, 0x2A, 0x00, FRAME_SENTINEL,
        ];
        let (readings, stats) = decode_all(&stream).await;

        assert_eq!(stats.skipped_records, 1);
        let labels: Vec<_> = readings.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Timing", "Fuel Level"]);
        assert_eq!(readings[0].value, 36.0);
        assert_eq!(readings[1].value, 42.0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_blocked_read() {
        let (_device, host) = tokio::io::duplex(64);
        let mut decoder = StreamDecoder::new(Arc::new(SensorRegistry::streaming()));
        let (out_tx, _out_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move { decoder.run(host, out_tx, shutdown_rx).await });
        tokio::task::yield_now().await;
        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
