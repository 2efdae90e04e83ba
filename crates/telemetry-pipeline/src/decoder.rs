//! Polled Response Decoder
//!
//! Drains the intermediate raw-response channel, applies each sensor's
//! conversion and publishes the readings.

use ecu_link::RawResponse;
use sensor_registry::{SensorReading, SensorRegistry};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Conversion stage between the scheduler and the output stream
pub struct ResponseDecoder {
    /// Channel receiver for raw scheduler responses
    receiver: mpsc::Receiver<RawResponse>,
    registry: Arc<SensorRegistry>,
    decoded: u64,
    rejected: u64,
}

impl ResponseDecoder {
    pub fn new(receiver: mpsc::Receiver<RawResponse>, registry: Arc<SensorRegistry>) -> Self {
        Self {
            receiver,
            registry,
            decoded: 0,
            rejected: 0,
        }
    }

    /// Create the raw-response channel together with its decoder
    pub fn channel(capacity: usize, registry: Arc<SensorRegistry>) -> (mpsc::Sender<RawResponse>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, registry))
    }

    /// Readings published so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Responses that could not be converted
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Run until shutdown, until the scheduler goes away, or until nobody reads
    /// the output stream.
    pub async fn run(
        &mut self,
        out_tx: mpsc::Sender<SensorReading>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting response decoder");

        while !*shutdown.borrow() {
            let response = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                response = self.receiver.recv() => response,
            };
            let Some(response) = response else {
                debug!("Raw response channel closed");
                break;
            };

            let reading = match response.decode(&self.registry) {
                Ok(reading) => reading,
                Err(e) => {
                    self.rejected += 1;
                    warn!("Dropping response {:?}: {}", response, e);
                    continue;
                }
            };

            debug!(
                "Decoded {} -> {} {}",
                reading.key(),
                reading.value,
                reading.unit
            );
            self.decoded += 1;
            if out_tx.send(reading).await.is_err() {
                debug!("Output stream closed");
                break;
            }
        }

        info!(
            "Response decoder stopped: {} decoded, {} rejected",
            self.decoded, self.rejected
        );
    }
}
