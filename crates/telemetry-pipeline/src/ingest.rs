//! Alternate Ingestion Listener
//!
//! Accepts already-decoded readings as `<sensorKey>|<value>` lines on a local
//! socket, for setups where another process owns the hardware. `sensorKey` is
//! the polled sensor id in hex.

use crate::error::{IngestError, PipelineError};
use sensor_registry::{SensorReading, SensorRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Parse one `<hexKey>|<value>` line
pub fn parse_line(line: &str) -> Result<(u16, f64), IngestError> {
    let (key, value) = line
        .trim()
        .split_once('|')
        .ok_or_else(|| IngestError::Format(line.to_string()))?;

    let key = key.trim();
    let digits = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);
    let sensor_id =
        u16::from_str_radix(digits, 16).map_err(|_| IngestError::Key(key.to_string()))?;

    let value = value.trim();
    let value: f64 = value
        .parse()
        .map_err(|_| IngestError::Value(value.to_string()))?;

    Ok((sensor_id, value))
}

/// Local listener feeding pre-decoded readings into the output stream
pub struct IngestListener {
    listener: TcpListener,
    registry: Arc<SensorRegistry>,
}

impl IngestListener {
    /// Bind the listener. Values are labelled through `registry` without conversion.
    pub async fn bind(addr: &str, registry: Arc<SensorRegistry>) -> Result<Self, PipelineError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Ingest listener on {}", listener.local_addr()?);
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PipelineError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until shutdown
    pub async fn run(
        self,
        out_tx: mpsc::Sender<SensorReading>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        while !*shutdown.borrow() {
            let (stream, peer) = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                accepted = self.listener.accept() => accepted?,
            };
            debug!("Ingest connection from {}", peer);

            tokio::spawn(handle_connection(
                stream,
                self.registry.clone(),
                out_tx.clone(),
                shutdown.clone(),
            ));
        }

        info!("Ingest listener stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<SensorRegistry>,
    out_tx: mpsc::Sender<SensorReading>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Ingest connection failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reading = parse_line(&line)
            .map_err(|e| e.to_string())
            .and_then(|(id, value)| registry.label(id, value).map_err(|e| e.to_string()));
        match reading {
            Ok(reading) => {
                if out_tx.send(reading).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Ignoring ingest line {:?}: {}", line, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("21|8000.5"), Ok((0x21, 8000.5)));
        assert_eq!(parse_line("0x2f|88\n"), Ok((0x2f, 88.0)));
        assert_eq!(parse_line(" 7 | -3.5 "), Ok((0x07, -3.5)));
    }

    #[test]
    fn test_parse_line_errors() {
        assert!(matches!(parse_line("2188"), Err(IngestError::Format(_))));
        assert!(matches!(parse_line("zz|1"), Err(IngestError::Key(_))));
        assert!(matches!(parse_line("21|fast"), Err(IngestError::Value(_))));
    }

    proptest! {
        #[test]
        fn parse_accepts_any_id(id in any::<u16>(), value in -1.0e6f64..1.0e6) {
            let line = format!("{:x}|{}", id, value);
            prop_assert_eq!(parse_line(&line), Ok((id, value)));
        }
    }

    #[tokio::test]
    async fn test_listener_publishes_labelled_readings() {
        let registry = Arc::new(SensorRegistry::polled());
        let listener = IngestListener::bind("127.0.0.1:0", registry).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(listener.run(out_tx, shutdown_rx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"garbage\n21|3000\nffff|1\n7|85\n")
            .await
            .unwrap();

        let rpm = out_rx.recv().await.unwrap();
        assert_eq!(rpm.key(), "/polled-sensor/Engine RPM");
        assert_eq!(rpm.value, 3000.0);
        let coolant = out_rx.recv().await.unwrap();
        assert_eq!(coolant.label, "Coolant Temp");
        assert_eq!(coolant.value, 85.0);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }
}
