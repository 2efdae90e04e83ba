//! Pipeline Wiring
//!
//! Every producer gets a clone of the output sender; the output stream ends
//! once all producers have stopped. All tasks share one shutdown signal, and
//! a task failing with a fatal error raises it for the others.

use crate::decoder::ResponseDecoder;
use crate::error::PipelineError;
use crate::ingest::IngestListener;
use crate::stream::StreamDecoder;
use ecu_link::EcuLink;
use poll_scheduler::PollScheduler;
use sensor_registry::{SensorReading, SensorRegistry};
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Default capacity of every pipeline channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Assembles producer tasks around one output stream.
///
/// Producer methods spawn immediately and must be called inside a Tokio runtime.
pub struct PipelineBuilder {
    capacity: usize,
    out_tx: mpsc::Sender<SensorReading>,
    out_rx: mpsc::Receiver<SensorReading>,
    shutdown: Arc<watch::Sender<bool>>,
    tasks: Vec<(&'static str, JoinHandle<Result<(), PipelineError>>)>,
}

impl PipelineBuilder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (shutdown, _) = watch::channel(false);
        Self {
            capacity,
            out_tx,
            out_rx,
            shutdown: Arc::new(shutdown),
            tasks: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let result = task.await;
            if let Err(e) = &result {
                error!("{} task failed: {}", name, e);
                shutdown.send_replace(true);
            }
            result
        });
        self.tasks.push((name, handle));
    }

    /// Poll the ECU over `link` and decode its responses through `registry`.
    ///
    /// The link must already be initialized; the scheduler task owns it from here on.
    pub fn polled<L>(mut self, mut scheduler: PollScheduler, mut link: L, registry: Arc<SensorRegistry>) -> Self
    where
        L: EcuLink + 'static,
    {
        let (raw_tx, mut decoder) = ResponseDecoder::channel(self.capacity, registry);

        let shutdown = self.shutdown.subscribe();
        self.spawn("scheduler", async move {
            scheduler.run(&mut link, raw_tx, shutdown).await?;
            Ok(())
        });

        let out_tx = self.out_tx.clone();
        let shutdown = self.shutdown.subscribe();
        self.spawn("decoder", async move {
            decoder.run(out_tx, shutdown).await;
            Ok(())
        });
        self
    }

    /// Decode the streaming gauge protocol from `reader`
    pub fn streaming<R>(mut self, reader: R, registry: Arc<SensorRegistry>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let out_tx = self.out_tx.clone();
        let shutdown = self.shutdown.subscribe();
        self.spawn("stream", async move {
            StreamDecoder::new(registry).run(reader, out_tx, shutdown).await?;
            Ok(())
        });
        self
    }

    /// Accept pre-decoded readings on a bound listener
    pub fn ingest(mut self, listener: IngestListener) -> Self {
        let out_tx = self.out_tx.clone();
        let shutdown = self.shutdown.subscribe();
        self.spawn("ingest", listener.run(out_tx, shutdown));
        self
    }

    /// Hand out the output stream and the task handle
    pub fn build(self) -> (mpsc::Receiver<SensorReading>, PipelineHandle) {
        info!("Telemetry pipeline running {} task(s)", self.tasks.len());
        (
            self.out_rx,
            PipelineHandle {
                shutdown: self.shutdown,
                tasks: self.tasks,
            },
        )
    }
}

/// Shutdown and join handle for the running pipeline
pub struct PipelineHandle {
    shutdown: Arc<watch::Sender<bool>>,
    tasks: Vec<(&'static str, JoinHandle<Result<(), PipelineError>>)>,
}

impl PipelineHandle {
    /// Ask every task to stop
    pub fn shutdown(&self) {
        info!("Shutting down telemetry pipeline");
        self.shutdown.send_replace(true);
    }

    /// Whether shutdown was requested, by the caller or by a failed task
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn stopped(&self) {
        let mut rx = self.shutdown.subscribe();
        // Sender lives in self, so wait_for only ends when the flag is set
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Wait for every task; returns the first failure
    pub async fn join(self) -> Result<(), PipelineError> {
        let mut first_error = None;
        for (name, handle) in self.tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Task {
                    name,
                    reason: e.to_string(),
                }),
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
