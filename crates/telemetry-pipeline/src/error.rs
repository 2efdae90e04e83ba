//! Pipeline Error Types

use ecu_link::EcuError;
use thiserror::Error;

/// Errors that stop a pipeline task
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Device link failure inside a producer
    #[error("ECU link failure: {0}")]
    Ecu(#[from] EcuError),

    /// Listener socket failure
    #[error("Ingest listener error: {0}")]
    Ingest(#[from] std::io::Error),

    /// A task panicked or was aborted
    #[error("Task {name} did not finish cleanly: {reason}")]
    Task { name: &'static str, reason: String },
}

/// Why a single ingest line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Expected <sensorKey>|<value>, got {0:?}")]
    Format(String),

    #[error("Sensor key {0:?} is not hexadecimal")]
    Key(String),

    #[error("Value {0:?} is not a number")]
    Value(String),
}
