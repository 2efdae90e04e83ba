//! ECU Polling Scheduler
//!
//! Drives request/response polling of the ECU. Each priority tier has its own
//! cadence and serves its sensors in a fair rotation.

mod queue;
mod scheduler;

pub use queue::TierQueue;
pub use scheduler::{PollScheduler, SchedulerConfig, SchedulerError, SchedulerStats};
