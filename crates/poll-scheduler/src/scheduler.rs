//! Tiered Poll Scheduler Implementation

use crate::queue::TierQueue;
use ecu_link::{EcuError, EcuLink, PolledCodec, RawResponse, DEFAULT_RESPONSE_TIMEOUT_MS};
use sensor_registry::{SensorRegistry, Tier};
use serde::{Deserialize, Serialize};
use std::future::poll_fn;
use std::task::Poll;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for the poll scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// High tier cadence in milliseconds (default: 20)
    pub high_ms: u64,
    /// Medium tier cadence in milliseconds (default: 40)
    pub medium_ms: u64,
    /// Low tier cadence in milliseconds (default: 100)
    pub low_ms: u64,
    /// How long to wait for the ECU to answer one request
    pub response_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            high_ms: 20,
            medium_ms: 40,
            low_ms: 100,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
        }
    }
}

impl SchedulerConfig {
    /// Cadence of a polled tier; `None` for [`Tier::None`]
    pub fn cadence(&self, tier: Tier) -> Option<Duration> {
        let ms = match tier {
            Tier::High => self.high_ms,
            Tier::Medium => self.medium_ms,
            Tier::Low => self.low_ms,
            Tier::None => return None,
        };
        Some(Duration::from_millis(ms))
    }

    /// Reject settings the timers cannot run with
    pub fn validate(&self) -> Result<(), SchedulerError> {
        for tier in Tier::SCHEDULED {
            if self.cadence(tier).map_or(true, |cadence| cadence.is_zero()) {
                return Err(SchedulerError::ZeroCadence(tier));
            }
        }
        if self.response_timeout_ms == 0 {
            return Err(SchedulerError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Errors building a scheduler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("{0:?} tier cadence must be greater than zero")]
    ZeroCadence(Tier),

    #[error("Response timeout must be greater than zero")]
    ZeroTimeout,
}

/// Counters kept while the scheduler runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Requests answered and forwarded
    pub served: u64,
    /// Requests that failed without killing the link
    pub failed: u64,
    /// Ticks spent refilling a tier's rotation
    pub refills: u64,
}

/// Round-robin poller for the High, Medium and Low tiers
pub struct PollScheduler {
    /// Queues indexed like `Tier::SCHEDULED`
    queues: [TierQueue; 3],
    config: SchedulerConfig,
    codec: PolledCodec,
    stats: SchedulerStats,
}

impl PollScheduler {
    /// Seed every tier from the registry in ascending sensor id order
    pub fn new(config: SchedulerConfig, registry: &SensorRegistry) -> Result<Self, SchedulerError> {
        config.validate()?;

        let queues = Tier::SCHEDULED.map(|tier| TierQueue::new(tier, registry.tier_members(tier)));
        for queue in &queues {
            info!(
                "{:?} tier: {} sensor(s) every {:?}",
                queue.tier(),
                queue.len(),
                config.cadence(queue.tier()).unwrap_or_default()
            );
        }

        Ok(Self {
            queues,
            codec: PolledCodec::new(Duration::from_millis(config.response_timeout_ms)),
            config,
            stats: SchedulerStats::default(),
        })
    }

    fn queue_mut(&mut self, tier: Tier) -> Option<&mut TierQueue> {
        self.queues.iter_mut().find(|queue| queue.tier() == tier)
    }

    /// Queue of a polled tier
    pub fn queue(&self, tier: Tier) -> Option<&TierQueue> {
        self.queues.iter().find(|queue| queue.tier() == tier)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn timer(&self, tier: Tier) -> Interval {
        let mut timer = interval(self.config.cadence(tier).unwrap_or_default());
        // A slow ECU answer pushes the tier back rather than causing a burst
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    /// Run the tier timers until shutdown, the response channel closes, or
    /// the link fails.
    ///
    /// Only link loss is returned as an error; failed requests are logged and
    /// the sensor waits for its next rotation like any other.
    pub async fn run<L: EcuLink>(
        &mut self,
        link: &mut L,
        raw_tx: mpsc::Sender<RawResponse>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), EcuError> {
        info!("Starting poll scheduler");

        let mut timers = Tier::SCHEDULED.map(|tier| self.timer(tier));
        let mut first = 0;

        while !*shutdown.borrow() {
            let due = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                due = next_due(&mut timers, first) => due,
            };
            // Every due tier gets a turn before any tier is served twice
            first = (due + 1) % timers.len();
            let tier = Tier::SCHEDULED[due];

            let keep_going = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.tick(tier, link, &raw_tx) => result?,
            };
            if !keep_going {
                debug!("Raw response channel closed");
                break;
            }
        }

        info!(
            "Poll scheduler stopped: {} served, {} failed",
            self.stats.served, self.stats.failed
        );
        Ok(())
    }

    /// Serve one tick of `tier`. Returns `false` once nobody listens for responses.
    async fn tick<L: EcuLink>(
        &mut self,
        tier: Tier,
        link: &mut L,
        raw_tx: &mpsc::Sender<RawResponse>,
    ) -> Result<bool, EcuError> {
        let Some(queue) = self.queue_mut(tier) else {
            return Ok(true);
        };
        let Some(request) = queue.next_request() else {
            self.stats.refills += 1;
            debug!("{:?} rotation complete, queue refilled", tier);
            return Ok(true);
        };

        let codec = self.codec;
        let result = codec.request(link, request.sensor_id).await;
        if let Some(queue) = self.queue_mut(tier) {
            queue.cool_down(request);
        }

        match result {
            Ok(response) => {
                self.stats.served += 1;
                Ok(raw_tx.send(response).await.is_ok())
            }
            Err(e) if e.is_fatal() => {
                error!("Lost ECU link while polling {:#06x}: {}", request.sensor_id, e);
                Err(e)
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!("{:?} request for {:#06x} failed: {}", tier, request.sensor_id, e);
                Ok(true)
            }
        }
    }
}

/// Index of the first due timer, checked round-robin from `first`
async fn next_due(timers: &mut [Interval; 3], first: usize) -> usize {
    poll_fn(|cx| {
        for offset in 0..timers.len() {
            let index = (first + offset) % timers.len();
            if timers[index].poll_tick(cx).is_ready() {
                return Poll::Ready(index);
            }
        }
        Poll::Pending
    })
    .await
}
