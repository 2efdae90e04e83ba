//! Per-Tier Rotation Queue

use ecu_link::SensorRequest;
use sensor_registry::Tier;
use std::collections::VecDeque;

/// Ready and cooldown queues of one tier.
///
/// A request is in exactly one of the two queues; served requests wait in
/// cooldown until every other sensor of the tier has had its turn.
#[derive(Debug, Clone)]
pub struct TierQueue {
    tier: Tier,
    ready: VecDeque<SensorRequest>,
    cooldown: VecDeque<SensorRequest>,
}

impl TierQueue {
    /// Seed the ready queue in the given order
    pub fn new(tier: Tier, sensor_ids: impl IntoIterator<Item = u16>) -> Self {
        Self {
            tier,
            ready: sensor_ids.into_iter().map(SensorRequest::new).collect(),
            cooldown: VecDeque::new(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Take the request to serve on this tick.
    ///
    /// When the rotation is exhausted the cooldown queue is moved back to ready,
    /// keeping its order, and `None` is returned: the refill tick sends nothing.
    pub fn next_request(&mut self) -> Option<SensorRequest> {
        if self.ready.is_empty() {
            self.ready.append(&mut self.cooldown);
            return None;
        }
        self.ready.pop_front()
    }

    /// Park a served request until the next rotation
    pub fn cool_down(&mut self, request: SensorRequest) {
        self.cooldown.push_back(request);
    }

    /// Total sensors in the tier
    pub fn len(&self) -> usize {
        self.ready.len() + self.cooldown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn cooldown_len(&self) -> usize {
        self.cooldown.len()
    }
}
