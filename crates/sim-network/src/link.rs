//! Per-edge network latency.

use shared_types::{PeerId, SimRng, VirtualTime};
use std::collections::HashMap;

/// The directed latency model for one overlay edge.
///
/// Each message drawn an independent exponential delay, but the edge
/// enforces in-order delivery: a message can never be scheduled to arrive
/// before one sent earlier on the same edge. Different edges are not
/// coordinated at all, so a block can easily reach a peer out of order
/// relative to a competing block sent to it over a different edge — that
/// race is exactly what orphan recovery exists to resolve.
/// A slow-tagged endpoint multiplies a message's mean delay by this much,
/// modeling the propagation + transmission cost the original attributed to
/// a peer's network tag.
const SLOW_LINK_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Default)]
pub struct LinkTable {
    mean_delay: f64,
    last_arrival: HashMap<(PeerId, PeerId), VirtualTime>,
}

impl LinkTable {
    pub fn new(mean_delay: f64) -> Self {
        Self {
            mean_delay,
            last_arrival: HashMap::new(),
        }
    }

    /// Draws the delivery time for a message sent at `now` from `from` to
    /// `to`, updating the edge's FIFO floor. `slow` should be set when
    /// either endpoint was tagged as running on a slow network link.
    pub fn deliver_at(
        &mut self,
        from: &PeerId,
        to: &PeerId,
        now: VirtualTime,
        slow: bool,
        rng: &mut SimRng,
    ) -> VirtualTime {
        let mean = if slow {
            self.mean_delay * SLOW_LINK_MULTIPLIER
        } else {
            self.mean_delay
        };
        let draw = VirtualTime::from_millis(shared_types::exponential(rng, mean));
        let earliest = now + draw;
        let key = (from.clone(), to.clone());
        let floor = self.last_arrival.get(&key).copied().unwrap_or(VirtualTime::ZERO);
        let arrival = if earliest < floor { floor } else { earliest };
        self.last_arrival.insert(key, arrival);
        arrival
    }
}
