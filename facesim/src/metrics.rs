//! Metrics collection for simulation analysis.

use facecast::BroadcastMetrics;

use crate::event::Tick;
use crate::topology::DeviceId;

/// One aggregated result surfaced at an originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultRecord {
    /// Tick the result appeared on.
    pub tick: Tick,
    /// Originating device.
    pub device: DeviceId,
    /// Broadcast id.
    pub id: u8,
    /// Sequence assigned by the originator.
    pub sequence: u8,
    /// Count carried in the reply (see `CountingHooks`).
    pub count: u16,
}

/// Simulation metrics collected over time.
#[derive(Debug, Clone, Default)]
pub struct SimMetrics {
    /// Frames taken out of outbound slots.
    pub frames_sent: u64,
    /// Frames placed in a peer's inbound slot.
    pub frames_delivered: u64,
    /// Frames lost to the loss rate or an absent link.
    pub frames_dropped: u64,
    /// Tick-slots a frame waited because the peer's inbound slot was full.
    pub frames_held: u64,
    /// `Send` events refused by a busy engine and retried.
    pub sends_refused: u64,
    /// Results surfaced at originators.
    pub results: Vec<ResultRecord>,
}

impl SimMetrics {
    /// Create new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result.
    pub fn add_result(&mut self, record: ResultRecord) {
        self.results.push(record);
    }

    /// Most recent result, if any.
    pub fn latest_result(&self) -> Option<&ResultRecord> {
        self.results.last()
    }

    /// Results produced by one device.
    pub fn results_for(&self, device: DeviceId) -> impl Iterator<Item = &ResultRecord> {
        self.results.iter().filter(move |r| r.device == device)
    }
}

/// Result of running a simulation.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Final tick.
    pub end_tick: Tick,
    /// Collected metrics.
    pub metrics: SimMetrics,
    /// Engine counters per device, indexed by `DeviceId`.
    pub device_metrics: Vec<BroadcastMetrics>,
    /// No scheduled events left.
    pub queue_exhausted: bool,
    /// No frames in flight and no device waiting on replies.
    pub quiescent: bool,
}

impl SimulationResult {
    /// Count carried by the most recent result.
    pub fn final_count(&self) -> Option<u16> {
        self.metrics.latest_result().map(|r| r.count)
    }

    /// Sum of one engine counter over every device.
    pub fn total(&self, counter: impl Fn(&BroadcastMetrics) -> u32) -> u64 {
        self.device_metrics.iter().map(|m| u64::from(counter(m))).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tick: Tick, device: DeviceId, count: u16) -> ResultRecord {
        ResultRecord {
            tick,
            device,
            id: 1,
            sequence: 1,
            count,
        }
    }

    #[test]
    fn test_results_by_device() {
        let mut metrics = SimMetrics::new();
        metrics.add_result(record(3, 0, 4));
        metrics.add_result(record(9, 2, 4));
        metrics.add_result(record(12, 0, 3));

        assert_eq!(metrics.results_for(0).count(), 2);
        assert_eq!(metrics.latest_result().unwrap().tick, 12);
    }

    #[test]
    fn test_result_totals() {
        let mut a = BroadcastMetrics::new();
        a.forwarded = 2;
        let mut b = BroadcastMetrics::new();
        b.forwarded = 3;

        let mut metrics = SimMetrics::new();
        metrics.add_result(record(5, 0, 7));

        let result = SimulationResult {
            end_tick: 10,
            metrics,
            device_metrics: vec![a, b],
            queue_exhausted: true,
            quiescent: true,
        };
        assert_eq!(result.total(|m| m.forwarded), 5);
        assert_eq!(result.final_count(), Some(7));
    }
}
