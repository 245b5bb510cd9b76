//! Event types and priority queue for the tick-driven simulation.

use std::cmp::Ordering;

use facecast::Face;

use crate::device::SimMessage;
use crate::topology::DeviceId;

/// Simulation time, in ticks. One tick is one `process()` on every device.
pub type Tick = u64;

/// Unique sequence number for deterministic event ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Scenario actions that can be scheduled during simulation.
#[derive(Debug, Clone)]
pub enum ScenarioAction {
    /// Pull two faces apart.
    DisableLink { device: DeviceId, face: Face },
    /// Put two faces back together.
    EnableLink { device: DeviceId, face: Face },
    /// Set loss rate on the link touching a face.
    SetLossRate {
        device: DeviceId,
        face: Face,
        rate: f64,
    },
    /// Set loss rate on every link.
    SetGlobalLossRate { rate: f64 },
}

/// Events in the simulation.
#[derive(Debug, Clone)]
pub enum Event {
    /// Application on `device` originates a broadcast.
    ///
    /// Retried every tick until the engine accepts it.
    Send {
        device: DeviceId,
        message: SimMessage,
    },
    /// Execute a scenario action.
    ScenarioAction(ScenarioAction),
}

/// A scheduled event with tick and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// Tick at which the event fires.
    pub tick: Tick,
    /// Sequence number for deterministic ordering of same-tick events.
    pub seq: SequenceNumber,
    /// The event to process.
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(tick: Tick, seq: SequenceNumber, event: Event) -> Self {
        Self { tick, seq, event }
    }
}

// Implement ordering for min-heap (BinaryHeap is max-heap, so we reverse).
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier tick first, then lower sequence number.
        match other.tick.cmp(&self.tick) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn action() -> Event {
        Event::ScenarioAction(ScenarioAction::SetGlobalLossRate { rate: 0.0 })
    }

    #[test]
    fn test_event_ordering() {
        let e1 = ScheduledEvent::new(10, SequenceNumber::new(1), action());
        let e2 = ScheduledEvent::new(5, SequenceNumber::new(2), action());

        // e2 has earlier tick, so it should be "greater" in min-heap terms
        assert!(e2 > e1);
    }

    #[test]
    fn test_same_tick_sequence_ordering() {
        let e1 = ScheduledEvent::new(10, SequenceNumber::new(1), action());
        let e2 = ScheduledEvent::new(10, SequenceNumber::new(2), action());

        // Same tick, e1 has lower sequence, so e1 should be processed first
        assert!(e1 > e2);
    }

    #[test]
    fn test_heap_pops_in_schedule_order() {
        let mut heap = BinaryHeap::new();
        heap.push(ScheduledEvent::new(3, SequenceNumber::new(0), action()));
        heap.push(ScheduledEvent::new(1, SequenceNumber::new(2), action()));
        heap.push(ScheduledEvent::new(1, SequenceNumber::new(1), action()));

        let order: Vec<(Tick, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|e| (e.tick, e.seq.value()))
            .collect();
        assert_eq!(order, vec![(1, 1), (1, 2), (3, 0)]);
    }
}
