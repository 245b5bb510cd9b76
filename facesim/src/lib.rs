//! facesim - Tick-driven mesh simulator for facecast protocol testing.
//!
//! This crate provides a deterministic simulator that wires many facecast
//! engines together face to face and steps them in lockstep.
//!
//! # Features
//!
//! - **Tick-driven simulation**: every device runs `process()` once per tick
//! - **Single-slot links**: a frame waits in the outbound slot until the
//!   peer's inbound slot is free, exactly like the hardware
//! - **Configurable topology**: chain, ring, star, grid, or custom face wiring
//! - **Link properties**: loss rate and active flag per face pair
//! - **Scenario builder**: scheduled sends, resets, link changes
//! - **Metrics collection**: frame counts, results, per-device engine counters
//!
//! # Example
//!
//! ```
//! use facesim::ScenarioBuilder;
//!
//! // Count the devices in a 3x3 grid from a corner
//! let result = ScenarioBuilder::new(9)
//!     .grid_topology(3)
//!     .count_at(0, 0)
//!     .run_until_quiet(100);
//!
//! assert_eq!(result.final_count(), Some(9));
//! ```
//!
//! # Architecture
//!
//! Each tick the simulator moves frames across links, refreshes face expiry
//! from the topology, runs every device's engine and then fires the events
//! scheduled for that tick. Engines are driven through their public API only
//! (`send`, `process`, `receive`) with [`SimFaces`] as the face adapter.

pub mod device;
pub mod event;
pub mod metrics;
pub mod scenario;
pub mod sim;
pub mod topology;

// Re-export main types
pub use device::{count_of, CountingHooks, SimDevice, SimEngine, SimFaces, SimMessage, COUNT_QUERY, RESET};
pub use event::{Event, ScenarioAction, ScheduledEvent, Tick};
pub use metrics::{ResultRecord, SimMetrics, SimulationResult};
pub use scenario::{chain_count, ScenarioBuilder};
pub use sim::Simulator;
pub use topology::{face, opposite, DeviceId, Link, Topology};

#[cfg(test)]
mod tests {
    use super::*;
    use facecast::DebugEvent;

    /// Three devices A-B-C, count query from A.
    #[test]
    fn test_three_device_chain() {
        let (mut sim, ids) = chain_count(3).build();
        let result = sim.run_until_quiet(50);

        assert!(result.quiescent);
        assert_eq!(result.final_count(), Some(3));
        assert_eq!(result.metrics.results.len(), 1);
        assert_eq!(result.metrics.latest_result().unwrap().device, ids[0]);

        // Two forward hops, two reply hops, nothing lost
        assert_eq!(result.total(|m| m.forwarded), 2);
        assert_eq!(result.total(|m| m.replies_sent), 2);
        assert_eq!(result.metrics.frames_sent, 4);
        assert_eq!(result.metrics.frames_dropped, 0);
        assert_eq!(result.total(|m| m.malformed), 0);

        let events = sim.device(ids[1]).unwrap().take_debug_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, DebugEvent::BroadcastStarted { id: COUNT_QUERY, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, DebugEvent::ReplySent { id: COUNT_QUERY, .. })));
    }

    #[test]
    fn test_ring_loop_suppression() {
        let result = ScenarioBuilder::new(4)
            .ring_topology()
            .count_at(0, 0)
            .run_until_quiet(50);

        assert!(result.quiescent);
        // Each device counted once despite the cycle
        assert_eq!(result.final_count(), Some(4));
        assert_eq!(result.total(|m| m.received), 3);
        assert_eq!(result.total(|m| m.loops), 2);
        assert_eq!(result.total(|m| m.echoes), 0);
    }

    #[test]
    fn test_star_count() {
        let result = ScenarioBuilder::new(5)
            .star_topology()
            .count_at(0, 0)
            .run_until_quiet(50);

        assert_eq!(result.final_count(), Some(5));
        // The hub floods once per spoke
        assert_eq!(result.device_metrics[0].forwarded, 4);
        assert_eq!(result.device_metrics[0].replies_received, 4);
    }

    #[test]
    fn test_grid_count_from_every_corner() {
        for origin in [0, 2, 6, 8] {
            let result = ScenarioBuilder::new(9)
                .grid_topology(3)
                .count_at(0, origin)
                .run_until_quiet(100);

            assert!(result.quiescent, "origin {origin}");
            assert_eq!(result.final_count(), Some(9), "origin {origin}");
            assert_eq!(result.metrics.latest_result().unwrap().device, origin);
        }
    }

    #[test]
    fn test_fire_and_forget_reaches_everyone_once() {
        let (mut sim, ids) = ScenarioBuilder::new(9)
            .grid_topology(3)
            .send_at(0, 4, SimMessage::new(7, true))
            .build();

        let result = sim.run_until_quiet(50);

        assert!(result.quiescent);
        assert!(result.metrics.results.is_empty());
        assert_eq!(result.total(|m| m.replies_sent), 0);
        for &id in &ids {
            let expected = if id == 4 { 0 } else { 1 };
            assert_eq!(sim.device(id).unwrap().hooks().received, expected, "device {id}");
        }
    }

    #[test]
    fn test_repeated_queries_get_fresh_sequences() {
        let result = ScenarioBuilder::new(4)
            .ring_topology()
            .count_at(0, 0)
            .count_at(1, 0)
            .count_at(2, 0)
            .run_until_quiet(100);

        let sequences: Vec<u8> = result.metrics.results.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(result.metrics.results.iter().all(|r| r.count == 4));
        assert!(result.metrics.sends_refused > 0);
    }

    #[test]
    fn test_stuck_broadcast_cleared_by_reset() {
        let (mut sim, ids) = chain_count(3)
            // B's flood toward C is lost with the link
            .disable_link_at(2, 1, face(0))
            .enable_link_at(10, 1, face(0))
            .reset_at(12, 2)
            .count_at(20, 0)
            .build();

        sim.run_until(19);
        assert!(sim.metrics().results.is_empty());
        assert_eq!(sim.metrics().frames_dropped, 1);
        // The reset from C cleared A and B
        assert!(!sim.device(ids[0]).unwrap().is_processing());
        assert!(!sim.device(ids[1]).unwrap().is_processing());

        let result = sim.run_until_quiet(50);
        assert!(result.quiescent);
        assert_eq!(result.metrics.results.len(), 1);
        assert_eq!(result.final_count(), Some(3));
        assert!(result.metrics.latest_result().unwrap().tick > 20);
    }

    #[test]
    fn test_stuck_originator_refuses_new_queries() {
        let (mut sim, ids) = chain_count(2)
            .disable_link_at(1, 0, face(0))
            .count_at(5, 0)
            .build();

        let result = sim.run_for(20);

        assert!(result.metrics.results.is_empty());
        assert!(result.metrics.sends_refused >= 10);
        assert!(sim.device(ids[0]).unwrap().is_processing());
    }

    /// Copy of the first flood device 0 puts on face 0.
    fn first_flood(sim: &mut Simulator) -> facecast::Frame {
        sim.run_until(1);
        sim.device(0)
            .unwrap()
            .faces()
            .outbound(face(0))
            .copied()
            .expect("flood sent on tick 1")
    }

    #[test]
    fn test_duplicate_delivery_after_completion() {
        let (mut sim, ids) = chain_count(2).build();
        let flood = first_flood(&mut sim);
        let result = sim.run_until_quiet(50);
        assert_eq!(result.final_count(), Some(2));

        // The link hands B the same flood again
        assert!(sim.device_mut(ids[1]).unwrap().faces_mut().deliver(face(3), flood));
        let result = sim.run_until_quiet(50);

        assert!(result.quiescent);
        assert_eq!(result.metrics.results.len(), 1);
        assert_eq!(result.metrics.frames_sent, 2);
        assert_eq!(result.total(|m| m.echoes), 0);
        assert_eq!(result.device_metrics[ids[1]].loops, 1);
    }

    #[test]
    fn test_duplicate_from_parent_mid_flood() {
        let (mut sim, ids) = chain_count(3).build();
        let flood = first_flood(&mut sim);
        while !sim.device(ids[1]).unwrap().is_processing() {
            sim.tick();
        }

        // B is still waiting on C when A's flood reaches it twice
        assert!(sim.device_mut(ids[1]).unwrap().faces_mut().deliver(face(3), flood));
        let result = sim.run_until_quiet(50);

        assert!(result.quiescent);
        assert_eq!(result.metrics.results.len(), 1);
        assert_eq!(result.final_count(), Some(3));
        assert_eq!(result.total(|m| m.echoes), 0);
        assert_eq!(result.total(|m| m.stale_replies), 0);
        assert_eq!(result.device_metrics[ids[1]].loops, 1);
    }

    #[test]
    fn test_lossy_links_lose_frames_deterministically() {
        let run = || {
            ScenarioBuilder::new(6)
                .ring_topology()
                .with_seed(9)
                .with_loss_rate(0.2)
                .count_at(0, 0)
                .run_for(100)
        };
        let (a, b) = (run(), run());

        assert_eq!(a.metrics.frames_dropped, b.metrics.frames_dropped);
        assert_eq!(a.metrics.results, b.metrics.results);
        // A lost frame never produces an over-count
        assert!(a.final_count().map_or(true, |count| count <= 6));
    }
}
