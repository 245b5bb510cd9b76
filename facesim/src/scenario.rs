//! Scenario builder for setting up and running simulations.

use facecast::Face;

use crate::device::{SimMessage, COUNT_QUERY, RESET};
use crate::event::{ScenarioAction, Tick};
use crate::metrics::SimulationResult;
use crate::sim::Simulator;
use crate::topology::{DeviceId, Topology};

/// Type of topology to generate.
#[derive(Debug, Clone)]
enum TopologyType {
    /// Devices in a line.
    Chain,
    /// Devices in a cycle.
    Ring,
    /// First device is hub.
    Star,
    /// Row-major grid of the given width.
    Grid { width: usize },
    /// Custom topology provided by user.
    Custom(Topology),
}

/// Builder for simulation scenarios.
pub struct ScenarioBuilder {
    /// Number of devices to create.
    num_devices: usize,
    /// RNG seed for determinism.
    seed: u64,
    /// Topology type to generate (must be explicitly specified).
    topology_type: Option<TopologyType>,
    /// Global frame loss rate.
    loss_rate: f64,
    /// Scheduled sends.
    sends: Vec<(Tick, DeviceId, SimMessage)>,
    /// Scheduled actions.
    actions: Vec<(Tick, ScenarioAction)>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ScenarioBuilder {
    /// Create a new scenario with the specified number of devices.
    ///
    /// Note: You MUST specify a topology before calling build().
    /// Use `.chain_topology()`, `.ring_topology()`, `.star_topology()`,
    /// `.grid_topology(width)`, or `.topology(custom_topology)`.
    pub fn new(num_devices: usize) -> Self {
        Self {
            num_devices,
            seed: 42,
            topology_type: None,
            loss_rate: 0.0,
            sends: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Set the RNG seed for deterministic simulation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set a custom face wiring.
    pub fn topology(mut self, topo: Topology) -> Self {
        self.topology_type = Some(TopologyType::Custom(topo));
        self
    }

    /// Use chain topology.
    pub fn chain_topology(mut self) -> Self {
        self.topology_type = Some(TopologyType::Chain);
        self
    }

    /// Use ring topology.
    pub fn ring_topology(mut self) -> Self {
        self.topology_type = Some(TopologyType::Ring);
        self
    }

    /// Use star topology (first device is hub).
    pub fn star_topology(mut self) -> Self {
        self.topology_type = Some(TopologyType::Star);
        self
    }

    /// Use grid topology `width` devices wide.
    pub fn grid_topology(mut self, width: usize) -> Self {
        self.topology_type = Some(TopologyType::Grid { width });
        self
    }

    /// Set global frame loss rate.
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Schedule a broadcast from a device.
    pub fn send_at(mut self, tick: Tick, device: DeviceId, message: SimMessage) -> Self {
        self.sends.push((tick, device, message));
        self
    }

    /// Schedule a device-count query.
    pub fn count_at(self, tick: Tick, device: DeviceId) -> Self {
        self.send_at(tick, device, SimMessage::new(COUNT_QUERY, false))
    }

    /// Schedule a network-wide reset.
    pub fn reset_at(self, tick: Tick, device: DeviceId) -> Self {
        self.send_at(tick, device, SimMessage::new(RESET, false))
    }

    /// Schedule pulling the link on a face apart.
    pub fn disable_link_at(mut self, tick: Tick, device: DeviceId, face: Face) -> Self {
        self.actions
            .push((tick, ScenarioAction::DisableLink { device, face }));
        self
    }

    /// Schedule putting the link on a face back together.
    pub fn enable_link_at(mut self, tick: Tick, device: DeviceId, face: Face) -> Self {
        self.actions
            .push((tick, ScenarioAction::EnableLink { device, face }));
        self
    }

    /// Schedule a global loss rate change.
    pub fn loss_rate_at(mut self, tick: Tick, rate: f64) -> Self {
        self.actions
            .push((tick, ScenarioAction::SetGlobalLossRate { rate }));
        self
    }

    /// Build the simulator with all devices and topology.
    pub fn build(self) -> (Simulator, Vec<DeviceId>) {
        let mut sim = Simulator::new(self.seed);
        let ids = sim.add_devices(self.num_devices);

        let mut topo = match self.topology_type {
            Some(TopologyType::Chain) => Topology::chain(&ids),
            Some(TopologyType::Ring) => Topology::ring(&ids),
            Some(TopologyType::Star) => Topology::star(&ids),
            Some(TopologyType::Grid { width }) => Topology::grid(&ids, width),
            Some(TopologyType::Custom(t)) => t,
            None => panic!(
                "Topology must be explicitly specified. \
                Use .chain_topology(), .ring_topology(), .star_topology(), \
                .grid_topology(), or .topology()"
            ),
        };

        if self.loss_rate > 0.0 {
            topo.set_global_loss_rate(self.loss_rate);
        }
        let mut sim = sim.with_topology(topo);

        for (tick, device, message) in self.sends {
            sim.send_at(tick, device, message);
        }
        for (tick, action) in self.actions {
            sim.schedule_action(tick, action);
        }

        (sim, ids)
    }

    /// Build and run for the specified number of ticks.
    pub fn run_for(self, ticks: Tick) -> SimulationResult {
        let (mut sim, _) = self.build();
        sim.run_for(ticks)
    }

    /// Build and run until quiet, for at most `max_ticks`.
    pub fn run_until_quiet(self, max_ticks: Tick) -> SimulationResult {
        let (mut sim, _) = self.build();
        sim.run_until_quiet(max_ticks)
    }
}

/// Count query from device 0 over an N-device chain.
pub fn chain_count(num_devices: usize) -> ScenarioBuilder {
    ScenarioBuilder::new(num_devices)
        .chain_topology()
        .count_at(0, 0)
}
