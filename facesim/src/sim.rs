//! Tick-driven simulator for facecast meshes.

use std::collections::BinaryHeap;

use facecast::Face;

use crate::device::{count_of, SimDevice, SimMessage};
use crate::event::{Event, ScenarioAction, ScheduledEvent, SequenceNumber, Tick};
use crate::metrics::{ResultRecord, SimMetrics, SimulationResult};
use crate::topology::{DeviceId, Topology, SIM_FACES};

/// Simulator for a set of devices wired face to face.
///
/// Each tick:
/// 1. Move every outbound frame into the peer's inbound slot if it is free
///    (dropping it on loss or a missing link, holding it otherwise)
/// 2. Mark faces without an active link as expired
/// 3. Run `process()` on every device and collect results
/// 4. Fire events scheduled for this tick
pub struct Simulator {
    /// All devices, indexed by `DeviceId`.
    devices: Vec<SimDevice>,
    /// Face wiring.
    topology: Topology,
    /// Current tick.
    current_tick: Tick,
    /// Priority queue of scheduled events.
    event_queue: BinaryHeap<ScheduledEvent>,
    /// Collected metrics.
    metrics: SimMetrics,
    /// Next sequence number for event ordering.
    next_seq: u64,
    /// RNG state for frame loss.
    rng_state: u64,
}

impl Simulator {
    /// Create a new simulator with given RNG seed.
    pub fn new(seed: u64) -> Self {
        Self {
            devices: Vec::new(),
            topology: Topology::new(),
            current_tick: 0,
            event_queue: BinaryHeap::new(),
            metrics: SimMetrics::new(),
            next_seq: 0,
            rng_state: seed,
        }
    }

    /// Set the face wiring.
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self.refresh_expiry();
        self
    }

    /// Add a device to the simulation.
    pub fn add_device(&mut self) -> DeviceId {
        let id = self.devices.len();
        self.devices.push(SimDevice::new(id));
        self.refresh_expiry();
        id
    }

    /// Add `count` devices.
    pub fn add_devices(&mut self, count: usize) -> Vec<DeviceId> {
        (0..count).map(|_| self.add_device()).collect()
    }

    /// Get a reference to a device.
    pub fn device(&self, id: DeviceId) -> Option<&SimDevice> {
        self.devices.get(id)
    }

    /// Get a mutable reference to a device.
    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut SimDevice> {
        self.devices.get_mut(id)
    }

    /// Get all device IDs.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        (0..self.devices.len()).collect()
    }

    /// Get the current tick.
    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Get the topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Get mutable topology. Expiry follows on the next tick.
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    /// Get collected metrics.
    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    /// Schedule an event.
    pub fn schedule(&mut self, tick: Tick, event: Event) {
        let seq = SequenceNumber::new(self.next_seq);
        self.next_seq += 1;
        self.event_queue.push(ScheduledEvent::new(tick, seq, event));
    }

    /// Schedule a broadcast from `device`.
    pub fn send_at(&mut self, tick: Tick, device: DeviceId, message: SimMessage) {
        self.schedule(tick, Event::Send { device, message });
    }

    /// Schedule a scenario action.
    pub fn schedule_action(&mut self, tick: Tick, action: ScenarioAction) {
        self.schedule(tick, Event::ScenarioAction(action));
    }

    /// Run simulation until specified tick.
    pub fn run_until(&mut self, end_tick: Tick) -> SimulationResult {
        while self.current_tick < end_tick {
            self.tick();
        }
        self.result()
    }

    /// Run simulation for `ticks` more ticks.
    pub fn run_for(&mut self, ticks: Tick) -> SimulationResult {
        self.run_until(self.current_tick + ticks)
    }

    /// Run until nothing is left to do, or `max_ticks` have passed.
    pub fn run_until_quiet(&mut self, max_ticks: Tick) -> SimulationResult {
        let end_tick = self.current_tick + max_ticks;
        while self.current_tick < end_tick {
            self.tick();
            if self.event_queue.is_empty() && self.is_quiescent() {
                break;
            }
        }
        self.result()
    }

    /// No frames in any slot and no device waiting on replies.
    pub fn is_quiescent(&self) -> bool {
        self.devices
            .iter()
            .all(|d| !d.faces().has_traffic() && !d.is_processing())
    }

    /// Snapshot of the run so far.
    pub fn result(&self) -> SimulationResult {
        SimulationResult {
            end_tick: self.current_tick,
            metrics: self.metrics.clone(),
            device_metrics: self.devices.iter().map(|d| *d.engine().metrics()).collect(),
            queue_exhausted: self.event_queue.is_empty(),
            quiescent: self.is_quiescent(),
        }
    }

    /// Advance one tick.
    pub fn tick(&mut self) {
        self.current_tick += 1;

        self.transfer_frames();
        self.refresh_expiry();

        for id in 0..self.devices.len() {
            self.devices[id].process();
            self.collect_result(id);
        }

        self.run_due_events();
    }

    /// Move outbound frames across links.
    fn transfer_frames(&mut self) {
        for id in 0..self.devices.len() {
            for face in Face::all(SIM_FACES) {
                if self.devices[id].faces().outbound(face).is_none() {
                    continue;
                }

                let route = self
                    .topology
                    .link((id, face))
                    .filter(|link| link.active)
                    .map(|link| link.loss_rate)
                    .zip(self.topology.peer((id, face)));

                let Some((loss_rate, (peer, peer_face))) = route else {
                    // Faces pulled apart with a frame still in the slot
                    self.devices[id].faces_mut().take_outbound(face);
                    self.metrics.frames_sent += 1;
                    self.metrics.frames_dropped += 1;
                    continue;
                };

                let Some(target) = self.devices.get(peer) else {
                    continue;
                };
                if !target.faces().can_deliver(peer_face) {
                    self.metrics.frames_held += 1;
                    continue;
                }

                let Some(frame) = self.devices[id].faces_mut().take_outbound(face) else {
                    continue;
                };
                self.metrics.frames_sent += 1;

                if loss_rate > 0.0 && self.random_f64() < loss_rate {
                    self.metrics.frames_dropped += 1;
                    continue;
                }

                if self.devices[peer].faces_mut().deliver(peer_face, frame) {
                    self.metrics.frames_delivered += 1;
                }
            }
        }
    }

    /// A face is live exactly when it has an active link.
    fn refresh_expiry(&mut self) {
        for (id, device) in self.devices.iter_mut().enumerate() {
            for face in Face::all(SIM_FACES) {
                let live = self.topology.is_connected((id, face));
                device.faces_mut().set_expired(face, !live);
            }
        }
    }

    fn collect_result(&mut self, id: DeviceId) {
        let now = self.current_tick;
        let Some(message) = self.devices[id].collect_result(now) else {
            return;
        };
        let record = ResultRecord {
            tick: now,
            device: id,
            id: message.header.id,
            sequence: message.header.sequence,
            count: count_of(message),
        };
        self.metrics.add_result(record);
    }

    fn run_due_events(&mut self) {
        while self
            .event_queue
            .peek()
            .is_some_and(|event| event.tick <= self.current_tick)
        {
            let Some(event) = self.event_queue.pop() else {
                break;
            };
            self.process_event(event.event);
        }
    }

    /// Process a single event.
    fn process_event(&mut self, event: Event) {
        match event {
            Event::Send { device, message } => self.app_send(device, message),
            Event::ScenarioAction(action) => self.execute_action(action),
        }
    }

    /// Originate on behalf of the application, retrying next tick if refused.
    fn app_send(&mut self, id: DeviceId, message: SimMessage) {
        let Some(device) = self.devices.get_mut(id) else {
            return;
        };
        if device.send(message) {
            // An isolated originator resolves immediately
            self.collect_result(id);
        } else {
            self.metrics.sends_refused += 1;
            self.send_at(self.current_tick + 1, id, message);
        }
    }

    /// Execute a scenario action.
    fn execute_action(&mut self, action: ScenarioAction) {
        match action {
            ScenarioAction::DisableLink { device, face } => {
                if let Some(link) = self.topology.link_mut((device, face)) {
                    link.active = false;
                }
            }
            ScenarioAction::EnableLink { device, face } => {
                if let Some(link) = self.topology.link_mut((device, face)) {
                    link.active = true;
                }
            }
            ScenarioAction::SetLossRate { device, face, rate } => {
                if let Some(link) = self.topology.link_mut((device, face)) {
                    link.loss_rate = rate.clamp(0.0, 1.0);
                }
            }
            ScenarioAction::SetGlobalLossRate { rate } => {
                self.topology.set_global_loss_rate(rate);
            }
        }
        self.refresh_expiry();
    }

    /// Generate a random f64 in [0, 1).
    fn random_f64(&mut self) -> f64 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.rng_state as f64) / (u64::MAX as f64)
    }
}
