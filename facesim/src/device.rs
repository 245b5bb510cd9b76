//! SimDevice wrapper for simulated facecast devices.

use facecast::debug::DebugEvent;
use facecast::{
    Broadcast, BroadcastConfig, DefaultConfig, Face, FaceIo, FaceSet, Frame, Hooks, Message,
    DEFAULT_PAYLOAD_BYTES,
};

use crate::event::Tick;
use crate::topology::{DeviceId, SIM_FACES};

/// Message type carried between simulated devices.
pub type SimMessage = Message<DEFAULT_PAYLOAD_BYTES>;

/// Broadcast id of the device-count query answered by [`CountingHooks`].
pub const COUNT_QUERY: u8 = 1;

/// Broadcast id reserved for network-wide reset.
pub const RESET: u8 = DefaultConfig::RESET_MESSAGE_ID;

/// Single-slot faces driven by the simulator.
///
/// The simulator moves frames from outbound slots into peer inbound slots
/// and marks faces without an active link as expired.
pub struct SimFaces {
    inbound: [Option<Frame>; SIM_FACES as usize],
    outbound: [Option<Frame>; SIM_FACES as usize],
    expired: FaceSet,
    sent: u64,
}

impl SimFaces {
    /// All faces start expired until the simulator sees their links.
    pub fn new() -> Self {
        Self {
            inbound: [None; SIM_FACES as usize],
            outbound: [None; SIM_FACES as usize],
            expired: Face::all(SIM_FACES).collect(),
            sent: 0,
        }
    }

    /// Take the outbound frame on `face`, freeing the slot.
    pub fn take_outbound(&mut self, face: Face) -> Option<Frame> {
        self.outbound[face.index() as usize].take()
    }

    /// Peek at the outbound frame on `face`.
    pub fn outbound(&self, face: Face) -> Option<&Frame> {
        self.outbound[face.index() as usize].as_ref()
    }

    /// Is the inbound slot free?
    pub fn can_deliver(&self, face: Face) -> bool {
        self.inbound[face.index() as usize].is_none()
    }

    /// Fill the inbound slot. False if it is occupied.
    pub fn deliver(&mut self, face: Face, frame: Frame) -> bool {
        let slot = &mut self.inbound[face.index() as usize];
        if slot.is_some() {
            return false;
        }
        *slot = Some(frame);
        true
    }

    pub fn set_expired(&mut self, face: Face, expired: bool) {
        if expired {
            self.expired.mark(face);
        } else {
            self.expired.clear(face);
        }
    }

    /// Any frame sitting in a slot?
    pub fn has_traffic(&self) -> bool {
        self.inbound.iter().chain(self.outbound.iter()).any(Option::is_some)
    }

    /// Frames accepted by `send`.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Default for SimFaces {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceIo for SimFaces {
    fn has_inbound(&self, face: Face) -> bool {
        self.inbound[face.index() as usize].is_some()
    }

    fn read_inbound(&self, face: Face) -> &[u8] {
        self.inbound[face.index() as usize]
            .as_ref()
            .map(Frame::as_slice)
            .unwrap_or(&[])
    }

    fn consume_inbound(&mut self, face: Face) {
        self.inbound[face.index() as usize] = None;
    }

    fn outbound_pending(&self, face: Face) -> bool {
        self.outbound[face.index() as usize].is_some()
    }

    fn send(&mut self, face: Face, frame: &[u8]) -> bool {
        let slot = &mut self.outbound[face.index() as usize];
        if slot.is_some() {
            return false;
        }
        *slot = Some(Frame::from_slice(frame));
        self.sent += 1;
        true
    }

    fn is_expired(&self, face: Face) -> bool {
        self.expired.contains(face)
    }
}

/// Convergecast that counts the devices reached by a [`COUNT_QUERY`].
///
/// Each reply carries a little-endian `u16` subtree size in payload bytes
/// 0..2. Every other id passes through untouched.
#[derive(Debug, Default)]
pub struct CountingHooks {
    subtotal: u16,
    /// New broadcasts received, by any id.
    pub received: u32,
    /// Same-epoch re-deliveries seen.
    pub loops: u32,
}

impl CountingHooks {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decode the count carried by a [`COUNT_QUERY`] reply.
pub fn count_of(message: &SimMessage) -> u16 {
    let buf = message.payload_buf();
    u16::from_le_bytes([buf[0], buf[1]])
}

impl Hooks<DEFAULT_PAYLOAD_BYTES> for CountingHooks {
    fn on_receive(&mut self, id: u8, _src: Face, _payload: &mut [u8; DEFAULT_PAYLOAD_BYTES], is_loop: bool) {
        if is_loop {
            self.loops += 1;
            return;
        }
        self.received += 1;
        if id == COUNT_QUERY {
            self.subtotal = 0;
        }
    }

    fn on_forward(
        &mut self,
        id: u8,
        src: Option<Face>,
        _dst: Face,
        _payload: &mut [u8; DEFAULT_PAYLOAD_BYTES],
    ) -> usize {
        if id == COUNT_QUERY && src.is_none() {
            self.subtotal = 0;
        }
        DEFAULT_PAYLOAD_BYTES
    }

    fn on_reply_receive(&mut self, id: u8, _src: Face, payload: &[u8; DEFAULT_PAYLOAD_BYTES]) {
        if id == COUNT_QUERY {
            let count = u16::from_le_bytes([payload[0], payload[1]]);
            self.subtotal = self.subtotal.saturating_add(count);
        }
    }

    fn on_reply_forward(
        &mut self,
        id: u8,
        _dst: Option<Face>,
        payload: &mut [u8; DEFAULT_PAYLOAD_BYTES],
    ) -> usize {
        if id != COUNT_QUERY {
            return DEFAULT_PAYLOAD_BYTES;
        }
        let total = self.subtotal.saturating_add(1);
        self.subtotal = 0;
        payload[..2].copy_from_slice(&total.to_le_bytes());
        2
    }
}

/// Engine type used by simulated devices.
pub type SimEngine = Broadcast<SimFaces, CountingHooks, DefaultConfig>;

/// One simulated device: an engine plus the results it produced.
pub struct SimDevice {
    id: DeviceId,
    engine: SimEngine,
    results: Vec<(Tick, SimMessage)>,
}

impl SimDevice {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            engine: Broadcast::new(SimFaces::new(), CountingHooks::new()),
            results: Vec::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SimEngine {
        &mut self.engine
    }

    pub fn faces(&self) -> &SimFaces {
        self.engine.faces()
    }

    pub fn faces_mut(&mut self) -> &mut SimFaces {
        self.engine.faces_mut()
    }

    pub fn hooks(&self) -> &CountingHooks {
        self.engine.hooks()
    }

    /// Run one engine tick.
    pub fn process(&mut self) {
        self.engine.process();
    }

    /// Originate a broadcast. False if the engine refused it.
    pub fn send(&mut self, message: SimMessage) -> bool {
        self.engine.send(message)
    }

    /// Record the engine's result for this tick, if any.
    pub fn collect_result(&mut self, now: Tick) -> Option<&SimMessage> {
        let result = self.engine.receive()?;
        self.results.push((now, result));
        self.results.last().map(|(_, message)| message)
    }

    /// Every result produced so far, with the tick it appeared on.
    pub fn results(&self) -> &[(Tick, SimMessage)] {
        &self.results
    }

    /// Count carried by the most recent result.
    pub fn last_count(&self) -> Option<u16> {
        self.results.last().map(|(_, message)| count_of(message))
    }

    /// Does this device still wait on replies?
    pub fn is_processing(&self) -> bool {
        self.engine.is_processing()
    }

    /// Take all debug events from the engine's debug channel.
    pub fn take_debug_events(&self) -> Vec<DebugEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.engine.debug_channel().try_receive() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::face;

    #[test]
    fn test_sim_faces_start_expired() {
        let faces = SimFaces::new();
        assert!(Face::all(SIM_FACES).all(|f| faces.is_expired(f)));
        assert!(!faces.has_traffic());
    }

    #[test]
    fn test_sim_faces_slots() {
        let mut faces = SimFaces::new();
        assert!(faces.send(face(2), &[1, 2]));
        assert!(!faces.send(face(2), &[3]));
        assert!(faces.has_traffic());
        assert_eq!(faces.sent(), 1);

        let frame = faces.take_outbound(face(2)).unwrap();
        assert!(faces.deliver(face(4), frame));
        assert!(!faces.can_deliver(face(4)));
        assert_eq!(faces.read_inbound(face(4)), &[1, 2]);
    }

    #[test]
    fn test_isolated_device_counts_itself() {
        let mut device = SimDevice::new(0);
        assert!(device.send(SimMessage::new(COUNT_QUERY, false)));

        assert!(device.collect_result(0).is_some());
        assert_eq!(device.last_count(), Some(1));
        assert!(device
            .take_debug_events()
            .iter()
            .any(|e| matches!(e, DebugEvent::ResultReady { id: COUNT_QUERY, .. })));
    }

    #[test]
    fn test_counting_hooks_sum_subtrees() {
        let mut hooks = CountingHooks::new();
        let mut payload = [0u8; DEFAULT_PAYLOAD_BYTES];

        hooks.on_receive(COUNT_QUERY, face(0), &mut payload, false);
        hooks.on_reply_receive(COUNT_QUERY, face(1), &{
            let mut p = [0u8; DEFAULT_PAYLOAD_BYTES];
            p[..2].copy_from_slice(&3u16.to_le_bytes());
            p
        });
        hooks.on_reply_receive(COUNT_QUERY, face(2), &{
            let mut p = [0u8; DEFAULT_PAYLOAD_BYTES];
            p[0] = 2;
            p
        });

        assert_eq!(hooks.on_reply_forward(COUNT_QUERY, Some(face(0)), &mut payload), 2);
        assert_eq!(u16::from_le_bytes([payload[0], payload[1]]), 6);

        // Other ids pass through
        let mut other = [9u8; DEFAULT_PAYLOAD_BYTES];
        assert_eq!(
            hooks.on_reply_forward(7, None, &mut other),
            DEFAULT_PAYLOAD_BYTES
        );
        assert_eq!(other, [9u8; DEFAULT_PAYLOAD_BYTES]);
    }
}
