//! Physical wiring between device faces and link properties.
//!
//! Devices are laid out as hexagonal tiles with six faces. Face `f` sits
//! opposite face `(f + 3) % 6`, so two tiles side by side connect through
//! opposite faces:
//!
//! ```text
//!          4   5
//!        3   *   0
//!          2   1
//! ```
//!
//! A grid uses faces 0 (east) / 3 (west) horizontally and 1 (south) / 4
//! (north) vertically.

use facecast::{BroadcastConfig, DefaultConfig, Face};
use hashbrown::HashMap;

/// Index of a device in the simulator.
pub type DeviceId = usize;

/// One side of a link.
pub type Endpoint = (DeviceId, Face);

/// Faces per simulated device.
pub const SIM_FACES: u8 = DefaultConfig::FACE_COUNT;

/// Face on the far side of a tile.
pub fn opposite(face: Face) -> Face {
    Face::new((face.index() + SIM_FACES / 2) % SIM_FACES).unwrap_or(face)
}

/// Build a face index known to be in range.
///
/// # Panics
///
/// Panics if `index` is not below [`SIM_FACES`].
pub fn face(index: u8) -> Face {
    match Face::new(index) {
        Some(face) if index < SIM_FACES => face,
        _ => panic!("face {index} out of range"),
    }
}

/// Properties of the connection between two faces.
#[derive(Debug, Clone)]
pub struct Link {
    /// Frame loss rate (0.0 to 1.0).
    pub loss_rate: f64,
    /// Whether the faces are currently touching.
    pub active: bool,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            active: true,
        }
    }
}

impl Link {
    /// Create a new link with default properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the loss rate.
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set whether the link is active.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Face-to-face connectivity between devices.
///
/// Each face touches at most one other face. Adding a link to a face that is
/// already wired replaces the old link.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Links keyed by canonical endpoint pair.
    links: HashMap<(Endpoint, Endpoint), Link>,
    /// Peer lookup in both directions.
    peers: HashMap<Endpoint, Endpoint>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices in a line: east face of each to west face of the next.
    pub fn chain(devices: &[DeviceId]) -> Self {
        let mut topo = Self::new();
        for pair in devices.windows(2) {
            topo.connect(pair[0], face(0), pair[1], face(3));
        }
        topo
    }

    /// A chain closed into a cycle.
    pub fn ring(devices: &[DeviceId]) -> Self {
        let mut topo = Self::chain(devices);
        if let (Some(&first), Some(&last)) = (devices.first(), devices.last()) {
            if devices.len() > 2 {
                topo.connect(last, face(0), first, face(3));
            }
        }
        topo
    }

    /// First device is the hub; spoke `k` touches hub face `k - 1`.
    ///
    /// At most [`SIM_FACES`] spokes; extra devices stay unconnected.
    pub fn star(devices: &[DeviceId]) -> Self {
        let mut topo = Self::new();
        let Some((&hub, spokes)) = devices.split_first() else {
            return topo;
        };
        for (k, &spoke) in spokes.iter().take(SIM_FACES as usize).enumerate() {
            let hub_face = face(k as u8);
            topo.connect(hub, hub_face, spoke, opposite(hub_face));
        }
        topo
    }

    /// Row-major grid `width` devices wide.
    pub fn grid(devices: &[DeviceId], width: usize) -> Self {
        let mut topo = Self::new();
        if width == 0 {
            return topo;
        }
        for (i, &device) in devices.iter().enumerate() {
            if (i + 1) % width != 0 {
                if let Some(&east) = devices.get(i + 1) {
                    topo.connect(device, face(0), east, face(3));
                }
            }
            if let Some(&south) = devices.get(i + width) {
                topo.connect(device, face(1), south, face(4));
            }
        }
        topo
    }

    /// Wire two faces together with a default link.
    pub fn connect(&mut self, a: DeviceId, a_face: Face, b: DeviceId, b_face: Face) {
        self.add_link((a, a_face), (b, b_face), Link::default());
    }

    /// Wire two faces together.
    pub fn add_link(&mut self, a: Endpoint, b: Endpoint, link: Link) {
        self.remove_link(a);
        self.remove_link(b);
        self.peers.insert(a, b);
        self.peers.insert(b, a);
        self.links.insert(Self::canonical_pair(a, b), link);
    }

    /// Unwire whatever touches `end`.
    pub fn remove_link(&mut self, end: Endpoint) -> Option<Link> {
        let peer = self.peers.remove(&end)?;
        self.peers.remove(&peer);
        self.links.remove(&Self::canonical_pair(end, peer))
    }

    /// The endpoint wired to `end`, active or not.
    pub fn peer(&self, end: Endpoint) -> Option<Endpoint> {
        self.peers.get(&end).copied()
    }

    /// Link touching `end`.
    pub fn link(&self, end: Endpoint) -> Option<&Link> {
        let peer = self.peer(end)?;
        self.links.get(&Self::canonical_pair(end, peer))
    }

    /// Mutable link touching `end`.
    pub fn link_mut(&mut self, end: Endpoint) -> Option<&mut Link> {
        let peer = self.peer(end)?;
        self.links.get_mut(&Self::canonical_pair(end, peer))
    }

    /// Is `end` wired to an active link?
    pub fn is_connected(&self, end: Endpoint) -> bool {
        self.link(end).is_some_and(|link| link.active)
    }

    /// Devices reachable over one active link from `device`.
    pub fn neighbors(&self, device: DeviceId) -> Vec<DeviceId> {
        let mut result: Vec<DeviceId> = self
            .peers
            .iter()
            .filter(|&(&(d, _), _)| d == device)
            .filter(|&(&end, _)| self.is_connected(end))
            .map(|(_, &(peer, _))| peer)
            .collect();
        result.sort_unstable();
        result
    }

    /// Number of links, active or not.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Set the loss rate on every link.
    pub fn set_global_loss_rate(&mut self, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        for link in self.links.values_mut() {
            link.loss_rate = rate;
        }
    }

    /// Canonical pair ordering for consistent link storage.
    fn canonical_pair(a: Endpoint, b: Endpoint) -> (Endpoint, Endpoint) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
