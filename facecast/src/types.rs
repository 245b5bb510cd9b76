//! Core types and constants for the facecast protocol.

use core::fmt;

// Memory bounds
pub const MAX_FACES: usize = 32; // FaceSet is a u32 bitmask
pub const MAX_FRAME_BYTES: usize = 64;
pub const HEADER_BYTES: usize = 3;
pub const MAX_PAYLOAD_BYTES: usize = MAX_FRAME_BYTES - HEADER_BYTES;

/// Payload capacity giving 16 byte frames.
pub const DEFAULT_PAYLOAD_BYTES: usize = 13;

// Header flag bits
pub const FLAG_IS_REPLY: u8 = 0x01;
pub const FLAG_FIRE_AND_FORGET: u8 = 0x02;
pub const FLAGS_RESERVED: u8 = !(FLAG_IS_REPLY | FLAG_FIRE_AND_FORGET);

/// One neighbour link, identified by its index on the device.
///
/// Faces are a static enumeration: `0..FACE_COUNT`. "No face" (a message
/// originated locally) is expressed as `Option<Face>::None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Face(u8);

impl Face {
    /// Create a face from its index, or `None` if it cannot be tracked.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_FACES {
            Some(Face(index))
        } else {
            None
        }
    }

    /// Index of this face on the device.
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Iterate over the first `count` faces.
    pub fn all(count: u8) -> impl Iterator<Item = Face> + Clone {
        (0..count.min(MAX_FACES as u8)).map(Face)
    }

    #[inline]
    const fn bit(self) -> u32 {
        1u32 << self.0
    }
}

impl fmt::Debug for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Face({})", self.0)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of faces backed by a bitmask.
///
/// Used for `sent_faces`: the faces a tracked broadcast went out on and that
/// still owe us a reply.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaceSet(u32);

impl FaceSet {
    /// The empty set.
    pub const EMPTY: FaceSet = FaceSet(0);

    /// Create an empty set.
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Add a face.
    #[inline]
    pub fn mark(&mut self, face: Face) {
        self.0 |= face.bit();
    }

    /// Remove a face.
    #[inline]
    pub fn clear(&mut self, face: Face) {
        self.0 &= !face.bit();
    }

    /// Remove every face.
    #[inline]
    pub fn clear_all(&mut self) {
        self.0 = 0;
    }

    #[inline]
    pub const fn contains(&self, face: Face) -> bool {
        self.0 & face.bit() != 0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of faces in the set.
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Copy of this set without `face`.
    #[inline]
    pub const fn without(self, face: Face) -> Self {
        FaceSet(self.0 & !face.bit())
    }

    /// Iterate faces in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = Face> {
        let bits = self.0;
        (0..MAX_FACES as u8)
            .filter(move |&i| bits & (1u32 << i) != 0)
            .map(Face)
    }
}

impl FromIterator<Face> for FaceSet {
    fn from_iter<I: IntoIterator<Item = Face>>(iter: I) -> Self {
        let mut set = FaceSet::new();
        for face in iter {
            set.mark(face);
        }
        set
    }
}

impl fmt::Debug for FaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|face| face.0)).finish()
    }
}

/// Counters kept by the engine for monitoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BroadcastMetrics {
    /// Broadcasts started locally through `send`.
    pub originated: u32,
    /// New broadcasts accepted from a neighbour.
    pub received: u32,
    /// Frames written while flooding.
    pub forwarded: u32,
    /// Same-epoch re-deliveries (loops and duplicates).
    pub loops: u32,
    /// Late-propagation echoes sent back to a waiting neighbour.
    pub echoes: u32,
    /// Replies accepted from a face we were waiting on.
    pub replies_received: u32,
    /// Aggregated replies sent to a parent face.
    pub replies_sent: u32,
    /// Results produced for a locally originated broadcast.
    pub results: u32,
    /// Inbound datagrams left in place because a required send would fail.
    pub deferred: u32,
    /// Inbound datagrams dropped because they did not decode.
    pub malformed: u32,
    /// Replies dropped because no reply was owed on that face.
    pub stale_replies: u32,
    /// Sends refused by the adapter after the feasibility check passed.
    pub send_failures: u32,
}

impl BroadcastMetrics {
    /// Create zeroed metrics.
    pub const fn new() -> Self {
        Self {
            originated: 0,
            received: 0,
            forwarded: 0,
            loops: 0,
            echoes: 0,
            replies_received: 0,
            replies_sent: 0,
            results: 0,
            deferred: 0,
            malformed: 0,
            stale_replies: 0,
            send_failures: 0,
        }
    }
}
