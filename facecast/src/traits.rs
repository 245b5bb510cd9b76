//! Core traits for link-layer and application abstraction.
//!
//! These traits allow the engine to be used with different:
//! - Link layers (IR face links, UART pairs, simulation)
//! - Applications (queries, counters, state sync) plugged in through hooks

use crate::types::Face;
use crate::wire::Message;

/// Per-face datagram slots exposed by the link layer.
///
/// Each face has exactly one inbound and one outbound slot. Nothing queues.
///
/// # Contract
///
/// - `read_inbound` must not consume: the engine calls `consume_inbound`
///   only once the datagram has been fully handled, and leaves it in place
///   otherwise so it is retried on a later tick.
/// - `send` must never block. It returns false when the outbound slot is
///   still occupied.
/// - `outbound_pending` must reflect a successful `send` immediately, so two
///   sends on one face within a tick are detected before they happen.
///
/// # Example (embedded)
///
/// ```text
/// struct IrFaces { /* ring buffers owned by the IR driver */ }
///
/// impl FaceIo for IrFaces {
///     fn has_inbound(&self, face: Face) -> bool { ir::rx_len(face.index()) > 0 }
///     fn read_inbound(&self, face: Face) -> &[u8] { ir::rx_buf(face.index()) }
///     fn consume_inbound(&mut self, face: Face) { ir::rx_release(face.index()) }
///     fn outbound_pending(&self, face: Face) -> bool { ir::tx_busy(face.index()) }
///     fn send(&mut self, face: Face, frame: &[u8]) -> bool { ir::tx(face.index(), frame) }
///     fn is_expired(&self, face: Face) -> bool { ir::silent_for_ms(face.index()) > 200 }
/// }
/// ```
pub trait FaceIo {
    /// Is a datagram waiting in the inbound slot?
    fn has_inbound(&self, face: Face) -> bool;

    /// Bytes of the waiting datagram. Only called when `has_inbound` is true.
    fn read_inbound(&self, face: Face) -> &[u8];

    /// Free the inbound slot.
    fn consume_inbound(&mut self, face: Face);

    /// Is the outbound slot still occupied by an earlier send?
    fn outbound_pending(&self, face: Face) -> bool;

    /// Place `frame` in the outbound slot. False if the slot is occupied.
    fn send(&mut self, face: Face, frame: &[u8]) -> bool;

    /// No recent traffic on this face; treat it as disconnected.
    fn is_expired(&self, face: Face) -> bool;
}

/// Application callbacks invoked by the engine.
///
/// Every method has a default, so an implementation only overrides the
/// points it cares about. Hooks run inside `process()`/`send()` and must not
/// call back into the engine.
pub trait Hooks<const N: usize> {
    /// Offered every inbound non-reply message before classification.
    ///
    /// Return true to take ownership of it: the engine then consumes the
    /// datagram without tracking or flooding it.
    fn on_external(&mut self, face: Face, message: &Message<N>) -> bool {
        let _ = (face, message);
        false
    }

    /// A broadcast arrived on `src`.
    ///
    /// `is_loop` is true for a re-delivery of the active epoch. Edits to
    /// `payload` on a new broadcast are seen by `on_forward`.
    fn on_receive(&mut self, id: u8, src: Face, payload: &mut [u8; N], is_loop: bool) {
        let _ = (id, src, payload, is_loop);
    }

    /// A broadcast is about to be sent on `dst`.
    ///
    /// `src` is `None` for a locally originated broadcast. Returns the logical
    /// payload length to send.
    fn on_forward(&mut self, id: u8, src: Option<Face>, dst: Face, payload: &mut [u8; N]) -> usize {
        let _ = (id, src, dst, payload);
        N
    }

    /// A reply arrived on `src`.
    fn on_reply_receive(&mut self, id: u8, src: Face, payload: &[u8; N]) {
        let _ = (id, src, payload);
    }

    /// Every owed reply is in; finalize the aggregate.
    ///
    /// `dst` is the parent face, or `None` when this device originated the
    /// broadcast and the payload becomes the local result. `payload` holds
    /// the last payload seen. Returns the logical payload length.
    fn on_reply_forward(&mut self, id: u8, dst: Option<Face>, payload: &mut [u8; N]) -> usize {
        let _ = (id, dst, payload);
        N
    }
}

/// Hooks that keep every default: pass payloads through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<const N: usize> Hooks<N> for NoHooks {}

impl<const N: usize, H: Hooks<N> + ?Sized> Hooks<N> for &mut H {
    fn on_external(&mut self, face: Face, message: &Message<N>) -> bool {
        (**self).on_external(face, message)
    }

    fn on_receive(&mut self, id: u8, src: Face, payload: &mut [u8; N], is_loop: bool) {
        (**self).on_receive(id, src, payload, is_loop)
    }

    fn on_forward(&mut self, id: u8, src: Option<Face>, dst: Face, payload: &mut [u8; N]) -> usize {
        (**self).on_forward(id, src, dst, payload)
    }

    fn on_reply_receive(&mut self, id: u8, src: Face, payload: &[u8; N]) {
        (**self).on_reply_receive(id, src, payload)
    }

    fn on_reply_forward(&mut self, id: u8, dst: Option<Face>, payload: &mut [u8; N]) -> usize {
        (**self).on_reply_forward(id, dst, payload)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_impls {
    //! Mock implementations of traits for unit testing and doc tests.
    //!
    //! Available when running tests or with the `test-support` feature enabled.

    use super::*;
    use crate::types::{FaceSet, MAX_FACES};
    use crate::wire::Frame;

    /// Single-slot faces held in memory.
    ///
    /// Tests deliver frames with `deliver` and drain what the engine sent with
    /// `take_outbound`, playing the part of the link layer.
    pub struct MockFaces {
        inbound: [Option<Frame>; MAX_FACES],
        outbound: [Option<Frame>; MAX_FACES],
        expired: FaceSet,
        sends: usize,
    }

    impl Default for MockFaces {
        fn default() -> Self {
            Self {
                inbound: [None; MAX_FACES],
                outbound: [None; MAX_FACES],
                expired: FaceSet::new(),
                sends: 0,
            }
        }
    }

    impl MockFaces {
        pub fn new() -> Self {
            Self::default()
        }

        /// Faces in `0..face_count` that are live; the rest are expired.
        pub fn with_live(face_count: u8, live: &[Face]) -> Self {
            let mut faces = Self::new();
            for face in Face::all(face_count) {
                if !live.contains(&face) {
                    faces.expired.mark(face);
                }
            }
            faces
        }

        /// Place raw bytes in a face's inbound slot. False if it is occupied.
        pub fn deliver(&mut self, face: Face, data: &[u8]) -> bool {
            let slot = &mut self.inbound[face.index() as usize];
            if slot.is_some() {
                return false;
            }
            *slot = Some(Frame::from_slice(data));
            true
        }

        /// Encode and deliver a message.
        pub fn deliver_message<const N: usize>(&mut self, face: Face, message: &Message<N>) -> bool {
            self.deliver(face, message.to_frame().as_slice())
        }

        /// Take whatever the engine sent on `face`, freeing the slot.
        pub fn take_outbound(&mut self, face: Face) -> Option<Frame> {
            self.outbound[face.index() as usize].take()
        }

        /// Peek at the outbound slot without freeing it.
        pub fn outbound(&self, face: Face) -> Option<&Frame> {
            self.outbound[face.index() as usize].as_ref()
        }

        /// Occupy an outbound slot as if an earlier send were still in flight.
        pub fn block_outbound(&mut self, face: Face) {
            self.outbound[face.index() as usize] = Some(Frame::new());
        }

        pub fn set_expired(&mut self, face: Face, expired: bool) {
            if expired {
                self.expired.mark(face);
            } else {
                self.expired.clear(face);
            }
        }

        /// Total successful sends.
        pub fn sends(&self) -> usize {
            self.sends
        }
    }

    impl FaceIo for MockFaces {
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
            self.sends += 1;
            true
        }

        fn is_expired(&self, face: Face) -> bool {
            self.expired.contains(face)
        }
    }
}
