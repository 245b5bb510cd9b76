//! Engine shared between an application loop and interrupt-driven code.
//!
//! The link driver typically lives in an interrupt handler or another task
//! while the application calls `send`. Wrapping the engine in a blocking
//! mutex keeps every entry point serialized without an allocator.
//!
//! ```ignore
//! let engine: SharedBroadcast<CriticalSectionRawMutex, IrFaces, App> =
//!     SharedBroadcast::new(Broadcast::new(IrFaces::new(), App::new()));
//!
//! // IR receive interrupt
//! engine.lock(|e| e.faces_mut().on_rx(face, frame));
//! // main loop
//! engine.process();
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::broadcast::Broadcast;
use crate::config::{BroadcastConfig, DefaultConfig};
use crate::traits::{FaceIo, Hooks};
use crate::types::DEFAULT_PAYLOAD_BYTES;
use crate::wire::Message;

/// [`Broadcast`] behind an embassy blocking mutex.
pub struct SharedBroadcast<M, F, H, C = DefaultConfig, const N: usize = DEFAULT_PAYLOAD_BYTES>
where
    M: RawMutex,
{
    inner: Mutex<M, RefCell<Broadcast<F, H, C, N>>>,
}

impl<M, F, H, C, const N: usize> SharedBroadcast<M, F, H, C, N>
where
    M: RawMutex,
    F: FaceIo,
    H: Hooks<N>,
    C: BroadcastConfig,
{
    pub const fn new(engine: Broadcast<F, H, C, N>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(engine)),
        }
    }

    /// See [`Broadcast::send`].
    pub fn send(&self, message: Message<N>) -> bool {
        self.lock(|engine| engine.send(message))
    }

    /// See [`Broadcast::process`].
    pub fn process(&self) {
        self.lock(|engine| engine.process())
    }

    /// See [`Broadcast::receive`].
    pub fn receive(&self) -> Option<Message<N>> {
        self.lock(|engine| engine.receive())
    }

    pub fn is_processing(&self) -> bool {
        self.lock(|engine| engine.is_processing())
    }

    /// Run `f` with exclusive access to the engine.
    ///
    /// `f` must not re-enter this `SharedBroadcast`; the inner `RefCell`
    /// panics on a nested borrow.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Broadcast<F, H, C, N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn into_inner(self) -> Broadcast<F, H, C, N> {
        self.inner.into_inner().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::test_impls::MockFaces;
    use crate::traits::NoHooks;
    use crate::types::Face;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};

    type Msg = Message<DEFAULT_PAYLOAD_BYTES>;

    fn face(i: u8) -> Face {
        Face::new(i).unwrap()
    }

    #[test]
    fn test_shared_round_trip() {
        let faces = MockFaces::with_live(DefaultConfig::FACE_COUNT, &[face(0)]);
        let shared: SharedBroadcast<CriticalSectionRawMutex, _, _> =
            SharedBroadcast::new(Broadcast::new(faces, NoHooks));

        assert!(shared.send(Msg::new(1, false)));
        assert!(shared.is_processing());
        assert!(!shared.send(Msg::new(1, false)));

        // Link layer side: move the frame and hand back a reply
        shared.lock(|engine| {
            let frame = engine.faces_mut().take_outbound(face(0)).unwrap();
            let mut reply = Msg::decode(frame.as_slice()).unwrap();
            reply.header.is_reply = true;
            engine.faces_mut().deliver_message(face(0), &reply);
        });

        shared.process();
        let result = shared.receive().unwrap();
        assert_eq!(result.header.sequence, 1);
        assert!(!shared.is_processing());
        assert!(shared.receive().is_none());
    }

    #[test]
    fn test_shared_into_inner() {
        let shared: SharedBroadcast<NoopRawMutex, _, _> =
            SharedBroadcast::new(Broadcast::new(MockFaces::new(), NoHooks));
        assert!(shared.send(Msg::new(2, true)));

        let engine = shared.into_inner();
        assert_eq!(engine.metrics().originated, 1);
        assert_eq!(engine.faces().sends(), DefaultConfig::FACE_COUNT as usize);
    }
}
