//! Broadcast engine - the flood/convergecast state machine.
//!
//! One engine runs per device. It is driven by the application loop:
//!
//! ```ignore
//! let mut engine = Broadcast::<_, _, DefaultConfig>::new(faces, hooks);
//!
//! loop {
//!     link.poll();
//!     engine.process();
//!     if let Some(result) = engine.receive() {
//!         // aggregated reply to a broadcast we originated
//!     }
//!     if button_pressed() {
//!         engine.send(Message::new(QUERY, false));
//!     }
//! }
//! ```
//!
//! # State machine
//!
//! ```text
//! Idle --send / new tracked broadcast--> AwaitingReplies(parent_face, sent_faces)
//! AwaitingReplies --reply or same-epoch re-delivery on f--> clear f
//! any --same epoch on a face it never crossed--> echo once on that face
//! AwaitingReplies --last face cleared--> reply to parent (or local result) --> Idle
//! any --reset message--> Idle
//! ```
//!
//! There is no queue behind the faces. Every step that has to send checks
//! beforehand that the destination slots are free; if not, the inbound
//! datagram is left where it is and retried on the next `process()`. Nothing
//! is sent partially and nothing is dropped for lack of buffer space.

use core::marker::PhantomData;

use crate::config::{AssertConfig, BroadcastConfig, DefaultConfig};
#[cfg(any(test, feature = "debug"))]
use crate::debug::{DebugChannel, DebugEvent};
use crate::traits::{FaceIo, Hooks};
use crate::tracker::Tracker;
use crate::types::{BroadcastMetrics, Face, FaceSet, DEFAULT_PAYLOAD_BYTES};
use crate::wire::{Header, Message};

/// Flood/convergecast engine for one device.
///
/// Generic over:
/// - `F`: face adapter (link layer)
/// - `H`: application hooks
/// - `C`: compile-time device configuration
/// - `N`: payload capacity in bytes
pub struct Broadcast<F, H, C = DefaultConfig, const N: usize = DEFAULT_PAYLOAD_BYTES> {
    // Dependencies (injected)
    faces: F,
    hooks: H,

    // Convergecast state
    parent_face: Option<Face>,
    sent_faces: FaceSet,
    tracker: Tracker,
    // Faces the current epoch has crossed, in either direction
    crossed_faces: FaceSet,

    // Valid until the next process()
    result: Option<Message<N>>,

    metrics: BroadcastMetrics,

    #[cfg(any(test, feature = "debug"))]
    debug: DebugChannel,

    _config: PhantomData<C>,
}

impl<F, H, C, const N: usize> Broadcast<F, H, C, N>
where
    F: FaceIo,
    H: Hooks<N>,
    C: BroadcastConfig,
{
    /// Create an idle engine.
    pub fn new(faces: F, hooks: H) -> Self {
        let () = AssertConfig::<C>::VALID;
        let () = Message::<N>::FITS;

        Self {
            faces,
            hooks,
            parent_face: None,
            sent_faces: FaceSet::new(),
            tracker: Tracker::new(),
            crossed_faces: FaceSet::new(),
            result: None,
            metrics: BroadcastMetrics::new(),
            #[cfg(any(test, feature = "debug"))]
            debug: DebugChannel::new(),
            _config: PhantomData,
        }
    }

    /// Originate a broadcast.
    ///
    /// The engine assigns the sequence number and clears `is_reply`. Returns
    /// false without side effects if replies are still owed for an earlier
    /// broadcast or if a face we would flood to is busy this tick.
    ///
    /// A tracked broadcast from a device with no live faces resolves at once;
    /// its result is available from `receive()` until the next `process()`.
    pub fn send(&mut self, mut message: Message<N>) -> bool {
        if !self.sent_faces.is_empty() {
            emit_debug!(
                self,
                DebugEvent::SendBusy {
                    id: message.header.id,
                    outstanding: self.sent_faces,
                }
            );
            return false;
        }

        message.header.is_reply = false;
        if self.would_broadcast_fail(None, &message.header) {
            emit_debug!(
                self,
                DebugEvent::Deferred {
                    face: None,
                    reason: "send: flood target busy",
                }
            );
            return false;
        }

        message.header.sequence = self.tracker.next_sequence();
        self.metrics.originated += 1;
        self.accept_and_flood(None, &mut message);

        if self.tracks_replies(&message.header) {
            self.maybe_finish(message);
        }
        true
    }

    /// Run one tick: handle every waiting inbound datagram.
    ///
    /// Clears the previous tick's result first.
    pub fn process(&mut self) {
        self.result = None;

        for face in Face::all(C::FACE_COUNT) {
            if !self.faces.has_inbound(face) {
                continue;
            }

            let message = match Message::<N>::decode(self.faces.read_inbound(face)) {
                Ok(message) => message,
                Err(error) => {
                    // Dropped, but the slot is still freed.
                    self.metrics.malformed += 1;
                    emit_debug!(self, DebugEvent::MalformedDropped { face, error });
                    self.faces.consume_inbound(face);
                    continue;
                }
            };

            let consumed = if message.header.is_reply {
                self.handle_reply(face, message)
            } else if self.hooks.on_external(face, &message) {
                emit_debug!(
                    self,
                    DebugEvent::ExternalConsumed {
                        id: message.header.id,
                        face,
                    }
                );
                true
            } else {
                self.handle_message(face, message)
            };

            if consumed {
                self.faces.consume_inbound(face);
            } else {
                self.metrics.deferred += 1;
            }
        }
    }

    /// Take the aggregated result produced during this tick, if any.
    ///
    /// Returns it at most once.
    pub fn receive(&mut self) -> Option<Message<N>> {
        self.result.take()
    }

    /// True while replies are still owed for the current broadcast.
    pub fn is_processing(&self) -> bool {
        !self.sent_faces.is_empty()
    }

    /// Face the current tracked broadcast arrived on, if any.
    pub fn parent_face(&self) -> Option<Face> {
        self.parent_face
    }

    /// Faces that still owe a reply.
    pub fn sent_faces(&self) -> FaceSet {
        self.sent_faces
    }

    /// Active epoch tracker.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Counters for monitoring.
    pub fn metrics(&self) -> &BroadcastMetrics {
        &self.metrics
    }

    /// Face adapter.
    pub fn faces(&self) -> &F {
        &self.faces
    }

    /// Face adapter, for the link layer to move frames.
    pub fn faces_mut(&mut self) -> &mut F {
        &mut self.faces
    }

    /// Application hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Application hooks, mutably.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Debug event channel (test builds and `debug` feature).
    #[cfg(any(test, feature = "debug"))]
    pub fn debug_channel(&self) -> &DebugChannel {
        &self.debug
    }

    /// Tear the engine down into its collaborators.
    pub fn into_parts(self) -> (F, H) {
        (self.faces, self.hooks)
    }

    // ------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------

    /// Reply path: a neighbour we flooded to reports back.
    fn handle_reply(&mut self, face: Face, reply: Message<N>) -> bool {
        if !self.sent_faces.contains(face) {
            self.metrics.stale_replies += 1;
            emit_debug!(
                self,
                DebugEvent::StaleReplyDropped {
                    id: reply.header.id,
                    face,
                }
            );
            return true;
        }

        if self.would_forward_reply_fail(face) {
            emit_debug!(
                self,
                DebugEvent::Deferred {
                    face: Some(face),
                    reason: "reply: parent face busy",
                }
            );
            return false;
        }

        self.sent_faces.clear(face);
        self.metrics.replies_received += 1;
        self.hooks
            .on_reply_receive(reply.header.id, face, reply.payload_buf());
        emit_debug!(
            self,
            DebugEvent::ReplyReceived {
                id: reply.header.id,
                face,
                remaining: self.sent_faces,
            }
        );

        self.maybe_finish(reply);
        true
    }

    /// Forward path: a broadcast arrived on `face`.
    fn handle_message(&mut self, face: Face, mut message: Message<N>) -> bool {
        let header = message.header;
        let tracked = self.tracks_replies(&header);

        let finish = if self.tracker.is_current(&header) {
            let was_owed = self.sent_faces.contains(face);

            if tracked && was_owed {
                // The neighbour got this epoch elsewhere and will not reply.
                if self.would_forward_reply_fail(face) {
                    emit_debug!(
                        self,
                        DebugEvent::Deferred {
                            face: Some(face),
                            reason: "loop: parent face busy",
                        }
                    );
                    return false;
                }
                self.sent_faces.clear(face);
            } else if tracked
                && !self.crossed_faces.contains(face)
                && !self.echo(face, &message)
            {
                emit_debug!(
                    self,
                    DebugEvent::Deferred {
                        face: Some(face),
                        reason: "echo: face busy",
                    }
                );
                return false;
            }

            self.metrics.loops += 1;
            emit_debug!(
                self,
                DebugEvent::LoopDetected {
                    id: header.id,
                    sequence: header.sequence,
                    face,
                    was_owed,
                }
            );
            self.hooks
                .on_receive(header.id, face, message.payload_buf_mut(), true);

            tracked && was_owed
        } else {
            if self.would_broadcast_fail(Some(face), &header) {
                emit_debug!(
                    self,
                    DebugEvent::Deferred {
                        face: Some(face),
                        reason: "flood: target busy",
                    }
                );
                return false;
            }
            self.metrics.received += 1;
            self.accept_and_flood(Some(face), &mut message);
            tracked
        };

        if finish {
            self.maybe_finish(message);
        }
        true
    }

    // ------------------------------------------------------------------
    // Feasibility
    // ------------------------------------------------------------------

    /// The one primitive every feasibility check is built on.
    fn can_send(&self, face: Face) -> bool {
        !self.faces.outbound_pending(face)
    }

    /// Live faces a flood from `src` goes out on.
    fn flood_targets(&self, src: Option<Face>) -> FaceSet {
        Face::all(C::FACE_COUNT)
            .filter(|&face| Some(face) != src && !self.faces.is_expired(face))
            .collect()
    }

    /// Would flooding this message leave a send undone?
    fn would_broadcast_fail(&self, src: Option<Face>, header: &Header) -> bool {
        let targets = self.flood_targets(src);
        if targets.iter().any(|face| !self.can_send(face)) {
            return true;
        }

        // A tracked flood reaching no one replies to its parent immediately.
        match src {
            Some(parent) if targets.is_empty() && self.tracks_replies(header) => {
                self.sent_faces.is_empty() && !self.can_send(parent)
            }
            _ => false,
        }
    }

    /// Would clearing `face` complete the aggregate with the parent face busy?
    fn would_forward_reply_fail(&self, face: Face) -> bool {
        self.sent_faces.without(face).is_empty()
            && self.parent_face.is_some_and(|parent| !self.can_send(parent))
    }

    fn tracks_replies(&self, header: &Header) -> bool {
        !header.is_fire_and_forget && header.id != C::RESET_MESSAGE_ID
    }

    // ------------------------------------------------------------------
    // Actions (feasibility already checked)
    // ------------------------------------------------------------------

    /// Accept a new epoch and send it on every live face except `src`.
    fn accept_and_flood(&mut self, src: Option<Face>, message: &mut Message<N>) {
        let header = message.header;
        let is_reset = header.id == C::RESET_MESSAGE_ID;

        if is_reset {
            self.tracker.clear();
        }
        // `handle_message` checked `is_current`; `send` uses a fresh sequence.
        let _ = self.tracker.accept(&header);

        self.crossed_faces = FaceSet::new();
        if let Some(face) = src {
            self.crossed_faces.mark(face);
        }

        if let Some(face) = src {
            self.hooks
                .on_receive(header.id, face, message.payload_buf_mut(), false);
        }

        if !header.is_fire_and_forget {
            self.parent_face = src;
        }

        let targets = self.flood_targets(src);
        for dst in targets.iter() {
            let mut forward = *message;
            let len = self
                .hooks
                .on_forward(header.id, src, dst, forward.payload_buf_mut());
            forward.set_len(len);

            if !self.transmit(dst, &forward) {
                continue;
            }
            self.crossed_faces.mark(dst);
            self.metrics.forwarded += 1;
            if !header.is_fire_and_forget {
                self.sent_faces.mark(dst);
            }
        }

        emit_debug!(
            self,
            DebugEvent::BroadcastStarted {
                id: header.id,
                sequence: header.sequence,
                src,
                targets,
                fire_and_forget: header.is_fire_and_forget,
            }
        );

        if is_reset {
            self.sent_faces.clear_all();
            self.parent_face = None;
            emit_debug!(
                self,
                DebugEvent::ResetApplied {
                    sequence: header.sequence,
                }
            );
        }
    }

    /// Send the current epoch back on `face` so its sender stops waiting.
    ///
    /// Only for a face the epoch has not crossed yet, so each face is
    /// echoed at most once per epoch.
    fn echo(&mut self, face: Face, message: &Message<N>) -> bool {
        if !self.can_send(face) {
            return false;
        }
        if self.transmit(face, message) {
            self.crossed_faces.mark(face);
            self.metrics.echoes += 1;
            emit_debug!(
                self,
                DebugEvent::EchoSent {
                    id: message.header.id,
                    sequence: message.header.sequence,
                    face,
                }
            );
        }
        true
    }

    /// If no face owes a reply any more, emit the aggregate.
    fn maybe_finish(&mut self, mut message: Message<N>) {
        if !self.sent_faces.is_empty() {
            return;
        }

        message.header.is_reply = true;
        let parent = self.parent_face.take();
        let len = self
            .hooks
            .on_reply_forward(message.header.id, parent, message.payload_buf_mut());
        message.set_len(len);

        match parent {
            Some(parent) => {
                if self.transmit(parent, &message) {
                    self.metrics.replies_sent += 1;
                    emit_debug!(
                        self,
                        DebugEvent::ReplySent {
                            id: message.header.id,
                            parent,
                        }
                    );
                }
            }
            None => {
                self.metrics.results += 1;
                emit_debug!(
                    self,
                    DebugEvent::ResultReady {
                        id: message.header.id,
                        sequence: message.header.sequence,
                    }
                );
                self.result = Some(message);
            }
        }
    }

    fn transmit(&mut self, face: Face, message: &Message<N>) -> bool {
        let frame = message.to_frame();
        if self.faces.send(face, frame.as_slice()) {
            return true;
        }
        self.metrics.send_failures += 1;
        emit_debug!(self, DebugEvent::SendFailed { face });
        false
    }
}
