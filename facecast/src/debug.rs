//! Debug events for protocol tracing.
//!
//! Enabled in test builds and with the `debug` feature. Events are pushed
//! into a bounded channel on the engine; a test harness or simulator drains
//! it with `try_receive`. When the channel is full new events are dropped.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::types::{Face, FaceSet};
use crate::wire::DecodeError;

/// Queue size for the debug channel.
pub const DEBUG_QUEUE_SIZE: usize = 64;

/// Channel carrying debug events out of the engine.
pub type DebugChannel = Channel<CriticalSectionRawMutex, DebugEvent, DEBUG_QUEUE_SIZE>;

/// Emit a debug event from inside the engine.
///
/// Compiles to nothing unless tracing is enabled; the event expression is
/// not evaluated in that case.
macro_rules! emit_debug {
    ($engine:expr, $event:expr) => {{
        #[cfg(any(test, feature = "debug"))]
        {
            let _ = $engine.debug_channel().try_send($event);
        }
    }};
}

/// Debug events emitted by the engine for protocol tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugEvent {
    /// A new epoch was accepted and flooded.
    BroadcastStarted {
        id: u8,
        sequence: u8,
        src: Option<Face>,
        targets: FaceSet,
        fire_and_forget: bool,
    },
    /// `send` refused because replies are still owed.
    SendBusy { id: u8, outstanding: FaceSet },
    /// Inbound datagram left in place for a later tick.
    Deferred {
        face: Option<Face>,
        reason: &'static str,
    },
    /// Re-delivery of the active epoch.
    LoopDetected {
        id: u8,
        sequence: u8,
        face: Face,
        was_owed: bool,
    },
    /// Late-propagation echo sent back to a waiting neighbour.
    EchoSent { id: u8, sequence: u8, face: Face },
    /// A reply we were waiting on arrived.
    ReplyReceived {
        id: u8,
        face: Face,
        remaining: FaceSet,
    },
    /// Reply arrived on a face that owed us nothing.
    StaleReplyDropped { id: u8, face: Face },
    /// Aggregated reply sent to the parent face.
    ReplySent { id: u8, parent: Face },
    /// Aggregated result produced for a local broadcast.
    ResultReady { id: u8, sequence: u8 },
    /// Reset flooded; local broadcast state cleared.
    ResetApplied { sequence: u8 },
    /// Hook `on_external` took the message.
    ExternalConsumed { id: u8, face: Face },
    /// Datagram failed to decode and was dropped.
    MalformedDropped { face: Face, error: DecodeError },
    /// Adapter refused a send the feasibility check allowed.
    SendFailed { face: Face },
}
