//! Compile-time configuration for face count and reserved message ids.
//!
//! The `BroadcastConfig` trait fixes the shape of a device at compile time.
//! Payload capacity is not part of the trait: it is the const generic `N`
//! carried by [`Message`](crate::wire::Message) and
//! [`Broadcast`](crate::broadcast::Broadcast), because it sizes arrays.
//!
//! # Memory Footprint
//!
//! Engine state is a handful of bytes plus one buffered result:
//!
//! | Item | Bytes |
//! |------|------:|
//! | `sent_faces` + `parent_face` | 6 |
//! | tracker | 4 |
//! | pending result | `HEADER_BYTES + N + 8` |
//! | metrics | 48 |
//!
//! # Example
//!
//! ```ignore
//! use facecast::{Broadcast, DefaultConfig, GridConfig};
//!
//! // Hexagonal tiles, 13 byte payload (16 byte frames)
//! let engine = Broadcast::<_, _, DefaultConfig>::new(faces, hooks);
//!
//! // Square tiles with a larger payload
//! let engine = Broadcast::<_, _, GridConfig, 29>::new(faces, hooks);
//!
//! // Custom configuration
//! struct TriangleConfig;
//! impl BroadcastConfig for TriangleConfig {
//!     const FACE_COUNT: u8 = 3;
//!     const RESET_MESSAGE_ID: u8 = 0xFF;
//! }
//! ```

use crate::types::MAX_FACES;

/// Configuration trait for compile-time device shape.
///
/// `FACE_COUNT` must be in `1..=MAX_FACES`.
pub trait BroadcastConfig {
    /// Number of neighbour links on the device.
    const FACE_COUNT: u8;

    /// Message id that resets broadcast state across the mesh.
    const RESET_MESSAGE_ID: u8;
}

/// Default configuration: hexagonal tiles with six faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfig;

impl BroadcastConfig for DefaultConfig {
    const FACE_COUNT: u8 = 6;
    const RESET_MESSAGE_ID: u8 = 0;
}

/// Square tiles with four faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridConfig;

impl BroadcastConfig for GridConfig {
    const FACE_COUNT: u8 = 4;
    const RESET_MESSAGE_ID: u8 = 0;
}

/// Evaluated when an engine is instantiated; rejects out-of-range face counts.
pub(crate) struct AssertConfig<C>(core::marker::PhantomData<C>);

impl<C: BroadcastConfig> AssertConfig<C> {
    pub(crate) const VALID: () = assert!(
        C::FACE_COUNT > 0 && C::FACE_COUNT as usize <= MAX_FACES,
        "FACE_COUNT must be in 1..=MAX_FACES"
    );
}
