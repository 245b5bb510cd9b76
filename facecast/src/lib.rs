#![forbid(unsafe_code)]
//! facecast - Flood broadcast and convergecast over fixed device faces
//!
//! A protocol for tiles or modules that talk to their physical neighbours
//! through a fixed set of faces (IR windows, edge connectors, UART pairs).
//! Any device can flood a message through the whole connected mesh and, unless
//! it is fire-and-forget, collect one aggregated reply built hop by hop on the
//! way back.
//!
//! This crate is `no_std` and allocation free. Every face carries at most one
//! inbound and one outbound datagram at a time; the engine never queues.
//!
//! # Key Properties
//!
//! - Floods reach every device connected through live faces
//! - Each device forwards a given broadcast at most once, so cycles terminate
//! - The reverse flood forms a spanning tree; replies are merged along it
//! - Work that cannot be sent this tick is deferred, never dropped or split
//! - A reserved reset message clears stuck state network-wide
//! - Application logic plugs in through [`Hooks`](traits::Hooks)
//!
//! # Example (basic usage)
//!
//! ```
//! use facecast::{Broadcast, DefaultConfig, FaceIo, Face, Message, NoHooks};
//!
//! /// A device with nothing attached.
//! struct Unplugged;
//!
//! impl FaceIo for Unplugged {
//!     fn has_inbound(&self, _: Face) -> bool { false }
//!     fn read_inbound(&self, _: Face) -> &[u8] { &[] }
//!     fn consume_inbound(&mut self, _: Face) {}
//!     fn outbound_pending(&self, _: Face) -> bool { false }
//!     fn send(&mut self, _: Face, _: &[u8]) -> bool { false }
//!     fn is_expired(&self, _: Face) -> bool { true }
//! }
//!
//! let mut engine = Broadcast::<_, _, DefaultConfig>::new(Unplugged, NoHooks);
//!
//! // With no neighbours a query answers itself
//! assert!(engine.send(Message::with_payload(1, false, &[7]).unwrap()));
//! let result = engine.receive().unwrap();
//! assert!(result.header.is_reply);
//! assert_eq!(result.payload()[0], 7);
//! ```
//!
//! # Example (integration pattern)
//!
//! ```text
//! use facecast::{Broadcast, Hooks, Message};
//!
//! // Implement FaceIo for your link driver and Hooks for your application...
//!
//! // let mut engine = Broadcast::<_, _, GridConfig>::new(faces, hooks);
//! //
//! // loop {
//! //     engine.process();
//! //     if let Some(total) = engine.receive() { show(total.payload()) }
//! //     if pressed() { engine.send(Message::new(COUNT, false)); }
//! // }
//! ```
//!
//! # Module Structure
//!
//! - [`types`] - Core types (Face, FaceSet, BroadcastMetrics)
//! - [`wire`] - Frame layout, Message, encode/decode
//! - [`tracker`] - Active epoch and sequence numbers
//! - [`traits`] - FaceIo and Hooks traits
//! - [`broadcast`] - Broadcast engine and public API
//! - [`shared`] - Engine behind a blocking mutex
//! - [`debug`] - Protocol tracing events
//! - [`config`] - Compile-time device configuration

#![cfg_attr(not(test), no_std)]

// Prevent test/debug features from being used in release builds.
#[cfg(all(feature = "test-support", not(test), not(debug_assertions)))]
compile_error!(
    "The `test-support` feature must not be enabled in release builds. \
     It includes in-memory face mocks intended only for tests."
);

#[cfg(all(feature = "debug", not(test), not(debug_assertions)))]
compile_error!(
    "The `debug` feature must not be enabled in release builds. \
     It adds protocol tracing overhead intended only for development and simulation."
);

pub mod config;
#[macro_use]
pub mod debug;
pub mod broadcast;
pub mod shared;
pub mod tracker;
pub mod traits;
pub mod types;
pub mod wire;

// Re-export main types at crate root
pub use broadcast::Broadcast;
pub use config::{BroadcastConfig, DefaultConfig, GridConfig};
pub use debug::DebugEvent;
pub use shared::SharedBroadcast;
pub use tracker::Tracker;
pub use traits::{FaceIo, Hooks, NoHooks};
pub use types::{BroadcastMetrics, Face, FaceSet, DEFAULT_PAYLOAD_BYTES, MAX_FACES};
pub use wire::{DecodeError, EncodeError, Frame, Header, Message};
