//! Kino Bridge - Platform channel bridge for Kino video players
//!
//! This crate sits between a host UI framework and a native media engine:
//! - Method channel decoding and replies
//! - Opaque handle registry for player instances
//! - Native player adaptation with a playback state machine
//! - Queued event relay that buffers until the host listens
//! - Render surface bookkeeping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kino Bridge                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   host ──MethodCall──▶ ┌──────────────┐ ──MethodReply──▶ host   │
//! │                        │    Plugin    │                         │
//! │                        └──────┬───────┘                         │
//! │                               │                                 │
//! │  ┌──────────────┐      ┌──────┴───────┐      ┌──────────────┐   │
//! │  │   Surface    │◀─────│   Registry   │─────▶│    Media     │   │
//! │  │   Provider   │      │ handle→player│      │    Engine    │   │
//! │  └──────────────┘      └──────┬───────┘      └──────┬───────┘   │
//! │                               │                     │           │
//! │                        ┌──────┴───────┐   callbacks │           │
//! │                        │ VideoPlayer  │◀────────────┘           │
//! │                        └──────┬───────┘                         │
//! │                               │                                 │
//! │                        ┌──────┴───────┐                         │
//! │   host ◀──events────── │ Queuing Sink │                         │
//! │                        └──────────────┘                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod player;
pub mod plugin;
pub mod registry;
pub mod sink;
pub mod surface;
pub mod types;

#[cfg(test)]
mod test_support;

pub use channel::EventChannel;
pub use codec::{Command, MethodCall, MethodReply, PlayerCommand};
pub use config::BridgeConfig;
pub use engine::{DataSource, EngineListener, MediaEngine, NativePlayer, SimulatedConfig, SimulatedEngine};
pub use error::{ChannelError, Error, Result};
pub use event::{PlayerEvent, SinkMessage};
pub use player::VideoPlayer;
pub use plugin::VideoPlayerPlugin;
pub use registry::PlayerRegistry;
pub use sink::{ChannelDelegate, EventDelegate, QueuingEventSink};
pub use surface::{Surface, SurfaceEntry, SurfaceProvider, SurfaceTextureRegistry};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the bridge library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Bridge initialized");
}
