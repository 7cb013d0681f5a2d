//! Core types for Kino Bridge

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle identifying one live player to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerHandle(pub i64);

impl PlayerHandle {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl From<i64> for PlayerHandle {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one player instance, used to correlate logs
/// across handle reuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media properties reported by the engine once preparation finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in milliseconds
    pub duration_ms: i64,
    pub width: u32,
    pub height: u32,
}

/// Player adapter state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No source prepared
    Idle,
    /// Source set, waiting for the engine to prepare it
    Preparing,
    /// Prepared and ready to start
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused
    Paused,
    /// Reached end of stream without looping
    Completed,
    /// Engine reported a failure
    Error,
    /// Resources released
    Disposed,
}

impl PlaybackState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlaybackState) -> bool {
        use PlaybackState::*;
        if target == Disposed {
            return *self != Disposed;
        }
        matches!(
            (self, target),
            // From Idle
            (Idle, Preparing) |
            // From Preparing
            (Preparing, Ready) | (Preparing, Error) | (Preparing, Idle) |
            // From Ready
            (Ready, Playing) | (Ready, Error) | (Ready, Idle) |
            // From Playing
            (Playing, Paused) | (Playing, Completed) | (Playing, Error) | (Playing, Idle) |
            // From Paused
            (Paused, Playing) | (Paused, Error) | (Paused, Idle) |
            // From Completed
            (Completed, Playing) | (Completed, Idle) |
            // From Error
            (Error, Idle)
        )
    }

    /// Whether `play` has any effect in this state
    pub fn can_play(&self) -> bool {
        matches!(self, PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Completed)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Preparing => write!(f, "preparing"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Completed => write!(f, "completed"),
            PlaybackState::Error => write!(f, "error"),
            PlaybackState::Disposed => write!(f, "disposed"),
        }
    }
}
