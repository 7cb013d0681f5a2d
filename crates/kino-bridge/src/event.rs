//! Player events relayed to the host

use crate::{error::ChannelError, types::MediaInfo};
use serde::{Deserialize, Serialize};

/// Events pushed on a player's event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlayerEvent {
    /// Source prepared; duration in milliseconds
    Prepared {
        duration: i64,
        width: u32,
        height: u32,
    },

    /// End of stream reached without looping
    Completed,

    /// Buffered ranges as `[start, end]` pairs
    BufferingUpdate {
        values: Vec<[i64; 2]>,
    },
}

impl PlayerEvent {
    pub fn prepared(info: MediaInfo) -> Self {
        PlayerEvent::Prepared {
            duration: info.duration_ms,
            width: info.width,
            height: info.height,
        }
    }

    /// The engine only reports a single percentage, so the event carries one
    /// `[0, percent]` range in the multi-range shape other platforms emit.
    pub fn buffering(percent: i32) -> Self {
        let percent = i64::from(percent.clamp(0, 100));
        PlayerEvent::BufferingUpdate {
            values: vec![[0, percent]],
        }
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Prepared { .. } => "prepared",
            PlayerEvent::Completed => "completed",
            PlayerEvent::BufferingUpdate { .. } => "bufferingUpdate",
        }
    }
}

/// Anything that can travel through an event sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkMessage {
    Event(PlayerEvent),
    Error(ChannelError),
    EndOfStream,
}

impl SinkMessage {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SinkMessage::EndOfStream)
    }
}

impl From<PlayerEvent> for SinkMessage {
    fn from(event: PlayerEvent) -> Self {
        SinkMessage::Event(event)
    }
}

impl From<ChannelError> for SinkMessage {
    fn from(error: ChannelError) -> Self {
        SinkMessage::Error(error)
    }
}
