//! Per-player event channel
//!
//! The host's stream handler: `listen` attaches a delegate to the player's
//! sink, `cancel` detaches it. Closing the channel ends the stream for good.

use crate::sink::{EventDelegate, QueuingEventSink};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct EventChannel {
    name: String,
    sink: Arc<QueuingEventSink>,
}

impl EventChannel {
    pub fn new(name: impl Into<String>, sink: Arc<QueuingEventSink>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink(&self) -> &Arc<QueuingEventSink> {
        &self.sink
    }

    /// Attach a listener; anything queued so far is replayed to it first
    pub fn listen(&self, delegate: Arc<dyn EventDelegate>) {
        debug!(channel = %self.name, pending = self.sink.pending(), "Listener attached");
        self.sink.set_delegate(Some(delegate));
    }

    /// Detach the listener; later events queue until the next `listen`
    pub fn cancel(&self) {
        debug!(channel = %self.name, "Listener cancelled");
        self.sink.set_delegate(None);
    }

    pub fn is_listening(&self) -> bool {
        self.sink.has_delegate()
    }

    /// End the stream. The handler is detached once the end marker reaches it.
    pub fn close(&self) {
        self.sink.end_of_stream();
        debug!(channel = %self.name, "Event channel closed");
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("listening", &self.is_listening())
            .field("pending", &self.sink.pending())
            .finish()
    }
}
