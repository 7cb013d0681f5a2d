//! Shared helpers for unit tests

use crate::{
    error::ChannelError,
    event::{PlayerEvent, SinkMessage},
    sink::EventDelegate,
};
use std::sync::Mutex;

/// Delegate that records everything delivered to it
#[derive(Default)]
pub struct RecordingDelegate {
    seen: Mutex<Vec<SinkMessage>>,
}

impl RecordingDelegate {
    pub fn take(&self) -> Vec<SinkMessage> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn push(&self, message: SinkMessage) {
        self.seen.lock().unwrap().push(message);
    }
}

impl EventDelegate for RecordingDelegate {
    fn success(&self, event: PlayerEvent) {
        self.push(SinkMessage::Event(event));
    }

    fn error(&self, error: ChannelError) {
        self.push(SinkMessage::Error(error));
    }

    fn end_of_stream(&self) {
        self.push(SinkMessage::EndOfStream);
    }
}
