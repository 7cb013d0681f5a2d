//! Queuing event sink
//!
//! Engine callbacks push into a [`QueuingEventSink`] from their own threads.
//! Until a host delegate is attached, messages wait in a FIFO queue; attaching
//! a delegate replays the queue in order and later messages go straight
//! through. Delivered messages are popped, so a later delegate never sees
//! them again.
//!
//! Delegates are called without the sink lock held. One thread at a time
//! drains the queue; a producer that finds a drain in progress only queues,
//! and the draining thread picks its message up.

use crate::{
    error::ChannelError,
    event::{PlayerEvent, SinkMessage},
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

/// Host-side listener for one event stream.
///
/// Called from whichever thread produced or replayed the message, with no
/// bridge lock held, so implementations may call back into the plugin.
pub trait EventDelegate: Send + Sync {
    fn success(&self, event: PlayerEvent);
    fn error(&self, error: ChannelError);
    fn end_of_stream(&self);
}

struct SinkState {
    delegate: Option<Arc<dyn EventDelegate>>,
    queue: VecDeque<SinkMessage>,
    done: bool,
    /// Some thread is handing queued messages to the delegate
    draining: bool,
}

/// Event sink that buffers messages while no delegate is attached
pub struct QueuingEventSink {
    state: Mutex<SinkState>,
}

impl QueuingEventSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SinkState {
                delegate: None,
                queue: VecDeque::new(),
                done: false,
                draining: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the delegate. Attaching replays everything queued so far.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn EventDelegate>>) {
        let mut state = self.lock();
        state.delegate = delegate;
        self.drain(state);
    }

    pub fn success(&self, event: PlayerEvent) {
        self.enqueue(SinkMessage::Event(event));
    }

    pub fn error(&self, error: ChannelError) {
        self.enqueue(SinkMessage::Error(error));
    }

    /// Terminate the stream; everything produced afterwards is dropped.
    /// The delegate is detached once it has seen the end marker.
    pub fn end_of_stream(&self) {
        self.enqueue(SinkMessage::EndOfStream);
    }

    fn enqueue(&self, message: SinkMessage) {
        let mut state = self.lock();
        if state.done {
            trace!(?message, "Dropping message after end of stream");
            return;
        }
        if message.is_end_of_stream() {
            state.done = true;
        }
        state.queue.push_back(message);
        self.drain(state);
    }

    /// Hand queued messages to the delegate one by one, releasing the lock
    /// around every call.
    fn drain<'a>(&'a self, mut state: MutexGuard<'a, SinkState>) {
        if state.draining {
            return;
        }
        state.draining = true;
        loop {
            let Some(delegate) = state.delegate.clone() else {
                break;
            };
            let Some(message) = state.queue.pop_front() else {
                break;
            };
            if message.is_end_of_stream() {
                state.delegate = None;
            }
            drop(state);

            match message {
                SinkMessage::Event(event) => delegate.success(event),
                SinkMessage::Error(error) => delegate.error(error),
                SinkMessage::EndOfStream => delegate.end_of_stream(),
            }

            state = self.lock();
        }
        state.draining = false;
    }

    /// Number of messages waiting for a delegate
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn has_delegate(&self) -> bool {
        self.lock().delegate.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.lock().done
    }
}

impl Default for QueuingEventSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Delegate forwarding every message into an unbounded tokio channel, so the
/// host can drain events from async code.
pub struct ChannelDelegate {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelDelegate {
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, message: SinkMessage) {
        // Receiver gone means the host stopped listening.
        let _ = self.tx.send(message);
    }
}

impl EventDelegate for ChannelDelegate {
    fn success(&self, event: PlayerEvent) {
        self.send(SinkMessage::Event(event));
    }

    fn error(&self, error: ChannelError) {
        self.send(SinkMessage::Error(error));
    }

    fn end_of_stream(&self) {
        self.send(SinkMessage::EndOfStream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingDelegate;

    fn buffering(p: i32) -> SinkMessage {
        SinkMessage::Event(PlayerEvent::buffering(p))
    }

    #[test]
    fn test_queues_until_delegate_attached() {
        let sink = QueuingEventSink::new();
        sink.success(PlayerEvent::buffering(10));
        sink.success(PlayerEvent::buffering(20));
        sink.error(ChannelError::new("VideoError", "boom"));
        assert_eq!(sink.pending(), 3);

        let recorder = Arc::new(RecordingDelegate::default());
        sink.set_delegate(Some(recorder.clone()));
        assert_eq!(sink.pending(), 0);

        sink.success(PlayerEvent::Completed);

        assert_eq!(
            recorder.take(),
            vec![
                buffering(10),
                buffering(20),
                SinkMessage::Error(ChannelError::new("VideoError", "boom")),
                SinkMessage::Event(PlayerEvent::Completed),
            ]
        );
    }

    #[test]
    fn test_reattach_never_redelivers() {
        let sink = QueuingEventSink::new();
        let first = Arc::new(RecordingDelegate::default());
        sink.set_delegate(Some(first.clone()));
        sink.success(PlayerEvent::buffering(5));

        sink.set_delegate(None);
        sink.success(PlayerEvent::buffering(50));
        assert_eq!(sink.pending(), 1);

        let second = Arc::new(RecordingDelegate::default());
        sink.set_delegate(Some(second.clone()));

        assert_eq!(first.take(), vec![buffering(5)]);
        assert_eq!(second.take(), vec![buffering(50)]);
    }

    #[test]
    fn test_end_of_stream_discards_later_messages() {
        let sink = QueuingEventSink::new();
        let recorder = Arc::new(RecordingDelegate::default());
        sink.set_delegate(Some(recorder.clone()));

        sink.end_of_stream();
        sink.success(PlayerEvent::Completed);
        sink.end_of_stream();

        assert!(sink.is_done());
        assert_eq!(recorder.take(), vec![SinkMessage::EndOfStream]);
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let sink = Arc::new(QueuingEventSink::new());
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for p in 0..250 {
                        sink.success(PlayerEvent::buffering(p % 101));
                    }
                })
            })
            .collect();

        let recorder = Arc::new(RecordingDelegate::default());
        sink.set_delegate(Some(recorder.clone()));
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(recorder.take().len(), 1000);
        assert_eq!(sink.pending(), 0);
    }

    /// Delegate that feeds every event it sees back into its own sink
    struct EchoDelegate {
        sink: Arc<QueuingEventSink>,
        seen: Mutex<Vec<SinkMessage>>,
    }

    impl EventDelegate for EchoDelegate {
        fn success(&self, event: PlayerEvent) {
            if event == PlayerEvent::Completed {
                self.sink.success(PlayerEvent::buffering(100));
            }
            self.seen.lock().unwrap().push(SinkMessage::Event(event));
        }

        fn error(&self, error: ChannelError) {
            self.seen.lock().unwrap().push(SinkMessage::Error(error));
        }

        fn end_of_stream(&self) {
            self.seen.lock().unwrap().push(SinkMessage::EndOfStream);
        }
    }

    #[test]
    fn test_delegate_may_reenter_the_sink() {
        let sink = Arc::new(QueuingEventSink::new());
        sink.success(PlayerEvent::Completed);
        sink.success(PlayerEvent::buffering(1));

        let echo = Arc::new(EchoDelegate {
            sink: sink.clone(),
            seen: Mutex::new(Vec::new()),
        });
        sink.set_delegate(Some(echo.clone()));

        // The echoed message queues behind the replay instead of jumping it
        assert_eq!(
            *echo.seen.lock().unwrap(),
            vec![
                SinkMessage::Event(PlayerEvent::Completed),
                buffering(1),
                buffering(100),
            ]
        );
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn test_end_of_stream_detaches_delegate() {
        let sink = QueuingEventSink::new();
        let recorder = Arc::new(RecordingDelegate::default());
        sink.set_delegate(Some(recorder.clone()));
        sink.end_of_stream();

        assert!(!sink.has_delegate());
        assert_eq!(recorder.take(), vec![SinkMessage::EndOfStream]);
    }

    #[tokio::test]
    async fn test_channel_delegate_forwards_in_order() {
        let sink = QueuingEventSink::new();
        sink.success(PlayerEvent::buffering(1));

        let (delegate, mut rx) = ChannelDelegate::channel();
        sink.set_delegate(Some(delegate));
        sink.success(PlayerEvent::Completed);
        sink.end_of_stream();

        assert_eq!(rx.recv().await, Some(buffering(1)));
        assert_eq!(rx.recv().await, Some(SinkMessage::Event(PlayerEvent::Completed)));
        assert_eq!(rx.recv().await, Some(SinkMessage::EndOfStream));
    }
}
