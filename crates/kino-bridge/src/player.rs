//! Player adapter
//!
//! Wraps one native player:
//! - Forwards host commands to the engine
//! - Tracks the playback state machine
//! - Relays engine callbacks onto the player's event channel
//!
//! Every source opened gets a new generation and a fresh engine listener.
//! Callbacks carrying an older generation are dropped.

use crate::{
    channel::EventChannel,
    codec::PlayerCommand,
    config::BridgeConfig,
    engine::{DataSource, EngineListener, NativePlayer},
    error::ChannelError,
    event::PlayerEvent,
    sink::{EventDelegate, QueuingEventSink},
    surface::SurfaceEntry,
    types::*,
    Result,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, instrument, warn};

/// Error code for engine failures reported on the event stream
pub const PLAYBACK_ERROR_CODE: &str = "VideoError";
/// Error code for data source setup failures reported on the event stream
pub const SETUP_ERROR_CODE: &str = "SetupError";

struct StateCell {
    state: PlaybackState,
    generation: u64,
}

/// State shared between the adapter and the engine callbacks
struct PlayerShared {
    handle: PlayerHandle,
    session_id: SessionId,
    cell: Mutex<StateCell>,
    released: AtomicBool,
}

impl PlayerShared {
    fn lock(&self) -> MutexGuard<'_, StateCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> PlaybackState {
        self.lock().state
    }

    fn apply(&self, cell: &mut StateCell, to: PlaybackState) -> bool {
        let from = cell.state;
        if from == to {
            return true;
        }
        if !from.can_transition_to(to) {
            warn!(handle = %self.handle, %from, %to, "Ignoring invalid state transition");
            return false;
        }
        cell.state = to;
        debug!(handle = %self.handle, %from, %to, "State transition");
        true
    }

    /// Apply a transition if the state machine allows it
    fn transition(&self, to: PlaybackState) -> bool {
        let mut cell = self.lock();
        self.apply(&mut cell, to)
    }

    /// Transition on behalf of a callback from `generation`. Stale
    /// generations and unexpected source states are refused.
    fn transition_from(
        &self,
        generation: u64,
        from: &[PlaybackState],
        to: PlaybackState,
    ) -> bool {
        let mut cell = self.lock();
        if cell.generation != generation || !from.contains(&cell.state) {
            return false;
        }
        self.apply(&mut cell, to)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Start a new source generation, returning it
    fn next_generation(&self) -> u64 {
        let mut cell = self.lock();
        cell.generation += 1;
        cell.generation
    }
}

/// Engine listener feeding the player's sink
struct PlayerCallbacks {
    shared: Arc<PlayerShared>,
    sink: Arc<QueuingEventSink>,
    generation: u64,
}

impl PlayerCallbacks {
    fn is_live(&self, callback: &str) -> bool {
        if self.shared.released.load(Ordering::SeqCst) {
            warn!(handle = %self.shared.handle, callback, "Discarding callback for disposed player");
            return false;
        }
        true
    }

    fn is_stale(&self, callback: &str) -> bool {
        if self.shared.is_current(self.generation) {
            return false;
        }
        debug!(handle = %self.shared.handle, callback, generation = self.generation, "Dropping callback for a replaced source");
        true
    }
}

impl EngineListener for PlayerCallbacks {
    fn on_prepared(&self, info: MediaInfo) {
        if !self.is_live("prepared") {
            return;
        }
        let prepared = self.shared.transition_from(
            self.generation,
            &[PlaybackState::Preparing],
            PlaybackState::Ready,
        );
        if !prepared {
            debug!(handle = %self.shared.handle, "Ignoring prepared outside of preparation");
            return;
        }
        info!(
            handle = %self.shared.handle,
            session_id = %self.shared.session_id,
            duration_ms = info.duration_ms,
            width = info.width,
            height = info.height,
            "Player prepared"
        );
        self.sink.success(PlayerEvent::prepared(info));
    }

    fn on_completion(&self) {
        if !self.is_live("completion") {
            return;
        }
        let completed = self.shared.transition_from(
            self.generation,
            &[PlaybackState::Playing],
            PlaybackState::Completed,
        );
        if completed {
            debug!(handle = %self.shared.handle, "Playback completed");
            self.sink.success(PlayerEvent::Completed);
        }
    }

    fn on_error(&self, what: i32, extra: i32) {
        if !self.is_live("error") || self.is_stale("error") {
            return;
        }
        self.shared.transition(PlaybackState::Error);
        warn!(handle = %self.shared.handle, what, extra, "Native player error");
        self.sink.error(
            ChannelError::new(PLAYBACK_ERROR_CODE, format!("Video player had error {what}"))
                .with_details(json!({ "what": what, "extra": extra })),
        );
    }

    fn on_buffering_update(&self, percent: i32) {
        if !self.is_live("bufferingUpdate") || self.is_stale("bufferingUpdate") {
            return;
        }
        self.sink.success(PlayerEvent::buffering(percent));
    }
}

/// Host-controlled settings that survive a native reset
struct Settings {
    looping: bool,
    volume: f32,
}

/// One player instance: a native player, its surface and its event channel.
///
/// Shared between the registry and in-flight commands, so every operation
/// takes `&self`. Source changes and settings are serialized by one lock that
/// is never held while events are delivered.
pub struct VideoPlayer {
    shared: Arc<PlayerShared>,
    native: Box<dyn NativePlayer>,
    surface: Mutex<SurfaceEntry>,
    events: EventChannel,
    settings: Mutex<Settings>,
    report_setup_errors: bool,
}

impl VideoPlayer {
    /// Bind a native player to its surface and a fresh event channel
    pub fn new(
        handle: PlayerHandle,
        native: Box<dyn NativePlayer>,
        surface: SurfaceEntry,
        config: &BridgeConfig,
    ) -> Self {
        let shared = Arc::new(PlayerShared {
            handle,
            session_id: SessionId::new(),
            cell: Mutex::new(StateCell {
                state: PlaybackState::Idle,
                generation: 0,
            }),
            released: AtomicBool::new(false),
        });
        let sink = Arc::new(QueuingEventSink::new());
        let events = EventChannel::new(config.event_channel_name(handle), sink);

        native.set_surface(surface.surface());

        info!(
            handle = %handle,
            session_id = %shared.session_id,
            channel = %events.name(),
            "Player created"
        );

        let player = Self {
            shared,
            native,
            surface: Mutex::new(surface),
            events,
            settings: Mutex::new(Settings {
                looping: false,
                volume: 1.0,
            }),
            report_setup_errors: config.report_setup_errors,
        };
        player.bind_listener(0);
        player
    }

    fn bind_listener(&self, generation: u64) {
        self.native.set_listener(Arc::new(PlayerCallbacks {
            shared: self.shared.clone(),
            sink: self.events.sink().clone(),
            generation,
        }));
    }

    fn settings(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle(&self) -> PlayerHandle {
        self.shared.handle
    }

    pub fn session_id(&self) -> SessionId {
        self.shared.session_id
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn is_looping(&self) -> bool {
        self.settings().looping
    }

    /// Volume currently applied to both channels
    pub fn volume(&self) -> f32 {
        self.settings().volume
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Attach the host's listener to this player's event stream
    pub fn listen(&self, delegate: Arc<dyn EventDelegate>) {
        self.events.listen(delegate);
    }

    pub fn cancel(&self) {
        self.events.cancel();
    }

    /// Run one host command. `Dispose` releases the player but leaves
    /// untracking it to the caller.
    pub fn execute(&self, command: PlayerCommand) -> Result<Value> {
        debug!(handle = %self.handle(), method = command.method(), "Executing command");
        match command {
            PlayerCommand::SetLooping(looping) => self.set_looping(looping),
            PlayerCommand::SetVolume(volume) => {
                self.set_volume(volume);
            }
            PlayerCommand::SetDataSource(uri) => self.set_data_source(&uri),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::SeekTo(position_ms) => self.seek_to(position_ms),
            PlayerCommand::Position => return Ok(json!(self.position())),
            PlayerCommand::Dispose => self.dispose(),
        }
        Ok(Value::Null)
    }

    /// Open `uri` and start asynchronous preparation.
    ///
    /// Failures are never returned to the caller: they are logged, optionally
    /// sent on the event stream, and leave the player idle so the call can be
    /// retried.
    #[instrument(skip(self), fields(handle = %self.shared.handle))]
    pub fn set_data_source(&self, uri: &str) {
        if self.is_released() {
            warn!("Data source set on a disposed player");
            return;
        }
        let opened = {
            let settings = self.settings();
            self.open(uri, &settings)
        };
        if let Err(e) = opened {
            error!(uri, error = %e, "Failed to set data source");
            if self.report_setup_errors {
                self.events.sink().error(
                    ChannelError::new(SETUP_ERROR_CODE, e.to_string())
                        .with_details(json!({ "uri": uri, "reason": e.error_code() })),
                );
            }
        }
    }

    fn open(&self, uri: &str, settings: &Settings) -> Result<()> {
        let generation = self.shared.next_generation();
        self.bind_listener(generation);
        if self.state() != PlaybackState::Idle {
            self.reset_native(settings);
        }

        let source = DataSource::parse(uri)?;
        debug!(source = %source, local = source.is_local(), generation, "Opening data source");
        self.native.set_data_source(source)?;

        self.shared.transition(PlaybackState::Preparing);
        if let Err(e) = self.native.prepare_async() {
            self.reset_native(settings);
            return Err(e);
        }
        Ok(())
    }

    /// Return the native player to idle, keeping looping and volume
    fn reset_native(&self, settings: &Settings) {
        self.native.reset();
        self.native.set_looping(settings.looping);
        self.native.set_volume(settings.volume, settings.volume);
        self.shared.transition(PlaybackState::Idle);
    }

    pub fn play(&self) {
        let state = self.state();
        if !state.can_play() {
            warn!(handle = %self.handle(), %state, "Cannot play from current state");
            return;
        }
        self.native.start();
        self.shared.transition(PlaybackState::Playing);
    }

    pub fn pause(&self) {
        let state = self.state();
        if state != PlaybackState::Playing {
            debug!(handle = %self.handle(), %state, "Pause ignored");
            return;
        }
        self.native.pause();
        self.shared.transition(PlaybackState::Paused);
    }

    pub fn set_looping(&self, looping: bool) {
        let mut settings = self.settings();
        settings.looping = looping;
        self.native.set_looping(looping);
    }

    /// Apply `volume` to both channels, clamped to `[0.0, 1.0]`.
    /// Returns the applied value.
    pub fn set_volume(&self, volume: f64) -> f32 {
        let clamped = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0) as f32
        };
        let mut settings = self.settings();
        settings.volume = clamped;
        self.native.set_volume(clamped, clamped);
        clamped
    }

    pub fn seek_to(&self, position_ms: i64) {
        self.native.seek_to(position_ms.max(0));
    }

    /// Last known position in milliseconds
    pub fn position(&self) -> i64 {
        self.native.current_position()
    }

    /// Release everything this player holds: stop playback, release the
    /// surface, end the event stream, then release the engine. Only the
    /// first call has any effect.
    #[instrument(skip(self), fields(handle = %self.shared.handle))]
    pub fn dispose(&self) {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            debug!("Player already disposed");
            return;
        }
        info!(session_id = %self.shared.session_id, state = %self.state(), "Disposing player");

        if self.native.is_playing() {
            self.native.stop();
        }
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();

        self.events.close();

        self.native.release();
        self.shared.transition(PlaybackState::Disposed);
    }
}

impl std::fmt::Debug for VideoPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoPlayer")
            .field("handle", &self.shared.handle)
            .field("session_id", &self.shared.session_id)
            .field("state", &self.state())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockNativePlayer;
    use crate::event::SinkMessage;
    use crate::surface::{SurfaceProvider, SurfaceTextureRegistry};
    use crate::test_support::RecordingDelegate;
    use mockall::{predicate::eq, Sequence};

    type ListenerSlot = Arc<Mutex<Option<Arc<dyn EngineListener>>>>;

    /// Mock with the construction-time expectations in place; the engine
    /// listener is captured so tests can fire callbacks.
    fn mock_native() -> (MockNativePlayer, ListenerSlot) {
        let slot: ListenerSlot = Arc::new(Mutex::new(None));
        let captured = slot.clone();
        let mut native = MockNativePlayer::new();
        native.expect_set_surface().return_const(());
        native.expect_set_listener().returning(move |listener| {
            *captured.lock().unwrap() = Some(listener);
        });
        (native, slot)
    }

    fn listener(slot: &ListenerSlot) -> Arc<dyn EngineListener> {
        slot.lock().unwrap().clone().expect("listener registered")
    }

    fn player(native: MockNativePlayer) -> VideoPlayer {
        VideoPlayer::new(
            PlayerHandle(1),
            Box::new(native),
            SurfaceEntry::new(1),
            &BridgeConfig::default(),
        )
    }

    fn prepared_player(mut native: MockNativePlayer, slot: &ListenerSlot) -> VideoPlayer {
        native.expect_set_data_source().returning(|_| Ok(()));
        native.expect_prepare_async().returning(|| Ok(()));
        let player = player(native);
        player.set_data_source("https://cdn.example.com/a.mp4");
        listener(slot).on_prepared(MediaInfo {
            duration_ms: 5_000,
            width: 640,
            height: 360,
        });
        player
    }

    #[test]
    fn test_volume_is_clamped_symmetrically() {
        let (mut native, _slot) = mock_native();
        native
            .expect_set_volume()
            .with(eq(1.0f32), eq(1.0f32))
            .times(1)
            .return_const(());
        native
            .expect_set_volume()
            .with(eq(0.0f32), eq(0.0f32))
            .times(2)
            .return_const(());
        native
            .expect_set_volume()
            .with(eq(0.5f32), eq(0.5f32))
            .times(1)
            .return_const(());

        let player = player(native);
        assert_eq!(player.set_volume(1.5), 1.0);
        assert_eq!(player.set_volume(-0.2), 0.0);
        assert_eq!(player.set_volume(f64::NAN), 0.0);
        assert_eq!(player.set_volume(0.5), 0.5);
        assert_eq!(player.volume(), 0.5);
    }

    #[test]
    fn test_set_data_source_prepares() {
        let (mut native, slot) = mock_native();
        native
            .expect_set_data_source()
            .withf(|source| matches!(source, DataSource::Uri(url) if url.host_str() == Some("cdn.example.com")))
            .times(1)
            .returning(|_| Ok(()));
        native.expect_prepare_async().times(1).returning(|| Ok(()));

        let player = player(native);
        player.set_data_source("https://cdn.example.com/a.mp4");
        assert_eq!(player.state(), PlaybackState::Preparing);

        let delegate = Arc::new(RecordingDelegate::default());
        player.listen(delegate.clone());
        listener(&slot).on_prepared(MediaInfo {
            duration_ms: 5_000,
            width: 640,
            height: 360,
        });

        assert_eq!(player.state(), PlaybackState::Ready);
        assert_eq!(
            delegate.take(),
            vec![SinkMessage::Event(PlayerEvent::Prepared {
                duration: 5_000,
                width: 640,
                height: 360,
            })]
        );
    }

    #[test]
    fn test_setup_error_is_reported_and_retryable() {
        let (mut native, _slot) = mock_native();
        native.expect_set_data_source().times(1).returning(|_| Ok(()));
        native.expect_prepare_async().times(1).returning(|| Ok(()));

        let player = player(native);
        player.set_data_source("");
        assert_eq!(player.state(), PlaybackState::Idle);

        let delegate = Arc::new(RecordingDelegate::default());
        player.listen(delegate.clone());
        match delegate.take().as_slice() {
            [SinkMessage::Error(error)] => {
                assert_eq!(error.code, SETUP_ERROR_CODE);
                assert_eq!(error.details.as_ref().unwrap()["reason"], "invalid_data_source");
            }
            other => panic!("unexpected messages: {other:?}"),
        }

        player.set_data_source("https://cdn.example.com/a.mp4");
        assert_eq!(player.state(), PlaybackState::Preparing);
    }

    #[test]
    fn test_setup_error_can_stay_silent() {
        let (native, _slot) = mock_native();
        let player = VideoPlayer::new(
            PlayerHandle(4),
            Box::new(native),
            SurfaceEntry::new(4),
            &BridgeConfig {
                report_setup_errors: false,
                ..Default::default()
            },
        );
        player.set_data_source("/no/such/file.mp4");
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.events().sink().pending(), 0);
    }

    #[test]
    fn test_failed_prepare_resets_native() {
        let (mut native, _slot) = mock_native();
        native.expect_set_data_source().returning(|_| Ok(()));
        native
            .expect_prepare_async()
            .returning(|| Err(crate::Error::Engine("busy".into())));
        native.expect_reset().times(1).return_const(());
        native.expect_set_looping().with(eq(false)).return_const(());
        native.expect_set_volume().return_const(());

        let player = player(native);
        player.set_data_source("https://cdn.example.com/a.mp4");
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_resourcing_keeps_looping_and_volume() {
        let (mut native, slot) = mock_native();
        native.expect_set_looping().with(eq(true)).times(2).return_const(());
        native
            .expect_set_volume()
            .with(eq(0.3f32), eq(0.3f32))
            .times(2)
            .return_const(());
        native.expect_reset().times(1).return_const(());
        let player = prepared_player(native, &slot);
        player.set_looping(true);
        player.set_volume(0.3);

        player.set_data_source("https://cdn.example.com/b.mp4");
        assert_eq!(player.state(), PlaybackState::Preparing);
        assert!(player.is_looping());
    }

    #[test]
    fn test_callbacks_from_replaced_source_are_dropped() {
        let (mut native, slot) = mock_native();
        native.expect_reset().times(1).return_const(());
        native.expect_set_looping().return_const(());
        native.expect_set_volume().return_const(());
        let info = MediaInfo {
            duration_ms: 5_000,
            width: 640,
            height: 360,
        };
        let player = prepared_player(native, &slot);
        let delegate = Arc::new(RecordingDelegate::default());
        player.listen(delegate.clone());
        assert_eq!(delegate.take().len(), 1);

        let first = listener(&slot);
        player.set_data_source("https://cdn.example.com/b.mp4");
        let second = listener(&slot);

        first.on_prepared(info);
        first.on_buffering_update(40);
        first.on_error(1, 0);
        assert_eq!(player.state(), PlaybackState::Preparing);
        assert_eq!(delegate.len(), 0);

        second.on_prepared(info);
        second.on_prepared(info);
        assert_eq!(player.state(), PlaybackState::Ready);
        assert_eq!(
            delegate.take(),
            vec![SinkMessage::Event(PlayerEvent::Prepared {
                duration: 5_000,
                width: 640,
                height: 360,
            })]
        );
    }

    #[test]
    fn test_dispose_twice_releases_once() {
        let (mut native, _slot) = mock_native();
        native.expect_is_playing().times(1).return_const(false);
        native.expect_release().times(1).return_const(());
        let player = player(native);
        let delegate = Arc::new(RecordingDelegate::default());
        player.listen(delegate.clone());

        player.dispose();
        player.dispose();
        assert!(player.is_released());
        assert_eq!(player.state(), PlaybackState::Disposed);
        assert_eq!(delegate.take(), vec![SinkMessage::EndOfStream]);
    }

    #[test]
    fn test_play_pause_follow_state_machine() {
        let (mut native, slot) = mock_native();
        native.expect_start().times(2).return_const(());
        native.expect_pause().times(1).return_const(());

        let player = prepared_player(native, &slot);
        player.pause();
        assert_eq!(player.state(), PlaybackState::Ready);

        player.play();
        assert_eq!(player.state(), PlaybackState::Playing);
        player.pause();
        assert_eq!(player.state(), PlaybackState::Paused);
        player.play();
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_play_before_prepared_is_ignored() {
        let (mut native, _slot) = mock_native();
        native.expect_start().never();
        let player = player(native);
        player.play();
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_engine_error_keeps_player_usable() {
        let (mut native, slot) = mock_native();
        native.expect_set_data_source().returning(|_| Ok(()));
        native.expect_prepare_async().returning(|| Ok(()));
        native.expect_reset().times(1).return_const(());
        native.expect_set_looping().return_const(());
        native.expect_set_volume().return_const(());

        let player = player(native);
        let delegate = Arc::new(RecordingDelegate::default());
        player.listen(delegate.clone());
        player.set_data_source("https://cdn.example.com/a.mp4");
        listener(&slot).on_error(1, -1004);

        assert_eq!(player.state(), PlaybackState::Error);
        assert_eq!(
            delegate.take(),
            vec![SinkMessage::Error(
                ChannelError::new(PLAYBACK_ERROR_CODE, "Video player had error 1")
                    .with_details(json!({ "what": 1, "extra": -1004 }))
            )]
        );

        player.set_data_source("https://cdn.example.com/a.mp4");
        assert_eq!(player.state(), PlaybackState::Preparing);
    }

    #[test]
    fn test_completion_and_buffering_relay() {
        let (mut native, slot) = mock_native();
        native.expect_start().return_const(());
        let player = prepared_player(native, &slot);
        let delegate = Arc::new(RecordingDelegate::default());
        player.listen(delegate.clone());
        delegate.take();

        player.play();
        listener(&slot).on_buffering_update(80);
        listener(&slot).on_completion();

        assert_eq!(player.state(), PlaybackState::Completed);
        assert_eq!(
            delegate.take(),
            vec![
                SinkMessage::Event(PlayerEvent::BufferingUpdate { values: vec![[0, 80]] }),
                SinkMessage::Event(PlayerEvent::Completed),
            ]
        );
    }

    #[test]
    fn test_seek_and_position_forward() {
        let (mut native, _slot) = mock_native();
        native.expect_seek_to().with(eq(0i64)).times(1).return_const(());
        native.expect_seek_to().with(eq(2_500i64)).times(1).return_const(());
        native.expect_current_position().return_const(2_500i64);

        let player = player(native);
        player.seek_to(-40);
        player.seek_to(2_500);
        assert_eq!(player.position(), 2_500);
    }

    #[test]
    fn test_dispose_releases_in_order() {
        let surfaces = SurfaceTextureRegistry::new();
        let surface = surfaces.create_surface().unwrap();
        let delegate = Arc::new(RecordingDelegate::default());

        let (mut native, slot) = mock_native();
        let mut seq = Sequence::new();
        native
            .expect_is_playing()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        native.expect_stop().times(1).in_sequence(&mut seq).return_const(());
        let seen = delegate.clone();
        native
            .expect_release()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || {
                // The stream must already be closed when the engine goes away.
                assert_eq!(seen.len(), 1);
            });

        let player = VideoPlayer::new(
            PlayerHandle(surface.id()),
            Box::new(native),
            surface,
            &BridgeConfig::default(),
        );
        player.listen(delegate.clone());
        let callbacks = listener(&slot);

        player.dispose();
        assert_eq!(surfaces.live_surfaces(), 0);
        assert_eq!(delegate.take(), vec![SinkMessage::EndOfStream]);

        callbacks.on_completion();
        callbacks.on_buffering_update(50);
        callbacks.on_error(1, 0);
        assert_eq!(delegate.len(), 0);
    }
}
