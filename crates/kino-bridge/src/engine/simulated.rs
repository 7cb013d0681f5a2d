//! Simulated native engine
//!
//! Stands in for a real media library: preparation finishes on a worker
//! thread after a configurable delay, buffering progress is reported in
//! steps, and playback position follows the wall clock. Nothing is decoded.

use super::{
    DataSource, EngineListener, MediaEngine, NativePlayer, MEDIA_ERROR_IO, MEDIA_ERROR_MALFORMED,
    MEDIA_ERROR_UNKNOWN, MEDIA_ERROR_UNSUPPORTED,
};
use crate::{surface::Surface, types::MediaInfo, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Simulated engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatedConfig {
    /// Delay before `prepared` is reported
    pub prepare_delay_ms: u64,
    /// Reported media duration
    pub duration_ms: i64,
    pub width: u32,
    pub height: u32,
    /// Buffering progress increment, in percent
    pub buffering_step: i32,
    /// Non-file schemes the engine accepts
    pub supported_schemes: Vec<String>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            prepare_delay_ms: 50,
            duration_ms: 10_000,
            width: 1280,
            height: 720,
            buffering_step: 25,
            supported_schemes: ["http", "https", "rtmp", "rtsp", "content"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SimulatedConfig {
    fn media_info(&self) -> MediaInfo {
        MediaInfo {
            duration_ms: self.duration_ms,
            width: self.width,
            height: self.height,
        }
    }
}

/// Engine producing [`SimulatedPlayer`]s
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    config: SimulatedConfig,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }
}

impl MediaEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    fn create_player(&self) -> Result<Box<dyn NativePlayer>> {
        Ok(Box::new(SimulatedPlayer::new(self.config.clone())))
    }
}

struct SimState {
    listener: Option<Arc<dyn EngineListener>>,
    surface: Option<Surface>,
    source: Option<DataSource>,
    prepared: bool,
    playing: bool,
    looping: bool,
    volume: (f32, f32),
    anchor_ms: i64,
    started_at: Option<Instant>,
    /// Bumped on every source change; stale prepare workers give up
    source_gen: u64,
    /// Bumped on every clock re-anchor; stale completion watchers give up
    clock_gen: u64,
    released: bool,
}

impl SimState {
    fn position(&self, duration_ms: i64) -> i64 {
        match self.started_at {
            Some(started) if self.playing => {
                let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
                self.anchor_ms.saturating_add(elapsed).min(duration_ms)
            }
            _ => self.anchor_ms,
        }
    }

    fn halt_clock(&mut self, duration_ms: i64) {
        self.anchor_ms = self.position(duration_ms);
        self.playing = false;
        self.started_at = None;
        self.clock_gen += 1;
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Native player driven by worker threads
pub struct SimulatedPlayer {
    config: SimulatedConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPlayer {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SimState {
                listener: None,
                surface: None,
                source: None,
                prepared: false,
                playing: false,
                looping: false,
                volume: (1.0, 1.0),
                anchor_ms: 0,
                started_at: None,
                source_gen: 0,
                clock_gen: 0,
                released: false,
            })),
        }
    }

    /// Currently applied (left, right) volume
    pub fn volume(&self) -> (f32, f32) {
        lock(&self.state).volume
    }

    pub fn surface(&self) -> Option<Surface> {
        lock(&self.state).surface
    }

    /// Decide up front how preparation of `source` will end
    fn verdict_for(&self, source: &DataSource) -> std::result::Result<MediaInfo, (i32, i32)> {
        match source {
            DataSource::File(file) => {
                let mut header = [0u8; 8];
                match file.read_at(0, &mut header) {
                    Ok(0) => Err((MEDIA_ERROR_UNKNOWN, MEDIA_ERROR_MALFORMED)),
                    Ok(_) => Ok(self.config.media_info()),
                    Err(_) => Err((MEDIA_ERROR_UNKNOWN, MEDIA_ERROR_IO)),
                }
            }
            DataSource::Uri(url) => {
                let supported = self
                    .config
                    .supported_schemes
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(url.scheme()));
                if supported {
                    Ok(self.config.media_info())
                } else {
                    Err((MEDIA_ERROR_UNKNOWN, MEDIA_ERROR_UNSUPPORTED))
                }
            }
        }
    }

    fn arm_completion(&self, state: &mut SimState) {
        state.clock_gen += 1;
        let gen = state.clock_gen;
        let duration = self.config.duration_ms;
        let remaining = (duration - state.anchor_ms).max(0);
        let shared = self.state.clone();

        let spawned = thread::Builder::new()
            .name("sim-playback".to_string())
            .spawn(move || watch_completion(shared, duration, gen, remaining));
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start playback clock");
        }
    }
}

/// Listener to notify for source generation `gen`, if it is still current.
/// The lock is released before the caller runs the callback; the listener
/// bound with the source drops anything that arrives after a replacement.
fn listener_for(shared: &Mutex<SimState>, gen: u64) -> Option<Arc<dyn EngineListener>> {
    let state = lock(shared);
    if state.released || state.source_gen != gen {
        return None;
    }
    state.listener.clone()
}

fn prepare_worker(
    shared: Arc<Mutex<SimState>>,
    config: SimulatedConfig,
    gen: u64,
    verdict: std::result::Result<MediaInfo, (i32, i32)>,
) {
    thread::sleep(Duration::from_millis(config.prepare_delay_ms));

    let info = match verdict {
        Ok(info) => info,
        Err((what, extra)) => {
            if let Some(listener) = listener_for(&shared, gen) {
                debug!(what, extra, "Simulated prepare failed");
                listener.on_error(what, extra);
            }
            return;
        }
    };

    {
        let mut state = lock(&shared);
        if state.released || state.source_gen != gen {
            return;
        }
        state.prepared = true;
        state.anchor_ms = 0;
    }
    let Some(listener) = listener_for(&shared, gen) else {
        return;
    };
    debug!(duration_ms = info.duration_ms, "Simulated prepare finished");
    listener.on_prepared(info);

    let step = config.buffering_step.clamp(1, 100);
    let mut percent = 0;
    while percent < 100 {
        percent = (percent + step).min(100);
        let Some(listener) = listener_for(&shared, gen) else {
            return;
        };
        listener.on_buffering_update(percent);
    }
}

fn watch_completion(shared: Arc<Mutex<SimState>>, duration: i64, gen: u64, remaining: i64) {
    let mut wait = remaining;
    loop {
        thread::sleep(Duration::from_millis(wait.max(0) as u64));

        let listener = {
            let mut state = lock(&shared);
            if state.released || !state.playing || state.clock_gen != gen {
                return;
            }
            if state.looping && duration > 0 {
                state.anchor_ms = 0;
                state.started_at = Some(Instant::now());
                wait = duration;
                continue;
            }
            state.anchor_ms = duration;
            state.playing = false;
            state.started_at = None;
            state.listener.clone()
        };

        if let Some(listener) = listener {
            listener.on_completion();
        }
        return;
    }
}

impl NativePlayer for SimulatedPlayer {
    fn set_listener(&self, listener: Arc<dyn EngineListener>) {
        lock(&self.state).listener = Some(listener);
    }

    fn set_surface(&self, surface: Surface) {
        lock(&self.state).surface = Some(surface);
    }

    fn set_data_source(&self, source: DataSource) -> Result<()> {
        let mut state = lock(&self.state);
        if state.released {
            return Err(Error::Engine("player already released".to_string()));
        }
        debug!(source = %source, "Simulated data source set");
        state.source = Some(source);
        state.prepared = false;
        state.source_gen += 1;
        Ok(())
    }

    fn prepare_async(&self) -> Result<()> {
        let state = lock(&self.state);
        if state.released {
            return Err(Error::Engine("player already released".to_string()));
        }
        let Some(source) = state.source.as_ref() else {
            return Err(Error::Engine("prepare called without a data source".to_string()));
        };
        let verdict = self.verdict_for(source);
        let gen = state.source_gen;
        drop(state);

        let shared = self.state.clone();
        let config = self.config.clone();
        thread::Builder::new()
            .name("sim-prepare".to_string())
            .spawn(move || prepare_worker(shared, config, gen, verdict))?;
        Ok(())
    }

    fn start(&self) {
        let mut state = lock(&self.state);
        if state.released || !state.prepared {
            debug!("Start ignored, nothing prepared");
            return;
        }
        if state.playing {
            return;
        }
        if state.anchor_ms >= self.config.duration_ms {
            state.anchor_ms = 0;
        }
        state.playing = true;
        state.started_at = Some(Instant::now());
        self.arm_completion(&mut state);
    }

    fn pause(&self) {
        let mut state = lock(&self.state);
        if state.playing {
            state.halt_clock(self.config.duration_ms);
        }
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        state.halt_clock(self.config.duration_ms);
        state.prepared = false;
    }

    fn reset(&self) {
        let mut state = lock(&self.state);
        state.halt_clock(self.config.duration_ms);
        state.source = None;
        state.prepared = false;
        state.looping = false;
        state.volume = (1.0, 1.0);
        state.anchor_ms = 0;
        state.source_gen += 1;
    }

    fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    fn set_looping(&self, looping: bool) {
        lock(&self.state).looping = looping;
    }

    fn set_volume(&self, left: f32, right: f32) {
        lock(&self.state).volume = (left, right);
    }

    fn seek_to(&self, position_ms: i64) {
        let mut state = lock(&self.state);
        state.anchor_ms = position_ms.clamp(0, self.config.duration_ms.max(0));
        if state.playing {
            state.started_at = Some(Instant::now());
            self.arm_completion(&mut state);
        }
    }

    fn current_position(&self) -> i64 {
        lock(&self.state).position(self.config.duration_ms)
    }

    fn release(&self) {
        let mut state = lock(&self.state);
        state.halt_clock(self.config.duration_ms);
        state.released = true;
        state.listener = None;
        state.source = None;
        state.prepared = false;
        state.source_gen += 1;
    }
}
