//! Video player plugin
//!
//! Entry point for the host: decodes method calls, owns the instance
//! registry, and tracks whether a foreground rendering context is available.
//! The host drives its lifecycle explicitly (`on_destroy`, `init`).
//!
//! No plugin lock is held while a player runs a command, is disposed, or
//! replays events to a new listener, so event delegates may call back into
//! the plugin.

use crate::{
    codec::{Command, MethodCall, MethodReply},
    config::BridgeConfig,
    engine::MediaEngine,
    registry::PlayerRegistry,
    sink::EventDelegate,
    surface::SurfaceProvider,
    types::{PlaybackState, PlayerHandle},
    Error, Result,
};
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

pub struct VideoPlayerPlugin {
    config: BridgeConfig,
    registry: PlayerRegistry,
    surfaces: RwLock<Option<Arc<dyn SurfaceProvider>>>,
}

impl VideoPlayerPlugin {
    /// Create a plugin without a rendering context; attach one with
    /// [`attach_surfaces`](Self::attach_surfaces) before creating players
    pub fn new(config: BridgeConfig, engine: Arc<dyn MediaEngine>) -> Self {
        info!(
            channel = %config.channel_name,
            engine = engine.name(),
            "Video player plugin registered"
        );
        Self {
            config,
            registry: PlayerRegistry::new(engine),
            surfaces: RwLock::new(None),
        }
    }

    pub fn with_surfaces(self, surfaces: Arc<dyn SurfaceProvider>) -> Self {
        self.attach_surfaces(surfaces);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Host gained a foreground rendering context
    pub fn attach_surfaces(&self, surfaces: Arc<dyn SurfaceProvider>) {
        *self.surfaces.write().unwrap_or_else(PoisonError::into_inner) = Some(surfaces);
        debug!("Rendering context attached");
    }

    /// Host lost its foreground rendering context. Existing players keep
    /// their surfaces; new ones cannot be created.
    pub fn detach_surfaces(&self) {
        *self.surfaces.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Rendering context detached");
    }

    fn surface_provider(&self) -> Option<Arc<dyn SurfaceProvider>> {
        self.surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Handle one host call and produce its reply
    #[instrument(skip(self, call), fields(method = %call.method))]
    pub fn on_method_call(&self, call: &MethodCall) -> MethodReply {
        let result = self.handle(call);
        match &result {
            Err(Error::NotImplemented(_)) => warn!("Method not implemented"),
            Err(e) if e.is_lookup() => warn!(error = %e, "Call addressed a missing player"),
            Err(e) => debug!(error = %e, code = e.error_code(), "Method call failed"),
            Ok(_) => {}
        }
        result.into()
    }

    /// Decode and execute one host call
    pub fn handle(&self, call: &MethodCall) -> Result<Value> {
        let command = Command::decode(call)?;
        self.execute(command)
    }

    pub fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::Init => {
                self.registry.dispose_all();
                Ok(Value::Null)
            }
            Command::Create => {
                let surfaces = self.surface_provider().ok_or(Error::NoRenderingContext)?;
                let handle = self.registry.create(surfaces.as_ref(), &self.config)?;
                Ok(json!({ "handle": handle }))
            }
            Command::Player { handle, command } => self.registry.dispatch(handle, command),
        }
    }

    /// Host started listening on a player's event channel
    pub fn listen(&self, handle: PlayerHandle, delegate: Arc<dyn EventDelegate>) -> Result<()> {
        self.registry.get(handle)?.listen(delegate);
        Ok(())
    }

    /// Host stopped listening on a player's event channel
    pub fn cancel(&self, handle: PlayerHandle) -> Result<()> {
        self.registry.get(handle)?.cancel();
        Ok(())
    }

    /// Event channel name for a live player
    pub fn event_channel(&self, handle: PlayerHandle) -> Result<String> {
        Ok(self.registry.get(handle)?.events().name().to_string())
    }

    pub fn state(&self, handle: PlayerHandle) -> Result<PlaybackState> {
        Ok(self.registry.get(handle)?.state())
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    /// The host view is going away: release every player
    pub fn on_destroy(&self) {
        let disposed = self.registry.dispose_all();
        info!(disposed, "Host destroyed");
    }
}

impl Drop for VideoPlayerPlugin {
    fn drop(&mut self) {
        self.registry.dispose_all();
    }
}
