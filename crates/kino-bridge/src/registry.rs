//! Instance registry
//!
//! Maps opaque handles to live players. Only the integer handle ever crosses
//! the channel. The map lock covers lookups and bookkeeping only: commands and
//! disposal run on a shared reference after it is released, so event
//! delegates may call back into the registry.

use crate::{
    codec::PlayerCommand,
    config::BridgeConfig,
    engine::MediaEngine,
    player::VideoPlayer,
    surface::SurfaceProvider,
    types::PlayerHandle,
    Error, Result,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

pub struct PlayerRegistry {
    engine: Arc<dyn MediaEngine>,
    players: Mutex<BTreeMap<PlayerHandle, Arc<VideoPlayer>>>,
}

impl PlayerRegistry {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            players: Mutex::new(BTreeMap::new()),
        }
    }

    fn players(&self) -> MutexGuard<'_, BTreeMap<PlayerHandle, Arc<VideoPlayer>>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a surface and a native player, and track them under the
    /// surface's id
    #[instrument(skip_all)]
    pub fn create(&self, surfaces: &dyn SurfaceProvider, config: &BridgeConfig) -> Result<PlayerHandle> {
        let mut players = self.players();
        let surface = surfaces.create_surface()?;
        let handle = PlayerHandle(surface.id());
        if players.contains_key(&handle) {
            return Err(Error::HandleInUse { handle });
        }

        let native = self.engine.create_player()?;
        let player = VideoPlayer::new(handle, native, surface, config);
        players.insert(handle, Arc::new(player));

        info!(
            handle = %handle,
            engine = self.engine.name(),
            live = players.len(),
            "Player registered"
        );
        Ok(handle)
    }

    pub fn get(&self, handle: PlayerHandle) -> Result<Arc<VideoPlayer>> {
        self.players()
            .get(&handle)
            .cloned()
            .ok_or(Error::UnknownHandle { handle })
    }

    /// Forward a command to the player behind `handle`
    #[instrument(skip(self), fields(method = command.method()))]
    pub fn dispatch(&self, handle: PlayerHandle, command: PlayerCommand) -> Result<Value> {
        if let PlayerCommand::Dispose = command {
            self.dispose(handle)?;
            return Ok(Value::Null);
        }
        let player = self.get(handle)?;
        debug!(handle = %handle, "Dispatching command");
        player.execute(command)
    }

    /// Stop tracking `handle` without disposing the player
    pub fn remove(&self, handle: PlayerHandle) -> Result<Arc<VideoPlayer>> {
        self.players()
            .remove(&handle)
            .ok_or(Error::UnknownHandle { handle })
    }

    /// Untrack, then dispose one player
    pub fn dispose(&self, handle: PlayerHandle) -> Result<()> {
        let player = self.remove(handle)?;
        player.dispose();
        info!(handle = %handle, live = self.len(), "Player removed");
        Ok(())
    }

    /// Dispose every tracked player. Returns how many were disposed.
    pub fn dispose_all(&self) -> usize {
        let players = std::mem::take(&mut *self.players());
        let count = players.len();
        for player in players.into_values() {
            player.dispose();
        }
        if count > 0 {
            info!(count, "Disposed all players");
        }
        count
    }

    pub fn contains(&self, handle: PlayerHandle) -> bool {
        self.players().contains_key(&handle)
    }

    pub fn handles(&self) -> Vec<PlayerHandle> {
        self.players().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.players().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players().is_empty()
    }
}
