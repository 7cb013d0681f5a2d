//! Output surfaces
//!
//! Each player renders into a surface allocated by the host's rendering
//! context. A host without a foreground context has no [`SurfaceProvider`],
//! and players cannot be created.

use crate::Result;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Render target handed to a native player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub id: i64,
}

/// Allocates output surfaces
pub trait SurfaceProvider: Send + Sync {
    fn create_surface(&self) -> Result<SurfaceEntry>;
}

/// A surface allocation owned by one player. Releasing it (or dropping it)
/// returns the surface to the provider.
pub struct SurfaceEntry {
    id: i64,
    released: bool,
    live: Option<Arc<AtomicUsize>>,
}

impl SurfaceEntry {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            released: false,
            live: None,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn surface(&self) -> Surface {
        Surface { id: self.id }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(live) = self.live.take() {
            live.fetch_sub(1, Ordering::SeqCst);
        }
        debug!(surface_id = self.id, "Surface released");
    }
}

impl Drop for SurfaceEntry {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SurfaceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceEntry")
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

/// In-process surface provider handing out sequential ids, starting at 1
pub struct SurfaceTextureRegistry {
    next_id: AtomicI64,
    live: Arc<AtomicUsize>,
}

impl SurfaceTextureRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of surfaces allocated and not yet released
    pub fn live_surfaces(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Default for SurfaceTextureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceProvider for SurfaceTextureRegistry {
    fn create_surface(&self) -> Result<SurfaceEntry> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(surface_id = id, "Surface created");
        Ok(SurfaceEntry {
            id,
            released: false,
            live: Some(self.live.clone()),
        })
    }
}
