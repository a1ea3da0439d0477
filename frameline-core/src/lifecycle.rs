//! Presentation surface lifecycle.
//!
//! ```text
//!  Valid ──(out-of-date on acquire/present)──► Rebuilding ──► Valid
//! ```
//!
//! A rebuild recreates everything that depends on the presentation chain
//! while the network session and the in-flight slots stay as they are.
//! The tick that performs the rebuild produces no frame.

use tracing::info;

use crate::error::StreamError;
use crate::gpu::GraphicsDevice;
use crate::pool::InFlightPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    #[default]
    Valid,
    Rebuilding,
}

#[derive(Debug, Default)]
pub struct PresentationLifecycle {
    state: SurfaceState,
    rebuilds: u64,
}

impl PresentationLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn is_stale(&self) -> bool {
        self.state == SurfaceState::Rebuilding
    }

    /// Surface reported out of date; the next tick rebuilds.
    pub fn mark_stale(&mut self) {
        if self.state == SurfaceState::Valid {
            info!("presentation surface out of date");
            self.state = SurfaceState::Rebuilding;
        }
    }

    /// Wait for the device to go idle, recreate the surface resources and
    /// reset the pool's image table.
    pub fn rebuild<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        pool: &mut InFlightPool<D::Fence>,
    ) -> Result<(), StreamError> {
        self.state = SurfaceState::Rebuilding;
        device.wait_idle()?;
        device.rebuild_surface()?;
        pool.resize_images(device.image_count());
        self.state = SurfaceState::Valid;
        self.rebuilds += 1;
        info!(rebuilds = self.rebuilds, "presentation surface rebuilt");
        Ok(())
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}
