//! The graphics-device seam.
//!
//! Pipeline, descriptor and shader setup live behind this trait; the
//! streaming pipeline only needs acquire/record/submit/present plus the
//! two host-visible transfer paths (upload on the viewer, readback on the
//! host).

use crate::error::StreamError;
use crate::gpu::fence::Fence;
use crate::gpu::memory::HostVisibleMemory;
use crate::pose::ViewState;

/// Result of asking the presentation engine for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// Index of the image to render into.
    Image(usize),
    /// The surface changed (e.g. resize); dependent resources must be
    /// rebuilt before rendering again.
    OutOfDate,
}

/// Result of handing an image to the presentation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// The surface went stale while the image was in flight.
    OutOfDate,
}

/// Submit/present primitives of a graphics device plus its presentation
/// surface.
pub trait GraphicsDevice {
    type Fence: Fence;

    /// Create a fence in the signaled state.
    fn create_fence(&mut self) -> Result<Self::Fence, StreamError>;

    /// Number of presentation images in the current surface.
    fn image_count(&self) -> usize;

    fn acquire_next_image(&mut self) -> Result<Acquire, StreamError>;

    /// Record the locally rendered scene for `image` from `view`.
    fn record_scene(&mut self, image: usize, view: &ViewState) -> Result<(), StreamError>;

    /// Staging memory whose contents are copied into the sampled image of
    /// `image` by [`record_composite`](Self::record_composite).
    fn upload_memory(&mut self, image: usize) -> &mut HostVisibleMemory;

    /// Record the upload copy plus the full-screen pass that blends the
    /// sampled image under the local scene.
    fn record_composite(&mut self, image: usize) -> Result<(), StreamError>;

    /// Submit everything recorded for `image`; `fence` is signaled once
    /// the device no longer touches the image's resources.
    fn submit(&mut self, image: usize, fence: &Self::Fence) -> Result<(), StreamError>;

    fn present(&mut self, image: usize) -> Result<PresentStatus, StreamError>;

    /// Copy `image` into [`readback_memory`](Self::readback_memory) with
    /// the needed layout transitions and block until the copy completes.
    /// Returns the row stride of the readback buffer in bytes.
    fn copy_to_readback(&mut self, image: usize) -> Result<usize, StreamError>;

    fn readback_memory(&mut self) -> &mut HostVisibleMemory;

    /// Block until the device has finished all submitted work.
    fn wait_idle(&mut self) -> Result<(), StreamError>;

    /// Recreate the presentation chain, views, depth buffer and every
    /// image-count dependent resource for the current surface.
    fn rebuild_surface(&mut self) -> Result<(), StreamError>;
}
