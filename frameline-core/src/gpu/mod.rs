//! Graphics-device abstraction.
//!
//! The streaming pipeline talks to the device only through
//! [`GraphicsDevice`]: fences, host-visible memory with scoped mapping,
//! and the acquire/record/submit/present cycle. [`SoftwareDevice`] runs
//! that cycle on the CPU.

pub mod device;
pub mod fence;
pub mod memory;
pub mod software;

pub use device::{Acquire, GraphicsDevice, PresentStatus};
pub use fence::{CpuFence, Fence};
pub use memory::{HostVisibleMemory, MappedMemory};
pub use software::{
    OVERLAY_SIZE, READBACK_ALIGNMENT, SceneKind, SoftwareConfig, SoftwareDevice, SurfaceHandle,
    overlay_pixel, pattern_pixel,
};
