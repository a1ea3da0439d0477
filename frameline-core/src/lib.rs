//! # frameline-core
//!
//! Core library for streaming rendered frames from a host process to a
//! viewer process over one TCP connection.
//!
//! This crate contains:
//! - **Transport**: per-chunk lockstep frame exchange, pose telemetry and
//!   the setup handshake (`FrameSender`, `FrameReceiver`, `SessionHello`)
//! - **Geometry / Frame**: frame layout, chunk views and row packing
//! - **GPU**: the `GraphicsDevice` seam, fences, scoped host-visible
//!   mappings and the CPU `SoftwareDevice`
//! - **Pool**: `InFlightPool`, the ring of fenced per-tick resource slots
//! - **Lifecycle**: `PresentationLifecycle`, rebuilds after surface loss
//! - **Session**: `RenderSession` with the `CaptureRole` (producer) and
//!   `CompositeRole` (consumer) roles, plus the consumer's `ReceiveWorker`
//! - **Error**: `StreamError`, a typed `thiserror`-based error hierarchy

pub mod consumer;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod gpu;
pub mod lifecycle;
pub mod pool;
pub mod pose;
pub mod producer;
pub mod session;
pub mod stats;
pub mod transport;
pub mod worker;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use consumer::{CompositeRole, FrameConsumer, FrameShown};
pub use error::{ErrorKind, StreamError};
pub use frame::{Frame, pack_rows};
pub use geometry::{BYTES_PER_PIXEL, FrameGeometry};
pub use gpu::{
    Acquire, CpuFence, Fence, GraphicsDevice, HostVisibleMemory, MappedMemory, PresentStatus,
    SceneKind, SoftwareConfig, SoftwareDevice, SurfaceHandle,
};
pub use lifecycle::{PresentationLifecycle, SurfaceState};
pub use pool::{InFlightPool, SlotState, SlotTicket};
pub use pose::{Direction, InputEvent, Pose, ViewState};
pub use producer::{CaptureRole, FrameProducer, FrameSent};
pub use session::{RenderSession, SessionOptions, SessionRole, TickOutcome};
pub use stats::{ThroughputMeter, ThroughputSnapshot};
pub use transport::{FrameReceiver, FrameSender, SessionHello, SessionListener};
pub use worker::ReceiveWorker;
