//! The rendering session shared by both processes.
//!
//! Device, in-flight ring, surface lifecycle and view state are owned by a
//! single [`RenderSession`]; what differs between host and viewer is the
//! [`SessionRole`] plugged into it:
//!
//! - [`CaptureRole`](crate::producer::CaptureRole) reads the device image
//!   back and streams it.
//! - [`CompositeRole`](crate::consumer::CompositeRole) blends a received
//!   frame under the local scene.
//!
//! One call to [`RenderSession::tick`] is one frame:
//!
//! ```text
//!  stale? ──yes──► rebuild ──► Rebuilt
//!    │no
//!  begin slot ─► acquire ─► bind image ─► prepare ─► record scene
//!            ─► record role ─► submit ─► present ─► finish ──► Completed
//! ```

use std::time::Duration;

use tracing::{debug, info};

use crate::error::StreamError;
use crate::gpu::{Acquire, GraphicsDevice, PresentStatus};
use crate::lifecycle::PresentationLifecycle;
use crate::pool::InFlightPool;
use crate::pose::{InputEvent, ViewState};

/// Upper bound on [`SessionOptions::frames_in_flight`].
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

// ── SessionOptions ───────────────────────────────────────────────

/// Per-session knobs shared by both roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Size `K` of the in-flight ring.
    pub frames_in_flight: usize,
    /// Whether the viewer sends its pose before every frame.
    pub pose_telemetry: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            pose_telemetry: true,
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> Result<(), StreamError> {
        if !(1..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(StreamError::InvalidConfig(format!(
                "frames_in_flight must be within 1..={MAX_FRAMES_IN_FLIGHT}, got {}",
                self.frames_in_flight
            )));
        }
        Ok(())
    }
}

// ── SessionRole ──────────────────────────────────────────────────

/// The role-specific steps of a tick.
pub trait SessionRole<D: GraphicsDevice> {
    /// What a completed tick yields.
    type Output;

    /// Runs after an image is bound and before the scene is recorded.
    fn prepare(&mut self, view: &mut ViewState) -> Result<(), StreamError>;

    /// Record role-specific work for `image` after the scene.
    fn record(&mut self, device: &mut D, image: usize) -> Result<(), StreamError>;

    /// Runs after `image` was submitted and handed to presentation.
    fn finish(&mut self, device: &mut D, image: usize) -> Result<Self::Output, StreamError>;
}

/// Result of one [`RenderSession::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome<T> {
    Completed { slot: usize, image: usize, output: T },
    /// The surface was rebuilt; no frame was produced.
    Rebuilt,
}

impl<T> TickOutcome<T> {
    pub fn is_rebuilt(&self) -> bool {
        matches!(self, Self::Rebuilt)
    }

    pub fn output(self) -> Option<T> {
        match self {
            Self::Completed { output, .. } => Some(output),
            Self::Rebuilt => None,
        }
    }
}

// ── RenderSession ────────────────────────────────────────────────

pub struct RenderSession<D: GraphicsDevice, R> {
    device: D,
    pool: InFlightPool<D::Fence>,
    lifecycle: PresentationLifecycle,
    view: ViewState,
    role: R,
    completed: u64,
}

impl<D: GraphicsDevice, R: SessionRole<D>> RenderSession<D, R> {
    pub fn new(mut device: D, role: R, options: &SessionOptions) -> Result<Self, StreamError> {
        options.validate()?;
        let pool = InFlightPool::with_device(&mut device, options.frames_in_flight)?;
        info!(
            frames_in_flight = options.frames_in_flight,
            images = device.image_count(),
            pose_telemetry = options.pose_telemetry,
            "render session ready"
        );
        Ok(Self {
            device,
            pool,
            lifecycle: PresentationLifecycle::new(),
            view: ViewState::default(),
            role,
            completed: 0,
        })
    }

    /// Run one frame.
    pub fn tick(&mut self) -> Result<TickOutcome<R::Output>, StreamError> {
        if self.lifecycle.is_stale() {
            self.lifecycle.rebuild(&mut self.device, &mut self.pool)?;
            return Ok(TickOutcome::Rebuilt);
        }

        let ticket = self.pool.begin()?;
        let image = match self.device.acquire_next_image()? {
            Acquire::Image(image) => image,
            Acquire::OutOfDate => {
                self.pool.abandon()?;
                self.lifecycle.mark_stale();
                self.lifecycle.rebuild(&mut self.device, &mut self.pool)?;
                return Ok(TickOutcome::Rebuilt);
            }
        };
        self.pool.bind_image(image)?;

        self.role.prepare(&mut self.view)?;
        self.device.record_scene(image, &self.view)?;
        self.role.record(&mut self.device, image)?;

        let device = &mut self.device;
        self.pool.submit_with(|fence| device.submit(image, fence))?;
        let status = self.device.present(image)?;
        self.pool.mark_presented()?;
        if status == PresentStatus::OutOfDate {
            self.lifecycle.mark_stale();
        }

        let output = self.role.finish(&mut self.device, image)?;
        self.completed += 1;
        debug!(
            slot = ticket.slot,
            use_index = ticket.use_index,
            waited = ticket.waited,
            image,
            "tick complete"
        );
        Ok(TickOutcome::Completed {
            slot: ticket.slot,
            image,
            output,
        })
    }

    /// Feed one input event into the view state.
    pub fn apply_input(&mut self, event: &InputEvent, dt: Duration) {
        self.view.apply(event, dt);
    }

    /// Block until the device has retired all work.
    pub fn drain(&mut self) -> Result<(), StreamError> {
        self.pool.wait_all()?;
        self.device.wait_idle()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn role(&self) -> &R {
        &self.role
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn pool(&self) -> &InFlightPool<D::Fence> {
        &self.pool
    }

    pub fn lifecycle(&self) -> &PresentationLifecycle {
        &self.lifecycle
    }

    /// Ticks that produced a frame.
    pub fn completed(&self) -> u64 {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::FrameGeometry;
    use crate::gpu::{SceneKind, SoftwareConfig, SoftwareDevice};
    use crate::pose::Direction;

    /// Role that records the order of its callbacks.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl SessionRole<SoftwareDevice> for Recorder {
        type Output = usize;

        fn prepare(&mut self, _view: &mut ViewState) -> Result<(), StreamError> {
            self.calls.push("prepare");
            Ok(())
        }

        fn record(&mut self, _device: &mut SoftwareDevice, _image: usize) -> Result<(), StreamError> {
            self.calls.push("record");
            Ok(())
        }

        fn finish(&mut self, device: &mut SoftwareDevice, image: usize) -> Result<usize, StreamError> {
            self.calls.push("finish");
            assert_eq!(device.last_presented(), Some(image));
            Ok(image)
        }
    }

    fn session(options: SessionOptions) -> RenderSession<SoftwareDevice, Recorder> {
        let geometry = FrameGeometry::new(8, 4, 2).unwrap();
        let device =
            SoftwareDevice::new(SoftwareConfig::new(geometry, SceneKind::Pattern)).unwrap();
        RenderSession::new(device, Recorder::default(), &options).unwrap()
    }

    #[test]
    fn tick_runs_role_in_order() {
        let mut s = session(SessionOptions::default());
        let outcome = s.tick().unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Completed {
                slot: 0,
                image: 0,
                output: 0
            }
        );
        assert_eq!(s.role().calls, vec!["prepare", "record", "finish"]);
        assert_eq!(s.completed(), 1);
    }

    #[test]
    fn resize_costs_exactly_one_tick() {
        let mut s = session(SessionOptions::default());
        s.tick().unwrap();
        s.device().surface().resize(320, 200);

        assert!(s.tick().unwrap().is_rebuilt());
        assert!(!s.tick().unwrap().is_rebuilt());
        assert_eq!(s.lifecycle().rebuilds(), 1);
        assert_eq!(s.completed(), 2);
        // the rebuilt tick never reaches the role
        assert_eq!(
            s.role().calls,
            vec!["prepare", "record", "finish", "prepare", "record", "finish"]
        );
        s.drain().unwrap();
    }

    #[test]
    fn input_moves_the_view() {
        let mut s = session(SessionOptions::default());
        let before = *s.view().pose();
        s.apply_input(
            &InputEvent::Move(Direction::Forward),
            Duration::from_millis(100),
        );
        assert_ne!(*s.view().pose(), before);
    }

    #[test]
    fn frames_in_flight_is_bounded() {
        let bad = SessionOptions {
            frames_in_flight: 0,
            ..SessionOptions::default()
        };
        assert!(bad.validate().is_err());
        let bad = SessionOptions {
            frames_in_flight: MAX_FRAMES_IN_FLIGHT + 1,
            ..SessionOptions::default()
        };
        assert!(bad.validate().is_err());
    }
}
