//! Host-side frame producer.
//!
//! Every tick renders the scene into the current slot, blocks until the
//! device has copied the image into linear host-visible memory, packs the
//! rows and streams the frame in lockstep chunks. When pose telemetry is
//! on, the viewer's pose is read before the scene is recorded, so each
//! frame reflects the pose sent with its request.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::StreamError;
use crate::frame::{Frame, pack_rows};
use crate::gpu::GraphicsDevice;
use crate::pose::{InputEvent, ViewState};
use crate::session::{RenderSession, SessionOptions, SessionRole};
use crate::transport::FrameSender;

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Copy `image` back from the device and pack it into `frame`.
///
/// The readback mapping is released when this returns, on success or
/// failure.
pub fn capture_frame<D: GraphicsDevice>(
    device: &mut D,
    image: usize,
    frame: &mut Frame,
) -> Result<(), StreamError> {
    let stride = device.copy_to_readback(image)?;
    let geometry = frame.geometry();
    let mapped = device.readback_memory().map();
    pack_rows(&mapped, stride, geometry, frame.as_bytes_mut())
}

/// Output of a completed producer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSent {
    pub sequence: u64,
    pub bytes: usize,
}

/// [`SessionRole`] that captures the rendered image and sends it.
pub struct CaptureRole<S> {
    sender: FrameSender<S>,
    frame: Frame,
    pose_telemetry: bool,
    next_sequence: u64,
    last_report: Instant,
}

impl<S: Read + Write> CaptureRole<S> {
    pub fn new(sender: FrameSender<S>, pose_telemetry: bool) -> Self {
        Self {
            frame: Frame::zeroed(sender.geometry()),
            sender,
            pose_telemetry,
            next_sequence: 0,
            last_report: Instant::now(),
        }
    }

    pub fn sender(&self) -> &FrameSender<S> {
        &self.sender
    }

    /// Frames sent so far.
    pub fn frames_sent(&self) -> u64 {
        self.next_sequence
    }

    /// The most recently captured frame.
    pub fn last_frame(&self) -> &Frame {
        &self.frame
    }

    fn report(&mut self) {
        if self.last_report.elapsed() < STATS_INTERVAL {
            return;
        }
        let s = self.sender.stats();
        info!(
            fps = format_args!("{:.1}", s.frames_per_sec),
            mbps = format_args!("{:.1}", s.bytes_per_sec / 1e6),
            chunk_rtt = ?s.chunk_rtt,
            frames = s.total_frames,
            "streaming"
        );
        self.last_report = Instant::now();
    }
}

impl<D: GraphicsDevice, S: Read + Write> SessionRole<D> for CaptureRole<S> {
    type Output = FrameSent;

    fn prepare(&mut self, view: &mut ViewState) -> Result<(), StreamError> {
        if self.pose_telemetry {
            let pose = self.sender.read_pose()?;
            view.apply(&InputEvent::SetPose(pose), Duration::ZERO);
        }
        Ok(())
    }

    fn record(&mut self, _device: &mut D, _image: usize) -> Result<(), StreamError> {
        Ok(())
    }

    fn finish(&mut self, device: &mut D, image: usize) -> Result<FrameSent, StreamError> {
        capture_frame(device, image, &mut self.frame)?;
        self.frame.set_sequence(self.next_sequence);
        self.sender.send_frame(self.frame.as_bytes())?;

        let sent = FrameSent {
            sequence: self.next_sequence,
            bytes: self.frame.as_bytes().len(),
        };
        self.next_sequence += 1;
        debug!(sequence = sent.sequence, image, "frame sent");
        self.report();
        Ok(sent)
    }
}

/// Rendering session that streams every frame it renders.
pub type FrameProducer<D, S> = RenderSession<D, CaptureRole<S>>;

impl<D: GraphicsDevice, S: Read + Write> RenderSession<D, CaptureRole<S>> {
    /// Build a producer session around an established stream.
    pub fn producer(
        device: D,
        sender: FrameSender<S>,
        options: &SessionOptions,
    ) -> Result<Self, StreamError> {
        let role = CaptureRole::new(sender, options.pose_telemetry);
        RenderSession::new(device, role, options)
    }
}
