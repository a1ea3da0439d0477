//! Viewer-side frame consumer.
//!
//! The receive request for tick `n` is posted before the local scene is
//! recorded, so the network fetch overlaps local rendering. The render
//! thread joins on it right before compositing, copies the frame into
//! the image's upload memory and records the blend of the received frame
//! under the local scene.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::StreamError;
use crate::frame::Frame;
use crate::gpu::GraphicsDevice;
use crate::pose::ViewState;
use crate::session::{RenderSession, SessionOptions, SessionRole};
use crate::transport::FrameReceiver;
use crate::worker::ReceiveWorker;

/// Copy `frame` into the upload memory of `image`.
///
/// The mapping is released before this returns, whether or not the copy
/// succeeded.
pub fn upload_frame<D: GraphicsDevice>(
    device: &mut D,
    image: usize,
    frame: &Frame,
) -> Result<(), StreamError> {
    let mut mapped = device.upload_memory(image).map();
    mapped.write_at(0, frame.as_bytes())
}

/// Output of a completed consumer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShown {
    /// Sequence of the received frame now on screen.
    pub sequence: u64,
}

/// [`SessionRole`] that composites received frames.
pub struct CompositeRole {
    worker: ReceiveWorker,
    shown: Option<u64>,
}

impl CompositeRole {
    pub fn new(worker: ReceiveWorker) -> Self {
        Self { worker, shown: None }
    }

    pub fn worker(&self) -> &ReceiveWorker {
        &self.worker
    }

    /// Sequence of the last composited frame.
    pub fn last_shown(&self) -> Option<u64> {
        self.shown
    }
}

impl<D: GraphicsDevice> SessionRole<D> for CompositeRole {
    type Output = FrameShown;

    fn prepare(&mut self, view: &mut ViewState) -> Result<(), StreamError> {
        self.worker.request(view.pose())
    }

    fn record(&mut self, device: &mut D, image: usize) -> Result<(), StreamError> {
        let frame = self.worker.join()?;
        let sequence = frame.sequence();
        let uploaded = upload_frame(device, image, &frame);
        self.worker.recycle(frame);
        uploaded?;

        device.record_composite(image)?;
        self.shown = Some(sequence);
        debug!(sequence, image, "frame composited");
        Ok(())
    }

    fn finish(&mut self, _device: &mut D, _image: usize) -> Result<FrameShown, StreamError> {
        let sequence = self
            .shown
            .ok_or_else(|| StreamError::device("no frame was composited this tick"))?;
        Ok(FrameShown { sequence })
    }
}

/// Rendering session that composites every frame it receives.
pub type FrameConsumer<D> = RenderSession<D, CompositeRole>;

impl<D: GraphicsDevice> RenderSession<D, CompositeRole> {
    /// Build a consumer session; spawns the receive worker.
    pub fn consumer<S>(
        device: D,
        receiver: FrameReceiver<S>,
        options: &SessionOptions,
    ) -> Result<Self, StreamError>
    where
        S: Read + Write + Send + 'static,
    {
        let worker = ReceiveWorker::spawn(receiver, options.pose_telemetry)?;
        RenderSession::new(device, CompositeRole::new(worker), options)
    }
}
