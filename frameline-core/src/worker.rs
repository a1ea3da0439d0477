//! Persistent receive worker for the viewer.
//!
//! The worker thread owns the [`FrameReceiver`]. The render thread posts
//! one request per tick (carrying the pose to send and an empty frame
//! buffer) and later joins on its completion; that join is the only point
//! where received bytes cross between threads. Both channels have
//! capacity one, and at most one request is outstanding at any time.

use std::io::{Read, Write};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::frame::Frame;
use crate::geometry::FrameGeometry;
use crate::pose::Pose;
use crate::transport::FrameReceiver;

const STATS_INTERVAL: Duration = Duration::from_secs(1);

struct FetchRequest {
    pose: Pose,
    frame: Frame,
}

type FetchResult = Result<Frame, StreamError>;

pub struct ReceiveWorker {
    requests: Option<Sender<FetchRequest>>,
    completions: Receiver<FetchResult>,
    geometry: FrameGeometry,
    spare: Option<Frame>,
    pending: bool,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveWorker {
    /// Start the worker thread. It runs until the session ends or the
    /// transport fails.
    pub fn spawn<S>(receiver: FrameReceiver<S>, pose_telemetry: bool) -> Result<Self, StreamError>
    where
        S: Read + Write + Send + 'static,
    {
        let geometry = receiver.geometry();
        let (request_tx, request_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("frame-receive".into())
            .spawn(move || run(receiver, pose_telemetry, request_rx, done_tx))
            .map_err(StreamError::resource("spawn receive worker"))?;

        Ok(Self {
            requests: Some(request_tx),
            completions: done_rx,
            geometry,
            spare: Some(Frame::zeroed(geometry)),
            pending: false,
            handle: Some(handle),
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Ask for the next frame, sending `pose` first if telemetry is on.
    pub fn request(&mut self, pose: &Pose) -> Result<(), StreamError> {
        if self.pending {
            return Err(StreamError::device("a receive request is already outstanding"));
        }
        let frame = self
            .spare
            .take()
            .unwrap_or_else(|| Frame::zeroed(self.geometry));
        let requests = self.requests.as_ref().ok_or(StreamError::WorkerStopped)?;
        requests
            .send(FetchRequest { pose: *pose, frame })
            .map_err(|_| StreamError::WorkerStopped)?;
        self.pending = true;
        Ok(())
    }

    /// Block until the outstanding request completes.
    ///
    /// A transport failure is returned exactly once; the worker is gone
    /// afterwards and later calls report [`StreamError::WorkerStopped`].
    pub fn join(&mut self) -> Result<Frame, StreamError> {
        if !self.pending {
            return Err(StreamError::device("no receive request outstanding"));
        }
        self.pending = false;
        match self.completions.recv() {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(e)) => {
                self.requests.take();
                Err(e)
            }
            Err(_) => Err(StreamError::WorkerStopped),
        }
    }

    /// Hand a joined frame buffer back for the next request.
    pub fn recycle(&mut self, frame: Frame) {
        if frame.geometry() == self.geometry {
            self.spare = Some(frame);
        }
    }
}

impl Drop for ReceiveWorker {
    fn drop(&mut self) {
        self.requests.take();
        // a pending request may be blocked on the socket indefinitely
        if self.pending {
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn fetch<S: Read + Write>(
    receiver: &mut FrameReceiver<S>,
    pose_telemetry: bool,
    pose: &Pose,
    frame: &mut Frame,
) -> Result<(), StreamError> {
    if pose_telemetry {
        receiver.send_pose(pose)?;
    }
    receiver.receive_into(frame)
}

fn run<S: Read + Write>(
    mut receiver: FrameReceiver<S>,
    pose_telemetry: bool,
    requests: Receiver<FetchRequest>,
    completions: Sender<FetchResult>,
) {
    let mut sequence = 0u64;
    let mut last_report = Instant::now();

    for FetchRequest { pose, mut frame } in requests.iter() {
        if let Err(e) = fetch(&mut receiver, pose_telemetry, &pose, &mut frame) {
            warn!(error = %e, "receive failed");
            let _ = completions.send(Err(e));
            return;
        }
        frame.set_sequence(sequence);
        debug!(sequence, "frame received");
        sequence += 1;

        if last_report.elapsed() >= STATS_INTERVAL {
            let s = receiver.stats();
            info!(
                fps = format_args!("{:.1}", s.frames_per_sec),
                mbps = format_args!("{:.1}", s.bytes_per_sec / 1e6),
                frames = s.total_frames,
                "receiving"
            );
            last_report = Instant::now();
        }

        if completions.send(Ok(frame)).is_err() {
            return;
        }
    }
    debug!("receive worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::ACK_BYTE;
    use crate::transport::testing::ScriptedStream;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Scripted stream whose written bytes stay observable after the
    /// worker thread takes ownership.
    struct SharedStream {
        inner: ScriptedStream,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for SharedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for SharedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn worker(input: &[u8], telemetry: bool) -> (ReceiveWorker, Arc<Mutex<Vec<u8>>>) {
        let g = FrameGeometry::new(4, 2, 2).unwrap();
        let written = Arc::new(Mutex::new(Vec::new()));
        let stream = SharedStream {
            inner: ScriptedStream::new(input),
            written: Arc::clone(&written),
        };
        let w = ReceiveWorker::spawn(FrameReceiver::new(stream, g), telemetry).unwrap();
        (w, written)
    }

    #[test]
    fn request_join_recycle_cycle() {
        let input: Vec<u8> = (0..64).collect();
        let (mut w, written) = worker(&input, true);

        for expected_seq in 0..2u64 {
            w.request(&Pose::default()).unwrap();
            let frame = w.join().unwrap();
            assert_eq!(frame.sequence(), expected_seq);
            let start = expected_seq as usize * 32;
            assert_eq!(frame.as_bytes(), &input[start..start + 32]);
            w.recycle(frame);
        }

        let written = written.lock().unwrap();
        // pose, ack, ack per frame
        assert_eq!(written.len(), 2 * (Pose::WIRE_SIZE + 2));
        assert_eq!(written[Pose::WIRE_SIZE], ACK_BYTE);
    }

    #[test]
    fn one_outstanding_request_at_a_time() {
        let (mut w, _) = worker(&[0u8; 32], false);
        assert!(w.join().is_err());
        w.request(&Pose::default()).unwrap();
        assert!(w.request(&Pose::default()).is_err());
        w.join().unwrap();
    }

    #[test]
    fn failure_is_reported_once_then_worker_is_stopped() {
        let (mut w, _) = worker(&[0u8; 20], false);
        w.request(&Pose::default()).unwrap();
        let err = w.join().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(err, StreamError::PeerClosed { .. }));

        let err = w.request(&Pose::default()).unwrap_err();
        assert!(matches!(err, StreamError::WorkerStopped));
    }
}
