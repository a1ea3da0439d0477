//! Integration tests: full producer/consumer sessions, lockstep
//! exchange and failure scenarios over a real TCP connection on
//! localhost, plus slot-reuse checks with controllable fences.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use frameline_core::gpu::pattern_pixel;
use frameline_core::transport::{ACK_BYTE, connect, handshake};
use frameline_core::{
    ErrorKind, Fence, FrameConsumer, FrameGeometry, FrameProducer, FrameReceiver, FrameSender,
    InFlightPool, Pose, SceneKind, SessionListener, SessionOptions, SoftwareConfig,
    SoftwareDevice, StreamError, TickOutcome,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Connected `(host, viewer)` stream pair on an OS-assigned port.
fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = SessionListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let viewer = thread::spawn(move || connect(addr).unwrap());
    let (host, _) = listener.accept_one().unwrap();
    (host, viewer.join().unwrap())
}

fn pattern_frame(g: FrameGeometry, seed: u8) -> Vec<u8> {
    (0..g.frame_len())
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn options(pose_telemetry: bool) -> SessionOptions {
    SessionOptions {
        frames_in_flight: 2,
        pose_telemetry,
    }
}

// ── Scenario A: lockstep round trips ─────────────────────────────

#[test]
fn test_lockstep_frames_arrive_intact() {
    let g = FrameGeometry::new(4, 4, 2).unwrap();
    assert_eq!(g.chunk_len(), 32);
    let (host, viewer) = tcp_pair();

    let frames: Vec<Vec<u8>> = (0..3).map(|seed| pattern_frame(g, seed)).collect();
    let sent = frames.clone();
    let producer = thread::spawn(move || {
        let mut sender = FrameSender::new(host, g);
        for frame in &sent {
            sender.send_frame(frame).unwrap();
        }
        sender.stats()
    });

    let mut receiver = FrameReceiver::new(viewer, g);
    for expected in &frames {
        let frame = receiver.receive_frame().unwrap();
        assert_eq!(frame.as_bytes(), expected.as_slice());
    }

    let stats = producer.join().unwrap();
    assert_eq!(stats.total_frames, 3);
    assert_eq!(stats.total_bytes, 3 * g.frame_len() as u64);
}

#[test]
fn test_sender_waits_for_each_ack() {
    let g = FrameGeometry::new(4, 4, 2).unwrap();
    let (host, mut viewer) = tcp_pair();

    let producer = thread::spawn(move || {
        let mut sender = FrameSender::new(host, g);
        sender.send_frame(&pattern_frame(g, 7)).unwrap();
    });

    let mut chunk = [0u8; 32];
    viewer.read_exact(&mut chunk).unwrap();

    // the second chunk must not be on the wire before the first ack
    viewer
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    let mut probe = [0u8; 1];
    assert!(viewer.read(&mut probe).is_err());

    viewer.set_read_timeout(None).unwrap();
    viewer.write_all(&[ACK_BYTE]).unwrap();
    viewer.read_exact(&mut chunk).unwrap();
    viewer.write_all(&[ACK_BYTE]).unwrap();
    producer.join().unwrap();
}

// ── Scenario B: peer closes mid-frame ────────────────────────────

#[test]
fn test_peer_close_mid_frame_is_transport_error() {
    let g = FrameGeometry::new(4, 4, 2).unwrap();
    let (mut host, viewer) = tcp_pair();

    let producer = thread::spawn(move || {
        host.write_all(&pattern_frame(g, 1)[..32]).unwrap();
        let mut ack = [0u8; 1];
        host.read_exact(&mut ack).unwrap();
        // drop: connection closes after chunk 0
    });

    let mut receiver = FrameReceiver::new(viewer, g);
    let err = receiver.receive_frame().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(matches!(err, StreamError::PeerClosed { received: 0, .. }));
    assert_eq!(receiver.stats().total_frames, 0);
    producer.join().unwrap();
}

// ── Setup ────────────────────────────────────────────────────────

#[test]
fn test_uneven_chunking_fails_before_connecting() {
    let err = FrameGeometry::new(1920, 1080, 7).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Setup);
    assert!(matches!(
        err,
        StreamError::UnevenChunks {
            height: 1080,
            chunks: 7
        }
    ));
}

#[test]
fn test_handshake_rejects_geometry_mismatch() {
    let host_geometry = FrameGeometry::new(16, 8, 2).unwrap();
    let viewer_geometry = FrameGeometry::new(16, 8, 4).unwrap();
    let (mut host, mut viewer) = tcp_pair();

    let offer = thread::spawn(move || handshake::offer(&mut host, host_geometry, true));
    let err = handshake::accept(&mut viewer, viewer_geometry, true).unwrap_err();
    assert!(matches!(err, StreamError::GeometryMismatch { .. }));

    let err = offer.join().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Setup);
}

// ── Full sessions ────────────────────────────────────────────────

/// Host session over `stream` for `frames` completed ticks.
fn run_host(mut stream: TcpStream, g: FrameGeometry, frames: u64) -> Result<u64, StreamError> {
    handshake::offer(&mut stream, g, true)?;
    let device = SoftwareDevice::new(SoftwareConfig::new(g, SceneKind::Pattern))?;
    let mut producer = FrameProducer::producer(device, FrameSender::new(stream, g), &options(true))?;
    while producer.completed() < frames {
        producer.tick()?;
    }
    producer.drain()?;
    Ok(producer.role().frames_sent())
}

#[test]
fn test_session_end_to_end() {
    let g = FrameGeometry::new(16, 8, 4).unwrap();
    let (host, mut viewer) = tcp_pair();
    let producer = thread::spawn(move || run_host(host, g, 4));

    handshake::accept(&mut viewer, g, true).unwrap();
    let device = SoftwareDevice::new(SoftwareConfig::new(g, SceneKind::Overlay)).unwrap();
    let mut consumer =
        FrameConsumer::consumer(device, FrameReceiver::new(viewer, g), &options(true)).unwrap();

    let pose = Pose::default();
    for expected in 0..4u64 {
        let shown = consumer.tick().unwrap().output().unwrap();
        assert_eq!(shown.sequence, expected);

        // outside the local marker the host's pixels show through unchanged
        let image = consumer.device().last_presented().unwrap();
        let pixels = consumer.device().image(image);
        assert_eq!(&pixels[0..4], &pattern_pixel(0, 0, &pose, expected));
        let last = g.frame_len() - 4;
        assert_eq!(&pixels[last..], &pattern_pixel(15, 7, &pose, expected));
    }

    assert_eq!(producer.join().unwrap().unwrap(), 4);
}

// ── Scenario D: resize mid-stream ────────────────────────────────

#[test]
fn test_resize_costs_one_tick_and_keeps_session() {
    let g = FrameGeometry::new(16, 8, 2).unwrap();
    let (host, mut viewer) = tcp_pair();
    let producer = thread::spawn(move || run_host(host, g, 5));

    handshake::accept(&mut viewer, g, true).unwrap();
    let device = SoftwareDevice::new(SoftwareConfig::new(g, SceneKind::Overlay)).unwrap();
    let mut consumer =
        FrameConsumer::consumer(device, FrameReceiver::new(viewer, g), &options(true)).unwrap();

    let mut rebuilt = 0;
    let mut shown = Vec::new();
    let mut ticks = 0;
    while shown.len() < 5 {
        if ticks == 2 {
            consumer.device().surface().resize(1280, 720);
        }
        match consumer.tick().unwrap() {
            TickOutcome::Rebuilt => rebuilt += 1,
            TickOutcome::Completed { output, .. } => shown.push(output.sequence),
        }
        ticks += 1;
    }

    assert_eq!(rebuilt, 1);
    assert_eq!(shown, vec![0, 1, 2, 3, 4]);
    assert_eq!(consumer.device().generation(), 1);
    assert_eq!(producer.join().unwrap().unwrap(), 5);
}

// ── Scenario C: slot reuse ───────────────────────────────────────

/// Fence signaled by a background thread some time after submission.
/// Waits are logged by fence id.
#[derive(Clone)]
struct DelayedFence {
    id: usize,
    state: Arc<(Mutex<bool>, Condvar)>,
    waits: Arc<Mutex<Vec<usize>>>,
}

impl DelayedFence {
    fn new(id: usize, waits: &Arc<Mutex<Vec<usize>>>) -> Self {
        Self {
            id,
            state: Arc::new((Mutex::new(true), Condvar::new())),
            waits: Arc::clone(waits),
        }
    }

    fn signal_after(&self, delay: Duration) -> thread::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        thread::spawn(move || {
            thread::sleep(delay);
            *state.0.lock().unwrap() = true;
            state.1.notify_all();
        })
    }
}

impl Fence for DelayedFence {
    fn is_signaled(&self) -> bool {
        *self.state.0.lock().unwrap()
    }

    fn wait(&self) -> Result<(), StreamError> {
        self.waits.lock().unwrap().push(self.id);
        let guard = self.state.0.lock().unwrap();
        let _guard = self.state.1.wait_while(guard, |s| !*s).unwrap();
        Ok(())
    }

    fn reset(&self) {
        *self.state.0.lock().unwrap() = false;
    }
}

#[test]
fn test_slot_reuse_waits_for_prior_fence() {
    let waits = Arc::new(Mutex::new(Vec::new()));
    let fences: Vec<DelayedFence> = (0..3).map(|id| DelayedFence::new(id, &waits)).collect();
    let mut pool = InFlightPool::new(fences, 3).unwrap();

    let delay = Duration::from_millis(20);
    let mut slots = Vec::new();

    for tick in 0..10 {
        // the device retires a reused slot's previous work only after `delay`
        let signaler = (tick >= 3).then(|| pool.fence(pool.current()).signal_after(delay));
        let started = Instant::now();

        let ticket = pool.begin().unwrap();
        if let Some(signaler) = signaler {
            assert!(ticket.waited, "tick {tick} reused slot {} without waiting", ticket.slot);
            assert!(started.elapsed() >= delay);
            assert!(pool.fence(ticket.slot).is_signaled());
            signaler.join().unwrap();
        } else {
            assert!(!ticket.waited);
        }

        pool.bind_image(tick % 3).unwrap();
        let fence = pool.submit_with(|fence| Ok(fence.clone())).unwrap();
        assert_eq!(fence.id, ticket.slot);
        assert!(!fence.is_signaled());
        pool.mark_presented().unwrap();
        slots.push(ticket.slot);
    }

    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    // every reuse waited on exactly the fence of the slot it re-entered
    assert_eq!(*waits.lock().unwrap(), vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_unsignaled_fence_blocks_pipeline() {
    let waits = Arc::new(Mutex::new(Vec::new()));
    let fences: Vec<DelayedFence> = (0..2).map(|id| DelayedFence::new(id, &waits)).collect();
    let mut pool = InFlightPool::new(fences, 2).unwrap();

    pool.begin().unwrap();
    pool.bind_image(0).unwrap();
    let slow = pool.submit_with(|fence| Ok(fence.clone())).unwrap();
    pool.mark_presented().unwrap();

    pool.begin().unwrap();
    pool.bind_image(1).unwrap();
    let fast = pool.submit_with(|fence| Ok(fence.clone())).unwrap();
    pool.mark_presented().unwrap();
    let fast_signal = fast.signal_after(Duration::ZERO);

    let started = Instant::now();
    let slow_signal = slow.signal_after(Duration::from_millis(80));
    let ticket = pool.begin().unwrap();
    assert_eq!(ticket.slot, 0);
    assert!(ticket.waited);
    assert!(started.elapsed() >= Duration::from_millis(80));

    slow_signal.join().unwrap();
    fast_signal.join().unwrap();
}
