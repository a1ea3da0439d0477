//! Host service core logic.
//!
//! Validates the configured geometry, accepts exactly one viewer, runs
//! the setup handshake and then drives the producer session until the
//! frame budget is spent, the service is stopped, or the session fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use frameline_core::transport::handshake;
use frameline_core::{
    FrameProducer, FrameSender, SessionListener, SoftwareDevice, StreamError,
};

use crate::config::HostConfig;

// ── HostService ──────────────────────────────────────────────────

/// The top-level host service.
pub struct HostService {
    config: HostConfig,
    running: Arc<AtomicBool>,
}

impl HostService {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the service to stop after the current frame.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind the configured address and run one session.
    ///
    /// Returns the number of frames streamed.
    pub fn run(&self) -> Result<u64, StreamError> {
        // geometry problems must surface before anything touches the network
        self.config.geometry()?;
        self.config.session_options().validate()?;
        let listener = SessionListener::bind(self.config.network.listen_address.as_str())?;
        self.run_on(listener)
    }

    /// Run one session on an already bound listener.
    pub fn run_on(&self, listener: SessionListener) -> Result<u64, StreamError> {
        let geometry = self.config.geometry()?;
        let options = self.config.session_options();
        options.validate()?;
        self.running.store(true, Ordering::SeqCst);

        let (mut stream, peer) = listener.accept_one()?;
        handshake::offer(&mut stream, geometry, options.pose_telemetry)?;

        let device = SoftwareDevice::new(self.config.device_config(geometry))?;
        let sender = FrameSender::new(stream, geometry);
        let mut producer = FrameProducer::producer(device, sender, &options)?;

        let interval = self.config.frame_interval();
        let max_frames = self.config.performance.max_frames;
        info!(%peer, %geometry, ?interval, max_frames, "streaming");

        while self.is_running() && (max_frames == 0 || producer.completed() < max_frames) {
            let started = Instant::now();
            producer.tick()?;
            pace(started, interval);
        }
        producer.drain()?;

        let sent = producer.role().frames_sent();
        let stats = producer.role().sender().stats();
        self.running.store(false, Ordering::SeqCst);
        info!(
            frames = sent,
            bytes = stats.total_bytes,
            chunk_rtt = ?stats.chunk_rtt,
            "session with {peer} ended"
        );
        Ok(sent)
    }
}

/// Sleep out the rest of the frame interval.
fn pace(started: Instant, interval: Option<Duration>) {
    if let Some(interval) = interval {
        let elapsed = started.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}
