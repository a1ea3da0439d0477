//! Viewer service core logic.
//!
//! Connects to the host once, validates the session with the setup
//! handshake and then drives the consumer session: window input is
//! folded into the view state, resizes are forwarded to the surface, and
//! every presented frame can optionally be dumped to disk.

use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use frameline_core::transport::{connect, handshake};
use frameline_core::{FrameConsumer, FrameReceiver, SoftwareDevice, StreamError, TickOutcome};

use crate::config::ViewerConfig;
use crate::input::{Autopilot, InputAction, translate_event};
use crate::snapshot;

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerReport {
    pub frames: u64,
    pub rebuilds: u64,
    pub snapshots: u64,
}

// ── ViewerService ────────────────────────────────────────────────

pub struct ViewerService {
    config: ViewerConfig,
    running: Arc<AtomicBool>,
}

impl ViewerService {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the viewer from another
    /// thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect to the configured host and run one session.
    pub fn run(&self) -> Result<ViewerReport, StreamError> {
        self.config.geometry()?;
        self.config.session_options().validate()?;
        let stream = connect(self.config.network.host_address.as_str())?;
        self.run_with(stream)
    }

    /// Run one session over an established connection.
    pub fn run_with(&self, mut stream: TcpStream) -> Result<ViewerReport, StreamError> {
        let geometry = self.config.geometry()?;
        let options = self.config.session_options();
        options.validate()?;
        self.running.store(true, Ordering::SeqCst);

        handshake::accept(&mut stream, geometry, options.pose_telemetry)?;

        let device = SoftwareDevice::new(self.config.device_config(geometry))?;
        let surface = device.surface();
        let receiver = FrameReceiver::new(stream, geometry);
        let mut consumer = FrameConsumer::consumer(device, receiver, &options)?;

        let mut autopilot = self
            .config
            .input
            .autopilot
            .then(|| Autopilot::new(self.config.input.resize_at));
        let turn_rate = self.config.input.turn_rate_deg;
        let max_frames = self.config.performance.max_frames;
        let mut snapshots = 0u64;
        let mut last_tick = Instant::now();

        while self.is_running() && (max_frames == 0 || consumer.completed() < max_frames) {
            let dt = last_tick.elapsed();
            last_tick = Instant::now();

            if let Some(pilot) = autopilot.as_mut() {
                for event in pilot.poll() {
                    match translate_event(&event, turn_rate) {
                        InputAction::View(e) => consumer.apply_input(&e, dt),
                        InputAction::Resize(w, h) => surface.resize(w, h),
                        InputAction::Quit => self.stop(),
                    }
                }
            }

            let (image, sequence) = match consumer.tick()? {
                TickOutcome::Rebuilt => continue,
                TickOutcome::Completed { image, output, .. } => (image, output.sequence),
            };

            if let Some(path) = self.config.snapshot_path(sequence) {
                let pixels = consumer.device().image(image);
                match snapshot::write_ppm(Path::new(&path), geometry.width(), geometry.height(), pixels) {
                    Ok(()) => {
                        snapshots += 1;
                        debug!(sequence, %path, "snapshot written");
                    }
                    Err(e) => warn!("failed to write snapshot {path}: {e}"),
                }
            }
        }
        consumer.drain()?;
        self.running.store(false, Ordering::SeqCst);

        let report = ViewerReport {
            frames: consumer.completed(),
            rebuilds: consumer.lifecycle().rebuilds(),
            snapshots,
        };
        info!(
            frames = report.frames,
            rebuilds = report.rebuilds,
            snapshots = report.snapshots,
            "session ended"
        );
        Ok(report)
    }
}
