//! CPU implementation of [`GraphicsDevice`].
//!
//! Recorded commands execute on the host at submit time; fences are
//! retired by a completion thread after a configurable latency, so fence
//! waits behave like waits on a real queue. Readback rows are padded to
//! [`READBACK_ALIGNMENT`] bytes, the way linear-tiled device images are.
//!
//! The streamed render target keeps the session geometry for its whole
//! life; only presentation resources follow the surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::error::StreamError;
use crate::geometry::{BYTES_PER_PIXEL, FrameGeometry};
use crate::gpu::device::{Acquire, GraphicsDevice, PresentStatus};
use crate::gpu::fence::{CpuFence, Fence};
use crate::gpu::memory::HostVisibleMemory;
use crate::pose::{Pose, ViewState};

/// Row alignment of the readback buffer.
pub const READBACK_ALIGNMENT: usize = 256;

/// Side length of the viewer's local marker, in pixels.
pub const OVERLAY_SIZE: u32 = 8;

// ── Scene ────────────────────────────────────────────────────────

/// What [`GraphicsDevice::record_scene`] draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    /// Opaque full-frame pattern driven by pose and scene tick (host).
    Pattern,
    /// Opaque square marker at the centre over a transparent layer (viewer).
    Overlay,
}

/// Host scene colour at `(x, y)` for the `tick`-th recorded scene.
pub fn pattern_pixel(x: u32, y: u32, pose: &Pose, tick: u64) -> [u8; 4] {
    let shift_x = (pose.position[0] * 32.0) as i64;
    let shift_y = (pose.position[1] * 32.0) as i64;
    [
        (x as i64 + shift_x + tick as i64) as u8,
        (y as i64 + shift_y) as u8,
        tick.wrapping_mul(7) as u8,
        0xFF,
    ]
}

/// Viewer scene colour at `(x, y)` on a `width`×`height` target.
pub fn overlay_pixel(x: u32, y: u32, width: u32, height: u32) -> [u8; 4] {
    let size = OVERLAY_SIZE.min(width).min(height);
    let x0 = (width - size) / 2;
    let y0 = (height - size) / 2;
    if (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y) {
        [0xFF; 4]
    } else {
        [0; 4]
    }
}

// ── Surface ──────────────────────────────────────────────────────

/// Window-system side of the presentation surface.
///
/// The window/input layer calls [`resize`](Self::resize); the device
/// reports the surface out of date until it is rebuilt.
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    inner: Arc<SurfaceShared>,
}

#[derive(Debug)]
struct SurfaceShared {
    stale: AtomicBool,
    extent: Mutex<(u32, u32)>,
}

impl SurfaceHandle {
    fn new(extent: (u32, u32)) -> Self {
        Self {
            inner: Arc::new(SurfaceShared {
                stale: AtomicBool::new(false),
                extent: Mutex::new(extent),
            }),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self
            .inner
            .extent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = (width, height);
        self.inner.stale.store(true, Ordering::SeqCst);
    }

    pub fn extent(&self) -> (u32, u32) {
        *self
            .inner
            .extent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self) -> bool {
        self.inner.stale.load(Ordering::SeqCst)
    }

    fn clear_stale(&self) {
        self.inner.stale.store(false, Ordering::SeqCst);
    }
}

// ── SoftwareConfig ───────────────────────────────────────────────

/// Construction parameters for [`SoftwareDevice`].
#[derive(Debug, Clone)]
pub struct SoftwareConfig {
    pub geometry: FrameGeometry,
    /// Presentation images in the surface.
    pub image_count: usize,
    pub scene: SceneKind,
    /// Delay between submit and fence signal.
    pub latency: Duration,
}

impl SoftwareConfig {
    pub fn new(geometry: FrameGeometry, scene: SceneKind) -> Self {
        Self {
            geometry,
            image_count: 3,
            scene,
            latency: Duration::ZERO,
        }
    }

    pub fn with_image_count(mut self, image_count: usize) -> Self {
        self.image_count = image_count;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

// ── SoftwareDevice ───────────────────────────────────────────────

enum Command {
    Scene { pose: Pose, tick: u64 },
    Composite,
}

struct Completion {
    fence: CpuFence,
    due: Instant,
}

/// Host-memory graphics device.
pub struct SoftwareDevice {
    config: SoftwareConfig,
    images: Vec<Vec<u8>>,
    sampled: Vec<Vec<u8>>,
    uploads: Vec<HostVisibleMemory>,
    readback: HostVisibleMemory,
    readback_stride: usize,
    recorded: Vec<Vec<Command>>,
    image_fences: Vec<Option<CpuFence>>,
    next_image: usize,
    scene_ticks: u64,
    surface: SurfaceHandle,
    generation: u64,
    presented: u64,
    last_presented: Option<usize>,
    fail_next_capture: bool,
    retire_tx: Option<Sender<Completion>>,
    retirer: Option<JoinHandle<()>>,
}

impl SoftwareDevice {
    pub fn new(config: SoftwareConfig) -> Result<Self, StreamError> {
        if config.image_count == 0 {
            return Err(StreamError::InvalidConfig(
                "image_count must be at least 1".into(),
            ));
        }
        let g = config.geometry;
        let readback_stride = g.row_len().next_multiple_of(READBACK_ALIGNMENT);
        let (retire_tx, retirer) = if config.latency.is_zero() {
            (None, None)
        } else {
            let (tx, handle) = spawn_retirer()?;
            (Some(tx), Some(handle))
        };

        let mut device = Self {
            surface: SurfaceHandle::new((g.width(), g.height())),
            readback: HostVisibleMemory::new(readback_stride * g.height() as usize),
            readback_stride,
            images: Vec::new(),
            sampled: Vec::new(),
            uploads: Vec::new(),
            recorded: Vec::new(),
            image_fences: Vec::new(),
            next_image: 0,
            scene_ticks: 0,
            generation: 0,
            presented: 0,
            last_presented: None,
            fail_next_capture: false,
            retire_tx,
            retirer,
            config,
        };
        device.allocate_surface_resources();
        Ok(device)
    }

    /// Handle the window system uses to report resizes.
    pub fn surface(&self) -> SurfaceHandle {
        self.surface.clone()
    }

    /// Contents of presentation image `index`.
    pub fn image(&self, index: usize) -> &[u8] {
        &self.images[index]
    }

    pub fn last_presented(&self) -> Option<usize> {
        self.last_presented
    }

    pub fn presented_count(&self) -> u64 {
        self.presented
    }

    /// Number of surface rebuilds so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Scenes recorded so far; the next scene uses this tick.
    pub fn scene_ticks(&self) -> u64 {
        self.scene_ticks
    }

    /// Make the next [`copy_to_readback`](GraphicsDevice::copy_to_readback) fail.
    pub fn inject_capture_failure(&mut self) {
        self.fail_next_capture = true;
    }

    fn allocate_surface_resources(&mut self) {
        let n = self.config.image_count;
        let len = self.config.geometry.frame_len();
        self.images = vec![vec![0u8; len]; n];
        self.sampled = vec![vec![0u8; len]; n];
        self.uploads = (0..n).map(|_| HostVisibleMemory::new(len)).collect();
        self.recorded = (0..n).map(|_| Vec::new()).collect();
        self.image_fences = vec![None; n];
        self.next_image = 0;
    }

    fn check_image(&self, image: usize) -> Result<(), StreamError> {
        if image >= self.images.len() {
            return Err(StreamError::device(format!(
                "image {image} out of range ({} images)",
                self.images.len()
            )));
        }
        Ok(())
    }

    fn draw_scene(&mut self, image: usize, pose: &Pose, tick: u64) {
        let g = self.config.geometry;
        let (w, h) = (g.width(), g.height());
        let target = &mut self.images[image];
        for (i, px) in target.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let x = (i % w as usize) as u32;
            let y = (i / w as usize) as u32;
            let colour = match self.config.scene {
                SceneKind::Pattern => pattern_pixel(x, y, pose, tick),
                SceneKind::Overlay => overlay_pixel(x, y, w, h),
            };
            px.copy_from_slice(&colour);
        }
    }

    fn composite(&mut self, image: usize) {
        self.sampled[image].copy_from_slice(self.uploads[image].device_bytes());
        let remote = &self.sampled[image];
        let target = &mut self.images[image];
        for (local, remote) in target
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(remote.chunks_exact(BYTES_PER_PIXEL))
        {
            let a = local[3] as u32;
            for c in 0..3 {
                local[c] = ((local[c] as u32 * a + remote[c] as u32 * (255 - a) + 127) / 255) as u8;
            }
            local[3] = 0xFF;
        }
    }
}

fn spawn_retirer() -> Result<(Sender<Completion>, JoinHandle<()>), StreamError> {
    let (tx, rx) = crossbeam_channel::unbounded::<Completion>();
    let handle = thread::Builder::new()
        .name("device-retire".into())
        .spawn(move || {
            for done in rx.iter() {
                let now = Instant::now();
                if done.due > now {
                    thread::sleep(done.due - now);
                }
                done.fence.signal();
            }
        })
        .map_err(|e| StreamError::device(format!("failed to spawn retire thread: {e}")))?;
    Ok((tx, handle))
}

impl GraphicsDevice for SoftwareDevice {
    type Fence = CpuFence;

    fn create_fence(&mut self) -> Result<CpuFence, StreamError> {
        Ok(CpuFence::new(true))
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn acquire_next_image(&mut self) -> Result<Acquire, StreamError> {
        if self.surface.is_stale() {
            return Ok(Acquire::OutOfDate);
        }
        let image = self.next_image;
        self.next_image = (image + 1) % self.images.len();
        Ok(Acquire::Image(image))
    }

    fn record_scene(&mut self, image: usize, view: &ViewState) -> Result<(), StreamError> {
        self.check_image(image)?;
        self.recorded[image].push(Command::Scene {
            pose: *view.pose(),
            tick: self.scene_ticks,
        });
        self.scene_ticks += 1;
        Ok(())
    }

    fn upload_memory(&mut self, image: usize) -> &mut HostVisibleMemory {
        &mut self.uploads[image]
    }

    fn record_composite(&mut self, image: usize) -> Result<(), StreamError> {
        self.check_image(image)?;
        self.recorded[image].push(Command::Composite);
        Ok(())
    }

    fn submit(&mut self, image: usize, fence: &CpuFence) -> Result<(), StreamError> {
        self.check_image(image)?;
        for command in std::mem::take(&mut self.recorded[image]) {
            match command {
                Command::Scene { pose, tick } => self.draw_scene(image, &pose, tick),
                Command::Composite => self.composite(image),
            }
        }
        self.image_fences[image] = Some(fence.clone());

        match &self.retire_tx {
            None => fence.signal(),
            Some(tx) => tx
                .send(Completion {
                    fence: fence.clone(),
                    due: Instant::now() + self.config.latency,
                })
                .map_err(|_| StreamError::device("retire thread is gone"))?,
        }
        debug!(image, "submitted");
        Ok(())
    }

    fn present(&mut self, image: usize) -> Result<PresentStatus, StreamError> {
        self.check_image(image)?;
        if self.surface.is_stale() {
            return Ok(PresentStatus::OutOfDate);
        }
        self.presented += 1;
        self.last_presented = Some(image);
        Ok(PresentStatus::Presented)
    }

    fn copy_to_readback(&mut self, image: usize) -> Result<usize, StreamError> {
        self.check_image(image)?;
        if std::mem::take(&mut self.fail_next_capture) {
            return Err(StreamError::device("readback copy failed"));
        }
        if let Some(fence) = &self.image_fences[image] {
            fence.wait()?;
        }

        let row_len = self.config.geometry.row_len();
        let stride = self.readback_stride;
        let src = &self.images[image];
        let dst = self.readback.device_bytes_mut();
        for (y, row) in src.chunks_exact(row_len).enumerate() {
            dst[y * stride..y * stride + row_len].copy_from_slice(row);
        }
        Ok(stride)
    }

    fn readback_memory(&mut self) -> &mut HostVisibleMemory {
        &mut self.readback
    }

    fn wait_idle(&mut self) -> Result<(), StreamError> {
        for fence in self.image_fences.iter().flatten() {
            fence.wait()?;
        }
        Ok(())
    }

    fn rebuild_surface(&mut self) -> Result<(), StreamError> {
        self.wait_idle()?;
        let (width, height) = self.surface.extent();
        self.allocate_surface_resources();
        self.surface.clear_stale();
        self.generation += 1;
        info!(
            width,
            height,
            images = self.images.len(),
            generation = self.generation,
            "surface rebuilt"
        );
        Ok(())
    }
}

impl Drop for SoftwareDevice {
    fn drop(&mut self) {
        // closing the channel lets the retire thread drain and exit
        self.retire_tx.take();
        if let Some(handle) = self.retirer.take() {
            let _ = handle.join();
        }
    }
}
