//! Configuration for the frameline host.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use frameline_core::{FrameGeometry, SceneKind, SessionOptions, SoftwareConfig, StreamError};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Stream geometry and session knobs; must match the viewer's.
    pub stream: StreamConfig,
    /// Pacing and run length.
    pub performance: PerformanceConfig,
    /// Render device settings.
    pub device: DeviceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to accept the single viewer on.
    pub listen_address: String,
}

/// Stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub width: u32,
    /// Must be divisible by `chunks`.
    pub height: u32,
    /// Chunks per frame; each one is acknowledged before the next is sent.
    pub chunks: u32,
    /// Size of the in-flight ring (1..=4).
    pub frames_in_flight: usize,
    /// Expect a pose record from the viewer before every frame.
    pub pose_telemetry: bool,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Upper bound on frames per second; 0 disables pacing.
    pub target_fps: u32,
    /// Stop after this many frames; 0 streams until the viewer leaves.
    pub max_frames: u64,
}

/// Render device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Presentation images in the surface.
    pub image_count: usize,
    /// Simulated time between submit and completion, in milliseconds.
    pub latency_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:1234".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            chunks: 4,
            frames_in_flight: 2,
            pose_telemetry: true,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_frames: 0,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            latency_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Read configuration from a TOML file. `Ok(None)` when there is no
    /// file at `path`.
    pub fn read(path: &Path) -> Result<Option<Self>, StreamError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StreamError::InvalidConfig(format!("{}: {e}", path.display())));
            }
        };
        toml::from_str(&contents)
            .map(Some)
            .map_err(|e| StreamError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Validated frame geometry.
    pub fn geometry(&self) -> Result<FrameGeometry, StreamError> {
        FrameGeometry::new(self.stream.width, self.stream.height, self.stream.chunks)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            frames_in_flight: self.stream.frames_in_flight,
            pose_telemetry: self.stream.pose_telemetry,
        }
    }

    pub fn device_config(&self, geometry: FrameGeometry) -> SoftwareConfig {
        SoftwareConfig::new(geometry, SceneKind::Pattern)
            .with_image_count(self.device.image_count)
            .with_latency(Duration::from_millis(self.device.latency_ms))
    }

    /// Minimum time per frame, if pacing is enabled.
    pub fn frame_interval(&self) -> Option<Duration> {
        match self.performance.target_fps {
            0 => None,
            fps => Some(Duration::from_secs_f64(1.0 / f64::from(fps))),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
