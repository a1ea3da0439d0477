//! Viewer configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use frameline_core::{FrameGeometry, SceneKind, SessionOptions, SoftwareConfig, StreamError};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Stream geometry and session knobs; must match the host's.
    pub stream: StreamConfig,
    /// Presentation settings.
    pub display: DisplayConfig,
    /// Local input.
    pub input: InputConfig,
    /// Debug dumps of presented images.
    pub snapshot: SnapshotConfig,
    /// Run length.
    pub performance: PerformanceConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host address (IP:port).
    pub host_address: String,
}

/// Stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub width: u32,
    /// Must be divisible by `chunks`.
    pub height: u32,
    pub chunks: u32,
    /// Size of the in-flight ring (1..=4).
    pub frames_in_flight: usize,
    /// Send the local pose before every frame request.
    pub pose_telemetry: bool,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Presentation images in the surface.
    pub image_count: usize,
    /// Simulated time between submit and completion, in milliseconds.
    pub latency_ms: u64,
}

/// Input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Drive the view from a scripted input sequence.
    pub autopilot: bool,
    /// Degrees turned per turn key press.
    pub turn_rate_deg: f32,
    /// Frame after which the autopilot resizes the window; 0 = never.
    pub resize_at: u64,
}

/// Snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Output path; `{n}` is replaced by the frame sequence. Empty disables.
    pub path: String,
    /// Write every n-th frame; 0 disables.
    pub every: u64,
}

/// Performance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Stop after this many frames; 0 runs until the host goes away.
    pub max_frames: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host_address: "127.0.0.1:1234".into(),
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

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            latency_ms: 0,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            autopilot: true,
            turn_rate_deg: 2.0,
            resize_at: 0,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            every: 0,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { max_frames: 0 }
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

impl ViewerConfig {
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

    /// Write the default configuration to a file.
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
        SoftwareConfig::new(geometry, SceneKind::Overlay)
            .with_image_count(self.display.image_count)
            .with_latency(Duration::from_millis(self.display.latency_ms))
    }

    /// Snapshot path for frame `sequence`, if one is due.
    pub fn snapshot_path(&self, sequence: u64) -> Option<String> {
        let s = &self.snapshot;
        if s.path.is_empty() || s.every == 0 || sequence % s.every != 0 {
            return None;
        }
        Some(s.path.replace("{n}", &sequence.to_string()))
    }
}
