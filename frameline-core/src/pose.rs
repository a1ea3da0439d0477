//! Viewer pose telemetry and the render loop's view state.
//!
//! The viewer sends its [`Pose`] to the host once per requested frame as
//! a fixed 24-byte record (six little-endian `f32`s, no framing, no ack).
//! Input never mutates the pose directly: events are applied to the
//! [`ViewState`] owned by the render loop.

use std::time::Duration;

// ── Pose ─────────────────────────────────────────────────────────

/// Camera position and facing direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: [f32; 3],
    pub facing: [f32; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: [0.0, 2.0, 2.0],
            facing: [1.0, 0.0, 0.0],
        }
    }
}

impl Pose {
    /// Encoded size on the wire.
    pub const WIRE_SIZE: usize = 24;

    /// Serialize as `position.xyz, facing.xyz` (little-endian `f32`).
    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        let values = self.position.iter().chain(self.facing.iter());
        for (slot, v) in buf.chunks_exact_mut(4).zip(values) {
            slot.copy_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// Deserialize from the wire record.
    pub fn decode(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        let mut values = [0f32; 6];
        for (v, raw) in values.iter_mut().zip(buf.chunks_exact(4)) {
            *v = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }
        Self {
            position: [values[0], values[1], values[2]],
            facing: [values[3], values[4], values[5]],
        }
    }
}

// ── InputEvent ───────────────────────────────────────────────────

/// Direction of a movement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

/// A view update delivered to the render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Move along a direction for the duration of one tick.
    Move(Direction),
    /// Rotate the facing direction around the up axis.
    Turn { yaw_degrees: f32 },
    /// Replace the pose outright (e.g. telemetry from the viewer).
    SetPose(Pose),
}

// ── ViewState ────────────────────────────────────────────────────

const UP: [f32; 3] = [0.0, 1.0, 0.0];

/// Camera state owned by one render loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pose: Pose,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Pose::default())
    }
}

impl ViewState {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Apply one input event. `dt` is the duration of the current tick.
    pub fn apply(&mut self, event: &InputEvent, dt: Duration) {
        let speed = dt.as_millis() as f32 * 0.001;
        let p = &mut self.pose;
        match *event {
            InputEvent::Move(Direction::Forward) => p.position = add(p.position, scale(p.facing, speed)),
            InputEvent::Move(Direction::Back) => p.position = add(p.position, scale(p.facing, -speed)),
            InputEvent::Move(Direction::Up) => p.position[1] += speed * 0.4,
            InputEvent::Move(Direction::Down) => p.position[1] -= speed * 0.4,
            InputEvent::Move(Direction::Left) => {
                let side = normalize(cross(p.facing, UP));
                p.position = add(p.position, scale(side, -speed));
            }
            InputEvent::Move(Direction::Right) => {
                let side = normalize(cross(p.facing, UP));
                p.position = add(p.position, scale(side, speed));
            }
            InputEvent::Turn { yaw_degrees } => {
                let (s, c) = yaw_degrees.to_radians().sin_cos();
                let [x, y, z] = p.facing;
                p.facing = normalize([x * c - z * s, y, x * s + z * c]);
            }
            InputEvent::SetPose(pose) => *p = pose,
        }
    }
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(a: [f32; 3]) -> [f32; 3] {
    let len = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
    if len == 0.0 { a } else { scale(a, 1.0 / len) }
}
