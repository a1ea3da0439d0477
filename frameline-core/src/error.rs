//! Error types for the frame-streaming pipeline.
//!
//! Every fallible operation returns `Result<T, StreamError>`. Each variant
//! belongs to exactly one [`ErrorKind`]; all of them end the session.
//! A stale presentation surface is not an error and never shows up here.

use thiserror::Error;

use crate::geometry::FrameGeometry;
use crate::pool::SlotState;

// ── ErrorKind ────────────────────────────────────────────────────

/// Coarse classification of a [`StreamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Resource creation, configuration or geometry negotiation failed
    /// before any frame was streamed.
    Setup,
    /// The byte stream to the peer failed (short read, write error, hangup).
    Transport,
    /// The graphics device reported an unrecoverable failure, or the
    /// in-flight bookkeeping was driven through an illegal transition.
    Device,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Transport => write!(f, "transport"),
            Self::Device => write!(f, "device"),
        }
    }
}

// ── StreamError ──────────────────────────────────────────────────

/// The canonical error type for a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Setup Errors ─────────────────────────────────────────────
    /// Frame height cannot be split into equal row-aligned chunks.
    #[error("frame height {height} is not divisible into {chunks} chunks")]
    UnevenChunks { height: u32, chunks: u32 },

    /// A geometry field is out of range.
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(&'static str),

    /// The peer announced a geometry different from the local one.
    #[error("geometry mismatch: local {local}, peer {peer}")]
    GeometryMismatch {
        local: FrameGeometry,
        peer: FrameGeometry,
    },

    /// The setup exchange with the peer failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A buffer handed to the pipeline does not hold exactly one frame.
    #[error("invalid frame length: expected {expected}, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Encoding or decoding of a setup record failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A socket, listener or thread could not be created.
    #[error("{what} failed: {source}")]
    Resource {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    // ── Transport Errors ─────────────────────────────────────────
    /// The socket layer reported an error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before the expected bytes arrived.
    #[error("peer closed the connection after {received} of {expected} bytes")]
    PeerClosed { expected: usize, received: usize },

    /// The receive worker is gone; its session already failed.
    #[error("receive worker stopped")]
    WorkerStopped,

    // ── Device Errors ────────────────────────────────────────────
    /// The graphics device failed.
    #[error("device error: {0}")]
    Device(String),

    /// An in-flight slot was driven through an illegal state change.
    #[error("slot {slot}: illegal transition {from} -> {to}")]
    SlotTransition {
        slot: usize,
        from: SlotState,
        to: SlotState,
    },
}

impl StreamError {
    /// Which class of failure this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnevenChunks { .. }
            | Self::InvalidGeometry(_)
            | Self::GeometryMismatch { .. }
            | Self::Handshake(_)
            | Self::FrameLength { .. }
            | Self::InvalidConfig(_)
            | Self::Encoding(_)
            | Self::Resource { .. } => ErrorKind::Setup,
            Self::Io(_) | Self::PeerClosed { .. } | Self::WorkerStopped => ErrorKind::Transport,
            Self::Device(_) | Self::SlotTransition { .. } => ErrorKind::Device,
        }
    }

    /// Shorthand for building a [`StreamError::Device`].
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Wrap an I/O error raised while creating a session resource.
    pub fn resource(what: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Resource { what, source }
    }
}

impl From<Box<bincode::ErrorKind>> for StreamError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        StreamError::Encoding(e.to_string())
    }
}
