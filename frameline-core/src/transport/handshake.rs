//! One-shot session setup exchange.
//!
//! Right after the connection is established the host announces the
//! session parameters; the viewer checks them against its own
//! configuration and answers with a single verdict byte. Nothing else
//! is ever negotiated, and no frame byte is sent before a positive
//! verdict.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StreamError;
use crate::geometry::FrameGeometry;
use crate::transport::lockstep::read_full;

/// Verdict byte: session accepted.
pub const ACCEPT: u8 = 1;
/// Verdict byte: session rejected; the viewer closes right after.
pub const REJECT: u8 = 0;

/// Session parameters announced by the host (bincode, fixed size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHello {
    pub magic: [u8; 4],
    pub version: u16,
    pub width: u32,
    pub height: u32,
    pub chunks: u32,
    pub pose_telemetry: bool,
}

impl SessionHello {
    pub const MAGIC: [u8; 4] = *b"FLN1";
    pub const VERSION: u16 = 1;
    /// Encoded size: 4 + 2 + 4 + 4 + 4 + 1.
    pub const SIZE: usize = 19;

    pub fn new(geometry: FrameGeometry, pose_telemetry: bool) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            width: geometry.width(),
            height: geometry.height(),
            chunks: geometry.chunks(),
            pose_telemetry,
        }
    }

    /// Re-validate the announced geometry.
    pub fn geometry(&self) -> Result<FrameGeometry, StreamError> {
        FrameGeometry::new(self.width, self.height, self.chunks)
    }

    pub fn encode(&self) -> Result<Vec<u8>, StreamError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StreamError> {
        let hello: Self = bincode::deserialize(bytes)?;
        if hello.magic != Self::MAGIC {
            return Err(StreamError::Handshake(format!(
                "bad magic {:02x?}",
                hello.magic
            )));
        }
        if hello.version != Self::VERSION {
            return Err(StreamError::Handshake(format!(
                "unsupported version {}",
                hello.version
            )));
        }
        Ok(hello)
    }
}

/// Host side: announce the session and wait for the viewer's verdict.
pub fn offer<S: Read + Write>(
    stream: &mut S,
    geometry: FrameGeometry,
    pose_telemetry: bool,
) -> Result<(), StreamError> {
    let hello = SessionHello::new(geometry, pose_telemetry);
    stream.write_all(&hello.encode()?)?;
    stream.flush()?;

    let mut verdict = [0u8; 1];
    read_full(stream, &mut verdict)?;
    if verdict[0] != ACCEPT {
        return Err(StreamError::Handshake("viewer rejected the session".into()));
    }
    info!(%geometry, pose_telemetry, "session accepted by viewer");
    Ok(())
}

/// Viewer side: read the host's announcement and accept it only if it
/// matches the local configuration exactly.
pub fn accept<S: Read + Write>(
    stream: &mut S,
    expected: FrameGeometry,
    pose_telemetry: bool,
) -> Result<SessionHello, StreamError> {
    let mut buf = [0u8; SessionHello::SIZE];
    read_full(stream, &mut buf)?;

    let verdict = SessionHello::decode(&buf).and_then(|hello| {
        let peer = hello.geometry()?;
        if peer != expected {
            return Err(StreamError::GeometryMismatch {
                local: expected,
                peer,
            });
        }
        if hello.pose_telemetry != pose_telemetry {
            return Err(StreamError::Handshake(format!(
                "pose telemetry is {} on the host but {} locally",
                hello.pose_telemetry, pose_telemetry
            )));
        }
        Ok(hello)
    });

    match verdict {
        Ok(hello) => {
            stream.write_all(&[ACCEPT])?;
            stream.flush()?;
            info!(geometry = %expected, pose_telemetry, "session accepted");
            Ok(hello)
        }
        Err(e) => {
            warn!("rejecting session: {e}");
            // best effort; the session is over either way
            let _ = stream.write_all(&[REJECT]).and_then(|_| stream.flush());
            Err(e)
        }
    }
}
