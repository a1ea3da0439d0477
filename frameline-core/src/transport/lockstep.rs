//! Chunked frame exchange in per-chunk lockstep.
//!
//! The sender writes chunk `i` and then blocks until the receiver's
//! single acknowledgment byte arrives; only then may chunk `i + 1` go
//! out. Skew between the two sides is therefore bounded to one chunk,
//! and throughput is bounded by `C` round trips per frame.

use std::io::{ErrorKind, Read, Write};
use std::time::Instant;

use tracing::trace;

use crate::error::StreamError;
use crate::frame::Frame;
use crate::geometry::FrameGeometry;
use crate::pose::Pose;
use crate::stats::{ThroughputMeter, ThroughputSnapshot};

/// Acknowledgment byte written after each chunk. Only its arrival matters.
pub const ACK_BYTE: u8 = 0x06;

/// Read until `buf` is full.
///
/// A single `read` may return fewer bytes than requested; this keeps
/// reading. A zero-byte read means the peer hung up and yields
/// [`StreamError::PeerClosed`].
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), StreamError> {
    let mut received = 0;
    while received < buf.len() {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(StreamError::PeerClosed {
                    expected: buf.len(),
                    received,
                });
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// ── FrameSender ──────────────────────────────────────────────────

/// Host side of the transport.
pub struct FrameSender<S> {
    stream: S,
    geometry: FrameGeometry,
    meter: ThroughputMeter,
}

impl<S: Read + Write> FrameSender<S> {
    pub fn new(stream: S, geometry: FrameGeometry) -> Self {
        Self {
            stream,
            geometry,
            meter: ThroughputMeter::new(),
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Send one frame as `C` acknowledged chunks.
    ///
    /// Returns only after the last chunk's acknowledgment has arrived.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<(), StreamError> {
        let expected = self.geometry.frame_len();
        if frame.len() != expected {
            return Err(StreamError::FrameLength {
                expected,
                actual: frame.len(),
            });
        }

        let mut ack = [0u8; 1];
        for (index, chunk) in frame.chunks_exact(self.geometry.chunk_len()).enumerate() {
            let started = Instant::now();
            self.stream.write_all(chunk)?;
            self.stream.flush()?;
            read_full(&mut self.stream, &mut ack)?;
            let rtt = started.elapsed();
            self.meter.record_chunk_rtt(rtt);
            trace!(chunk = index, bytes = chunk.len(), ?rtt, "chunk acknowledged");
        }

        self.meter.record_frame(expected as u64);
        Ok(())
    }

    /// Block for the viewer's next pose record.
    pub fn read_pose(&mut self) -> Result<Pose, StreamError> {
        let mut buf = [0u8; Pose::WIRE_SIZE];
        read_full(&mut self.stream, &mut buf)?;
        Ok(Pose::decode(&buf))
    }

    pub fn stats(&self) -> ThroughputSnapshot {
        self.meter.snapshot()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

// ── FrameReceiver ────────────────────────────────────────────────

/// Viewer side of the transport.
pub struct FrameReceiver<S> {
    stream: S,
    geometry: FrameGeometry,
    meter: ThroughputMeter,
}

impl<S: Read + Write> FrameReceiver<S> {
    pub fn new(stream: S, geometry: FrameGeometry) -> Self {
        Self {
            stream,
            geometry,
            meter: ThroughputMeter::new(),
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Receive one frame into `frame`, acknowledging every chunk.
    ///
    /// On error the contents of `frame` are unspecified and must not be
    /// displayed.
    pub fn receive_into(&mut self, frame: &mut Frame) -> Result<(), StreamError> {
        if frame.geometry() != self.geometry {
            return Err(StreamError::FrameLength {
                expected: self.geometry.frame_len(),
                actual: frame.geometry().frame_len(),
            });
        }

        for index in 0..self.geometry.chunks() {
            read_full(&mut self.stream, frame.chunk_mut(index))?;
            self.stream.write_all(&[ACK_BYTE])?;
            self.stream.flush()?;
            trace!(chunk = index, "chunk received");
        }

        self.meter.record_frame(self.geometry.frame_len() as u64);
        Ok(())
    }

    /// Receive one frame into a freshly allocated buffer.
    pub fn receive_frame(&mut self) -> Result<Frame, StreamError> {
        let mut frame = Frame::zeroed(self.geometry);
        self.receive_into(&mut frame)?;
        Ok(frame)
    }

    /// Send the current pose record (unacknowledged).
    pub fn send_pose(&mut self, pose: &Pose) -> Result<(), StreamError> {
        self.stream.write_all(&pose.encode())?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> ThroughputSnapshot {
        self.meter.snapshot()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Op, ScriptedStream};

    fn geometry() -> FrameGeometry {
        FrameGeometry::new(64, 64, 4).unwrap()
    }

    #[test]
    fn every_chunk_waits_for_its_ack() {
        let g = geometry();
        let mut sender = FrameSender::new(ScriptedStream::new(&[ACK_BYTE; 4]), g);
        let frame = vec![0x5A; g.frame_len()];

        sender.send_frame(&frame).unwrap();

        let log = &sender.get_ref().log;
        let expected: Vec<Op> = (0..4).flat_map(|_| [Op::Wrote(4096), Op::Read(1)]).collect();
        assert_eq!(log, &expected);
        assert_eq!(sender.get_ref().written.len(), 16384);
    }

    #[test]
    fn missing_ack_stops_after_first_chunk() {
        let g = geometry();
        let mut sender = FrameSender::new(ScriptedStream::new(&[]), g);
        let err = sender.send_frame(&vec![0u8; g.frame_len()]).unwrap_err();

        assert!(matches!(
            err,
            StreamError::PeerClosed {
                expected: 1,
                received: 0
            }
        ));
        // only the first chunk ever reached the wire
        assert_eq!(sender.get_ref().written.len(), 4096);
    }

    #[test]
    fn sender_rejects_wrong_frame_length() {
        let mut sender = FrameSender::new(ScriptedStream::new(&[]), geometry());
        assert!(matches!(
            sender.send_frame(&[0u8; 10]),
            Err(StreamError::FrameLength { .. })
        ));
        assert!(sender.get_ref().log.is_empty());
    }

    #[test]
    fn receiver_survives_short_reads() {
        let g = FrameGeometry::new(4, 4, 2).unwrap();
        let payload: Vec<u8> = (0..g.frame_len() as u8).collect();
        let stream = ScriptedStream::new(&payload).with_max_read(3);
        let mut receiver = FrameReceiver::new(stream, g);

        let frame = receiver.receive_frame().unwrap();

        assert_eq!(frame.as_bytes(), payload.as_slice());
        assert_eq!(receiver.get_ref().written, vec![ACK_BYTE, ACK_BYTE]);
    }

    #[test]
    fn receiver_acks_after_each_full_chunk() {
        let g = geometry();
        let payload = vec![1u8; g.frame_len()];
        let mut receiver = FrameReceiver::new(ScriptedStream::new(&payload), g);
        receiver.receive_frame().unwrap();

        let writes: Vec<usize> = receiver
            .get_ref()
            .log
            .iter()
            .filter_map(|op| match op {
                Op::Wrote(n) => Some(*n),
                Op::Read(_) => None,
            })
            .collect();
        assert_eq!(writes, vec![1, 1, 1, 1]);
    }

    #[test]
    fn peer_closing_mid_chunk_is_fatal() {
        let g = geometry();
        // first chunk complete, second chunk cut short
        let payload = vec![7u8; 4096 + 1000];
        let mut receiver = FrameReceiver::new(ScriptedStream::new(&payload), g);

        let err = receiver.receive_frame().unwrap_err();

        assert!(matches!(
            err,
            StreamError::PeerClosed {
                expected: 4096,
                received: 1000
            }
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        // one ack for the complete chunk, none for the partial one
        assert_eq!(receiver.get_ref().written, vec![ACK_BYTE]);
    }

    #[test]
    fn pose_travels_as_24_bytes() {
        let pose = Pose {
            position: [4.0, 5.0, 6.0],
            facing: [0.0, 1.0, 0.0],
        };
        let g = geometry();
        let mut receiver = FrameReceiver::new(ScriptedStream::new(&[]), g);
        receiver.send_pose(&pose).unwrap();
        let wire = receiver.get_ref().written.clone();
        assert_eq!(wire.len(), Pose::WIRE_SIZE);

        let mut sender = FrameSender::new(ScriptedStream::new(&wire), g);
        assert_eq!(sender.read_pose().unwrap(), pose);
    }
}
