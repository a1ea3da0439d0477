//! Point-to-point frame transport.
//!
//! ## Wire format
//!
//! Setup (once, see [`handshake`]):
//! ```text
//! Host   ──[SessionHello, 19 bytes]────────────► Viewer
//! Viewer ──[verdict, 1 byte]───────────────────► Host
//! ```
//!
//! Per frame, repeated `C` times in strict lockstep:
//! ```text
//! Viewer ──[Pose, 24 bytes]  (optional, once per frame, before chunk 0)
//! Host   ──[chunk i: W * H/C * 4 raw bytes]────► Viewer
//! Viewer ──[ack, 1 byte]───────────────────────► Host
//! ```
//!
//! No lengths, sequence numbers or checksums travel with the pixels;
//! integrity rests entirely on the underlying reliable byte stream.

pub mod handshake;
pub mod lockstep;
pub mod tcp;

pub use handshake::SessionHello;
pub use lockstep::{ACK_BYTE, FrameReceiver, FrameSender, read_full};
pub use tcp::{SessionListener, connect, listen_one};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stream that records the order of reads and writes.

    use std::collections::VecDeque;
    use std::io::{self, Read, Write};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Op {
        Wrote(usize),
        Read(usize),
    }

    /// Serves scripted input bytes, at most `max_read` per call, and
    /// captures everything written.
    pub struct ScriptedStream {
        input: VecDeque<u8>,
        max_read: usize,
        pub written: Vec<u8>,
        pub log: Vec<Op>,
    }

    impl ScriptedStream {
        pub fn new(input: &[u8]) -> Self {
            Self {
                input: input.iter().copied().collect(),
                max_read: usize::MAX,
                written: Vec::new(),
                log: Vec::new(),
            }
        }

        pub fn with_max_read(mut self, max_read: usize) -> Self {
            self.max_read = max_read;
            self
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.max_read).min(self.input.len());
            for b in buf.iter_mut().take(n) {
                *b = self.input.pop_front().unwrap_or_default();
            }
            self.log.push(Op::Read(n));
            Ok(n)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            self.log.push(Op::Wrote(buf.len()));
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
