//! Session frame geometry.
//!
//! Width, height and chunk count are fixed for the whole session. The
//! chunk count must divide the height evenly; this is checked once, at
//! construction, and every later size computation relies on it.

use std::fmt;

use crate::error::StreamError;

/// Bytes per pixel on the wire and in every host-side buffer (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// Validated frame dimensions plus the per-session chunk count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGeometry {
    width: u32,
    height: u32,
    chunks: u32,
}

impl FrameGeometry {
    /// Validate and build a geometry.
    ///
    /// Fails with [`StreamError::UnevenChunks`] when `height % chunks != 0`.
    pub fn new(width: u32, height: u32, chunks: u32) -> Result<Self, StreamError> {
        if width == 0 {
            return Err(StreamError::InvalidGeometry("width must be non-zero"));
        }
        if height == 0 {
            return Err(StreamError::InvalidGeometry("height must be non-zero"));
        }
        if chunks == 0 {
            return Err(StreamError::InvalidGeometry("chunk count must be non-zero"));
        }
        if height % chunks != 0 {
            return Err(StreamError::UnevenChunks { height, chunks });
        }
        Ok(Self {
            width,
            height,
            chunks,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of chunks each frame is split into.
    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    /// Bytes in one tightly packed pixel row.
    pub fn row_len(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Rows carried by each chunk.
    pub fn rows_per_chunk(&self) -> u32 {
        self.height / self.chunks
    }

    /// Bytes in one chunk.
    pub fn chunk_len(&self) -> usize {
        self.row_len() * self.rows_per_chunk() as usize
    }

    /// Bytes in one full frame (`W * H * 4`).
    pub fn frame_len(&self) -> usize {
        self.row_len() * self.height as usize
    }

    /// Byte range of chunk `index` within a frame.
    ///
    /// # Panics
    ///
    /// Panics if `index >= chunks`.
    pub fn chunk_range(&self, index: u32) -> std::ops::Range<usize> {
        assert!(index < self.chunks, "chunk {index} out of range");
        let start = index as usize * self.chunk_len();
        start..start + self.chunk_len()
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}/{}", self.width, self.height, self.chunks)
    }
}
