//! Host-side frame buffers.
//!
//! A [`Frame`] is one complete image in tightly packed RGBA8 rows, sized
//! exactly `W * H * 4`. Chunks are views into it; they never outlive the
//! frame they were cut from.

use crate::error::StreamError;
use crate::geometry::{BYTES_PER_PIXEL, FrameGeometry};

// ── Frame ────────────────────────────────────────────────────────

/// One rendered image plus its capture sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    geometry: FrameGeometry,
    data: Vec<u8>,
}

impl Frame {
    /// Allocate a zero-filled frame for `geometry`.
    pub fn zeroed(geometry: FrameGeometry) -> Self {
        Self {
            sequence: 0,
            geometry,
            data: vec![0u8; geometry.frame_len()],
        }
    }

    /// Wrap an existing buffer. `data` must hold exactly one frame.
    pub fn from_bytes(
        geometry: FrameGeometry,
        sequence: u64,
        data: Vec<u8>,
    ) -> Result<Self, StreamError> {
        if data.len() != geometry.frame_len() {
            return Err(StreamError::FrameLength {
                expected: geometry.frame_len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            sequence,
            geometry,
            data,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Chunk `index` as a byte slice.
    pub fn chunk(&self, index: u32) -> &[u8] {
        &self.data[self.geometry.chunk_range(index)]
    }

    /// Mutable view of chunk `index`.
    pub fn chunk_mut(&mut self, index: u32) -> &mut [u8] {
        let range = self.geometry.chunk_range(index);
        &mut self.data[range]
    }

    /// Iterate over all chunks in wire order.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(self.geometry.chunk_len())
    }

    /// Pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = y as usize * self.geometry.row_len() + x as usize * BYTES_PER_PIXEL;
        &self.data[offset..offset + BYTES_PER_PIXEL]
    }
}

// ── Row packing ──────────────────────────────────────────────────

/// Copy `geometry.height()` rows out of a linear buffer with row pitch
/// `stride` into the tightly packed `dst`.
///
/// Device readback buffers pad rows to an alignment boundary, so the
/// source stride may exceed `width * 4`; padding bytes are dropped.
pub fn pack_rows(
    src: &[u8],
    stride: usize,
    geometry: FrameGeometry,
    dst: &mut [u8],
) -> Result<(), StreamError> {
    let row_len = geometry.row_len();
    let rows = geometry.height() as usize;

    if stride < row_len {
        return Err(StreamError::device(format!(
            "readback stride {stride} is shorter than a row ({row_len} bytes)"
        )));
    }
    if dst.len() != geometry.frame_len() {
        return Err(StreamError::FrameLength {
            expected: geometry.frame_len(),
            actual: dst.len(),
        });
    }
    let needed = stride * (rows - 1) + row_len;
    if src.len() < needed {
        return Err(StreamError::FrameLength {
            expected: needed,
            actual: src.len(),
        });
    }

    if stride == row_len {
        dst.copy_from_slice(&src[..geometry.frame_len()]);
        return Ok(());
    }
    for (y, out) in dst.chunks_exact_mut(row_len).enumerate() {
        let start = y * stride;
        out.copy_from_slice(&src[start..start + row_len]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(geometry: FrameGeometry) -> Frame {
        let data = (0..geometry.frame_len()).map(|i| (i % 251) as u8).collect();
        Frame::from_bytes(geometry, 0, data).unwrap()
    }

    #[test]
    fn chunks_reassemble_to_original() {
        for chunks in [1u32, 2, 3, 4] {
            let g = FrameGeometry::new(20, 12, chunks).unwrap();
            let src = numbered(g);

            let mut dst = Frame::zeroed(g);
            for (i, chunk) in src.chunks().enumerate() {
                dst.chunk_mut(i as u32).copy_from_slice(chunk);
            }
            assert_eq!(src.as_bytes(), dst.as_bytes(), "chunks = {chunks}");
            assert_eq!(src.chunks().count(), chunks as usize);
        }
    }

    #[test]
    fn from_bytes_checks_length() {
        let g = FrameGeometry::new(4, 4, 2).unwrap();
        let err = Frame::from_bytes(g, 0, vec![0; 10]).unwrap_err();
        assert!(matches!(
            err,
            StreamError::FrameLength {
                expected: 64,
                actual: 10
            }
        ));
    }

    #[test]
    fn pack_rows_drops_padding() {
        let g = FrameGeometry::new(2, 3, 1).unwrap();
        let stride = 16;
        let mut src = vec![0xEE; stride * 3];
        for y in 0..3 {
            for b in 0..8 {
                src[y * stride + b] = (y * 10 + b) as u8;
            }
        }

        let mut dst = vec![0u8; g.frame_len()];
        pack_rows(&src, stride, g, &mut dst).unwrap();

        assert_eq!(&dst[0..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(&dst[16..24], &[20, 21, 22, 23, 24, 25, 26, 27]);
        assert!(!dst.contains(&0xEE));
    }

    #[test]
    fn pack_rows_rejects_short_stride() {
        let g = FrameGeometry::new(4, 2, 1).unwrap();
        let mut dst = vec![0u8; g.frame_len()];
        assert!(pack_rows(&[0u8; 64], 8, g, &mut dst).is_err());
    }

    #[test]
    fn pixel_lookup() {
        let g = FrameGeometry::new(3, 2, 1).unwrap();
        let frame = numbered(g);
        assert_eq!(frame.pixel(1, 1), &[16, 17, 18, 19]);
    }
}
