//! Host-visible device memory with scoped mapping.
//!
//! Mapping hands out a [`MappedMemory`] guard that mutably borrows the
//! allocation; the memory is unmapped when the guard drops, on every
//! exit path including `?` returns. A second mapping while one is live
//! cannot be expressed.

use std::ops::{Deref, DerefMut};

use crate::error::StreamError;

/// A host-visible, host-coherent allocation.
#[derive(Debug)]
pub struct HostVisibleMemory {
    bytes: Vec<u8>,
    mapped: bool,
    map_count: u64,
}

impl HostVisibleMemory {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
            mapped: false,
            map_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether a [`MappedMemory`] guard is currently alive.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Number of map/unmap cycles so far.
    pub fn map_count(&self) -> u64 {
        self.map_count
    }

    /// Map the whole allocation into host address space.
    pub fn map(&mut self) -> MappedMemory<'_> {
        self.mapped = true;
        self.map_count += 1;
        MappedMemory { memory: self }
    }

    /// Device-side view, used by the device when executing copies.
    pub(crate) fn device_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn device_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Live mapping of a [`HostVisibleMemory`]. Unmaps on drop.
#[derive(Debug)]
pub struct MappedMemory<'a> {
    memory: &'a mut HostVisibleMemory,
}

impl MappedMemory<'_> {
    /// Copy `src` to `offset`, failing if it would run past the end.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> Result<(), StreamError> {
        let end = offset
            .checked_add(src.len())
            .filter(|&end| end <= self.memory.bytes.len())
            .ok_or_else(|| {
                StreamError::device(format!(
                    "mapped write of {} bytes at {offset} exceeds {}-byte allocation",
                    src.len(),
                    self.memory.bytes.len()
                ))
            })?;
        self.memory.bytes[offset..end].copy_from_slice(src);
        Ok(())
    }
}

impl Deref for MappedMemory<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.memory.bytes
    }
}

impl DerefMut for MappedMemory<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.memory.bytes
    }
}

impl Drop for MappedMemory<'_> {
    fn drop(&mut self) {
        self.memory.mapped = false;
    }
}
