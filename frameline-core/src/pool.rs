//! Ring of in-flight render slots.
//!
//! Each of the `K` slots owns one completion fence and cycles through
//!
//! ```text
//!  Free ──► Rendering ──► Submitted ──► Presented ──┐
//!   ▲           │                                   │
//!   └───────────┴──────── (fence signaled) ◄────────┘
//! ```
//!
//! The ring advances as `current = (current + 1) mod K`. A slot is only
//! re-entered after the fence from its previous use has signaled, so the
//! host never writes resources the device may still be reading. A second
//! table tracks which slot last rendered into each presentation image,
//! because the presentation engine may hand images back out of order.

use tracing::debug;

use crate::error::StreamError;
use crate::gpu::{Fence, GraphicsDevice};

// ── SlotState ────────────────────────────────────────────────────

/// Lifecycle phase of one in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Rendering,
    Submitted,
    Presented,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Rendering => write!(f, "Rendering"),
            Self::Submitted => write!(f, "Submitted"),
            Self::Presented => write!(f, "Presented"),
        }
    }
}

impl SlotState {
    fn can_become(self, next: SlotState) -> bool {
        matches!(
            (self, next),
            (Self::Free, Self::Rendering)
                | (Self::Rendering, Self::Submitted)
                | (Self::Rendering, Self::Free)
                | (Self::Submitted, Self::Presented)
                | (Self::Presented, Self::Free)
        )
    }
}

/// Handed out by [`InFlightPool::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket {
    pub slot: usize,
    /// How many times this slot was entered before.
    pub use_index: u64,
    /// Whether `begin` had to block on the slot's fence.
    pub waited: bool,
}

struct Slot<F> {
    fence: F,
    state: SlotState,
    uses: u64,
}

// ── InFlightPool ─────────────────────────────────────────────────

/// Fixed-size ring of reusable per-tick resource sets.
pub struct InFlightPool<F: Fence> {
    slots: Vec<Slot<F>>,
    current: usize,
    /// Slot that last rendered into each presentation image.
    images_in_flight: Vec<Option<usize>>,
}

impl<F: Fence> InFlightPool<F> {
    /// Build a ring with one slot per fence. Fences must start signaled.
    pub fn new(fences: Vec<F>, image_count: usize) -> Result<Self, StreamError> {
        if fences.is_empty() {
            return Err(StreamError::InvalidConfig(
                "at least one frame must be in flight".into(),
            ));
        }
        Ok(Self {
            slots: fences
                .into_iter()
                .map(|fence| Slot {
                    fence,
                    state: SlotState::Free,
                    uses: 0,
                })
                .collect(),
            current: 0,
            images_in_flight: vec![None; image_count],
        })
    }

    /// Build a ring of `frames_in_flight` slots with fences from `device`.
    pub fn with_device<D>(device: &mut D, frames_in_flight: usize) -> Result<Self, StreamError>
    where
        D: GraphicsDevice<Fence = F>,
    {
        let fences = (0..frames_in_flight)
            .map(|_| device.create_fence())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fences, device.image_count())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot the next [`begin`](Self::begin) enters.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn state(&self, slot: usize) -> SlotState {
        self.slots[slot].state
    }

    pub fn fence(&self, slot: usize) -> &F {
        &self.slots[slot].fence
    }

    /// Slot that last used presentation image `image`, if any.
    pub fn image_owner(&self, image: usize) -> Option<usize> {
        self.images_in_flight.get(image).copied().flatten()
    }

    fn transition(&mut self, to: SlotState) -> Result<(), StreamError> {
        let index = self.current;
        let slot = &mut self.slots[index];
        if !slot.state.can_become(to) {
            return Err(StreamError::SlotTransition {
                slot: index,
                from: slot.state,
                to,
            });
        }
        slot.state = to;
        Ok(())
    }

    /// Enter the current slot, blocking until its previous use retired.
    pub fn begin(&mut self) -> Result<SlotTicket, StreamError> {
        let index = self.current;
        let fence = &self.slots[index].fence;
        let waited = !fence.is_signaled();
        if waited {
            debug!(slot = index, "waiting for in-flight fence");
            fence.wait()?;
        }
        debug_assert!(
            fence.is_signaled(),
            "slot {index} re-entered before its fence signaled"
        );

        if self.slots[index].state == SlotState::Presented {
            self.transition(SlotState::Free)?;
        }
        self.transition(SlotState::Rendering)?;

        let slot = &mut self.slots[index];
        let use_index = slot.uses;
        slot.uses += 1;
        Ok(SlotTicket {
            slot: index,
            use_index,
            waited,
        })
    }

    /// Claim presentation image `image` for the current slot.
    ///
    /// If another slot rendered into this image and its work has not
    /// retired yet, blocks on that slot's fence first.
    pub fn bind_image(&mut self, image: usize) -> Result<(), StreamError> {
        if image >= self.images_in_flight.len() {
            return Err(StreamError::device(format!(
                "image {image} out of range ({} images)",
                self.images_in_flight.len()
            )));
        }
        if let Some(owner) = self.images_in_flight[image] {
            let fence = &self.slots[owner].fence;
            if owner != self.current && !fence.is_signaled() {
                debug!(image, owner, "image still in flight");
                fence.wait()?;
            }
        }
        self.images_in_flight[image] = Some(self.current);
        Ok(())
    }

    /// Reset the current slot's fence and hand it to `submit`.
    pub fn submit_with<T>(
        &mut self,
        submit: impl FnOnce(&F) -> Result<T, StreamError>,
    ) -> Result<T, StreamError> {
        let index = self.current;
        let state = self.slots[index].state;
        if state != SlotState::Rendering {
            return Err(StreamError::SlotTransition {
                slot: index,
                from: state,
                to: SlotState::Submitted,
            });
        }
        let fence = &self.slots[index].fence;
        fence.reset();
        let out = submit(fence)?;
        self.transition(SlotState::Submitted)?;
        Ok(out)
    }

    /// The current slot's image went to presentation; advance the ring.
    pub fn mark_presented(&mut self) -> Result<(), StreamError> {
        self.transition(SlotState::Presented)?;
        self.current = (self.current + 1) % self.slots.len();
        Ok(())
    }

    /// Give up the current slot before submission; the ring does not move.
    pub fn abandon(&mut self) -> Result<(), StreamError> {
        self.transition(SlotState::Free)
    }

    /// Forget image ownership after the presentation chain was rebuilt.
    pub fn resize_images(&mut self, image_count: usize) {
        self.images_in_flight = vec![None; image_count];
    }

    /// Block until every slot's outstanding work has retired.
    pub fn wait_all(&self) -> Result<(), StreamError> {
        for slot in &self.slots {
            slot.fence.wait()?;
        }
        Ok(())
    }
}
