//! Device completion fences.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::StreamError;

/// A completion signal the device raises once submitted work referencing
/// it has finished.
pub trait Fence {
    /// Whether the device has signaled this fence.
    fn is_signaled(&self) -> bool;

    /// Block the calling thread until the fence is signaled. No timeout.
    fn wait(&self) -> Result<(), StreamError>;

    /// Return the fence to the unsignaled state before a new submission.
    fn reset(&self);
}

/// Host-side fence built on a mutex and condition variable.
///
/// Clones share the same underlying state, so the device can keep one
/// clone to signal while the pool waits on another.
#[derive(Debug, Clone, Default)]
pub struct CpuFence {
    inner: Arc<FenceState>,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl CpuFence {
    pub fn new(signaled: bool) -> Self {
        Self {
            inner: Arc::new(FenceState {
                signaled: Mutex::new(signaled),
                cond: Condvar::new(),
            }),
        }
    }

    /// Mark the fence signaled and wake every waiter.
    pub fn signal(&self) {
        let mut signaled = self
            .inner
            .signaled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *signaled = true;
        self.inner.cond.notify_all();
    }

    /// Whether two handles refer to the same fence.
    pub fn same_as(&self, other: &CpuFence) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Fence for CpuFence {
    fn is_signaled(&self) -> bool {
        *self
            .inner
            .signaled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) -> Result<(), StreamError> {
        let signaled = self
            .inner
            .signaled
            .lock()
            .map_err(|_| StreamError::device("fence state poisoned"))?;
        let _signaled = self
            .inner
            .cond
            .wait_while(signaled, |s| !*s)
            .map_err(|_| StreamError::device("fence state poisoned"))?;
        Ok(())
    }

    fn reset(&self) {
        *self
            .inner
            .signaled
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn created_signaled_does_not_block() {
        let fence = CpuFence::new(true);
        assert!(fence.is_signaled());
        fence.wait().unwrap();
    }

    #[test]
    fn wait_blocks_until_signaled() {
        let fence = CpuFence::new(false);
        let remote = fence.clone();
        let started = Instant::now();
        let signaler = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.signal();
        });

        fence.wait().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        signaler.join().unwrap();
    }

    #[test]
    fn reset_clears_signal() {
        let fence = CpuFence::new(true);
        fence.reset();
        assert!(!fence.is_signaled());
        assert!(fence.same_as(&fence.clone()));
        assert!(!fence.same_as(&CpuFence::new(true)));
    }
}
