/// Fence-guarded byte ranges of a shared buffer
///
/// Every range handed to the GPU is locked with the fence that signals when
/// the GPU is done reading it. Before the CPU writes a range it waits out and
/// discards every overlapping lock; locks elsewhere are kept, except those
/// already observed signaled, which are reclaimed on the way.

use std::sync::Arc;
use std::time::Duration;
use crate::error::{Error, Result};
use crate::renderer::Fence;
use crate::streaming::wait_for_fence;
use crate::{engine_trace, engine_fail};

/// Half-open byte range `[offset, offset + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRange {
    pub offset: u64,
    pub length: u64,
}

impl BufferRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// `a < b + lb && b < a + la`
    pub fn overlaps(&self, other: &BufferRange) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// A range the GPU may still be reading
pub struct BufferLock {
    pub range: BufferRange,
    pub fence: Arc<dyn Fence>,
}

pub struct LockManager {
    locks: Vec<BufferLock>,
    fence_timeout: Duration,
}

impl LockManager {
    pub fn new(fence_timeout: Duration) -> Self {
        Self {
            locks: Vec::new(),
            fence_timeout,
        }
    }

    /// Record that the GPU reads `range` until `fence` signals
    pub fn lock_range(&mut self, range: BufferRange, fence: Arc<dyn Fence>) {
        self.locks.push(BufferLock { range, fence });
    }

    /// Block until no lock overlapping `range` is outstanding.
    ///
    /// Overlapping locks are waited on and removed. Non-overlapping locks are
    /// kept unless their fence already reports signaled.
    pub fn wait_for_locked_range(&mut self, range: BufferRange) -> Result<()> {
        let mut kept = Vec::with_capacity(self.locks.len());
        let mut waited = 0usize;
        let mut reclaimed = 0usize;

        let mut pending = std::mem::take(&mut self.locks).into_iter();
        while let Some(lock) = pending.next() {
            let result = if lock.range.overlaps(&range) {
                wait_for_fence(lock.fence.as_ref(), self.fence_timeout).map(|_| waited += 1)
            } else {
                match lock.fence.is_signaled() {
                    Ok(true) => {
                        reclaimed += 1;
                        Ok(())
                    }
                    Ok(false) => {
                        kept.push(lock);
                        continue;
                    }
                    Err(e) => Err(engine_fail!(
                        "umbra::lock_manager",
                        Error::DeviceLost(format!("fence query failed: {}", e))
                    )),
                }
            };
            if let Err(e) = result {
                // Locks not yet examined stay outstanding
                kept.extend(pending);
                self.locks = kept;
                return Err(e);
            }
        }
        self.locks = kept;

        if waited > 0 || reclaimed > 0 {
            engine_trace!(
                "umbra::lock_manager",
                "range [{}, {}): waited on {}, reclaimed {}, {} still locked",
                range.offset, range.end(), waited, reclaimed, self.locks.len()
            );
        }
        Ok(())
    }

    /// Number of outstanding locks
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn locks(&self) -> &[BufferLock] {
        &self.locks
    }
}

#[cfg(test)]
#[path = "lock_manager_tests.rs"]
mod tests;
