//! Integration tests for fence-guarded buffer ranges
//!
//! Drives the LockManager through the public API with a fence the test
//! signals by hand. No GPU required.
//!
//! Run with: cargo test --test streaming_integration_tests

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use umbra_engine::umbra::Error;
use umbra_engine::umbra::render::{Fence, FenceStatus};
use umbra_engine::umbra::streaming::{wait_for_fence, BufferRange, LockManager};

// ============================================================================
// TEST FENCE IMPLEMENTATION
// ============================================================================

/// Fence that signals on the first flush, like a backend that batches work
#[derive(Default)]
struct ManualFence {
    signaled: AtomicBool,
    signal_on_flush: bool,
    flushes: AtomicU32,
}

impl ManualFence {
    fn pending() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn signaled() -> Arc<Self> {
        let fence = Self::default();
        fence.signaled.store(true, Ordering::SeqCst);
        Arc::new(fence)
    }

    fn batched() -> Arc<Self> {
        Arc::new(Self { signal_on_flush: true, ..Self::default() })
    }
}

impl Fence for ManualFence {
    fn is_signaled(&self) -> umbra_engine::umbra::Result<bool> {
        Ok(self.signaled.load(Ordering::SeqCst))
    }

    fn wait(&self, _timeout: Duration) -> umbra_engine::umbra::Result<FenceStatus> {
        if self.signaled.load(Ordering::SeqCst) {
            Ok(FenceStatus::Signaled)
        } else {
            Ok(FenceStatus::Timeout)
        }
    }

    fn flush(&self) -> umbra_engine::umbra::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.signal_on_flush {
            self.signaled.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

const TIMEOUT: Duration = Duration::from_millis(10);

// ============================================================================
// FENCE WAIT TESTS
// ============================================================================

#[test]
fn test_integration_batched_fence_is_flushed_before_blocking() {
    let fence = ManualFence::batched();
    wait_for_fence(fence.as_ref(), TIMEOUT).unwrap();
    assert_eq!(fence.flushes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_integration_unsignaled_fence_is_device_lost() {
    let fence = ManualFence::pending();
    let result = wait_for_fence(fence.as_ref(), TIMEOUT);
    assert!(matches!(result, Err(Error::DeviceLost(_))));
}

// ============================================================================
// LOCK MANAGER TESTS
// ============================================================================

#[test]
fn test_integration_frames_cycle_through_locks() {
    let mut locks = LockManager::new(TIMEOUT);
    let frame = 256;

    // Three frames in flight, each reading its own slice
    let fences: Vec<_> = (0..3).map(|_| ManualFence::batched()).collect();
    for (index, fence) in fences.iter().enumerate() {
        let range = BufferRange::new(index as u64 * frame, frame);
        locks.wait_for_locked_range(range).unwrap();
        locks.lock_range(range, fence.clone());
    }
    assert_eq!(locks.lock_count(), 3);

    // Wrapping to the first slice waits out only the first frame
    locks.wait_for_locked_range(BufferRange::new(0, frame)).unwrap();
    assert_eq!(locks.lock_count(), 2);
    assert_eq!(fences[0].flushes.load(Ordering::SeqCst), 1);
    assert_eq!(fences[1].flushes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_integration_signaled_locks_are_reclaimed_anywhere() {
    let mut locks = LockManager::new(TIMEOUT);
    locks.lock_range(BufferRange::new(0, 64), ManualFence::signaled());
    locks.lock_range(BufferRange::new(64, 64), ManualFence::pending());

    locks.wait_for_locked_range(BufferRange::new(512, 64)).unwrap();
    assert_eq!(locks.lock_count(), 1);
    assert_eq!(locks.locks()[0].range, BufferRange::new(64, 64));
}

#[test]
fn test_integration_stuck_fence_is_device_lost() {
    let mut locks = LockManager::new(TIMEOUT);
    locks.lock_range(BufferRange::new(0, 128), ManualFence::pending());

    let result = locks.wait_for_locked_range(BufferRange::new(64, 16));
    assert!(matches!(result, Err(Error::DeviceLost(_))));

    // The failed lock is not retried
    assert_eq!(locks.lock_count(), 0);
}
