/// Streaming ring buffer for per-frame GPU data
///
/// One persistently mapped buffer holds three logical frames of `S` bytes.
/// Each write goes at the cursor (wrapping to 0 when the write would not fit
/// before the end), after every fence guarding the destination bytes has
/// signaled. `on_usage_complete` hands the region to the GPU by locking it
/// with a freshly inserted fence and moving the cursor past it.
///
/// The buffer is allocated with one extra frame of slack so a binding window
/// of `S` bytes can start at any region offset without leaving the buffer.

use std::sync::Arc;
use std::time::Duration;
use crate::error::{Error, Result};
use crate::renderer::{Buffer, BufferDesc, BufferUsage, Renderer};
use crate::streaming::{BufferRange, LockManager};
use crate::{engine_debug, engine_fail};

/// Frames the ring holds before the cursor comes back around
pub const RING_FRAME_COUNT: u64 = 3;

/// Largest buffer a ring may allocate; dynamic binding offsets are 32-bit
pub const MAX_RING_CAPACITY: u64 = u32::MAX as u64;

/// A written region of the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferRegion {
    pub offset: u64,
    pub length: u64,
}

impl RingBufferRegion {
    /// Offset as a dynamic binding offset. Rings never exceed
    /// `MAX_RING_CAPACITY`, so region offsets always fit.
    pub fn dynamic_offset(&self) -> u32 {
        self.offset as u32
    }
}

/// Round `value` up to a multiple of `alignment` (power of two or not)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

pub struct StreamingRingBuffer {
    renderer: Arc<dyn Renderer>,
    buffer: Arc<dyn Buffer>,
    frame_size: u64,
    capacity: u64,
    alignment: u64,
    cursor: u64,
    locks: LockManager,
}

impl StreamingRingBuffer {
    /// Allocate a ring of three frames of at least `frame_size` bytes.
    ///
    /// The frame size is rounded up to the device's storage-buffer offset
    /// alignment so every region offset is a legal dynamic offset.
    pub fn new(
        renderer: Arc<dyn Renderer>,
        label: &str,
        frame_size: u64,
        usage: BufferUsage,
        fence_timeout: Duration,
    ) -> Result<Self> {
        if frame_size == 0 {
            return Err(engine_fail!(
                "umbra::ring_buffer",
                Error::InvalidResource(format!("ring buffer '{}' has a zero frame size", label))
            ));
        }
        let alignment = renderer.limits().min_storage_buffer_offset_alignment.max(1);
        let frame_size = align_up(frame_size, alignment);
        let allocation = frame_size
            .checked_mul(RING_FRAME_COUNT + 1)
            .filter(|&size| size <= MAX_RING_CAPACITY);
        let Some(allocation) = allocation else {
            return Err(engine_fail!(
                "umbra::ring_buffer",
                Error::CapacityExceeded {
                    requested: frame_size.saturating_mul(RING_FRAME_COUNT + 1),
                    capacity: MAX_RING_CAPACITY,
                }
            ));
        };
        let capacity = frame_size * RING_FRAME_COUNT;
        let buffer = renderer.create_buffer(BufferDesc::mapped(label, allocation, usage))?;

        engine_debug!(
            "umbra::ring_buffer",
            "'{}': {} frames of {} bytes (alignment {})",
            label, RING_FRAME_COUNT, frame_size, alignment
        );

        Ok(Self {
            renderer,
            buffer,
            frame_size,
            capacity,
            alignment,
            cursor: 0,
            locks: LockManager::new(fence_timeout),
        })
    }

    /// Copy `bytes` into the ring and return where they landed.
    ///
    /// Blocks on the fences of any in-flight region the write would overlap.
    pub fn set_data(&mut self, bytes: &[u8]) -> Result<RingBufferRegion> {
        let length = bytes.len() as u64;
        if length > self.frame_size {
            return Err(engine_fail!(
                "umbra::ring_buffer",
                Error::CapacityExceeded { requested: length, capacity: self.frame_size }
            ));
        }
        if self.cursor + length > self.capacity {
            self.cursor = 0;
        }

        let range = BufferRange::new(self.cursor, length);
        self.locks.wait_for_locked_range(range)?;
        self.buffer.update(self.cursor, bytes)?;

        Ok(RingBufferRegion {
            offset: self.cursor,
            length,
        })
    }

    /// Lock the `length` bytes at the cursor until the GPU passes a fence
    /// inserted now, and advance the cursor past them.
    pub fn on_usage_complete(&mut self, length: u64) -> Result<()> {
        let fence = self.renderer.insert_fence()?;
        self.locks.lock_range(BufferRange::new(self.cursor, length), fence);
        self.cursor = (self.cursor + align_up(length, self.alignment)) % self.capacity;
        Ok(())
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    /// Logical frame size `S` (also the binding window size)
    pub fn frame_size(&self) -> u64 {
        self.frame_size
    }

    /// Ring capacity `3 * S`
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Outstanding GPU locks
    pub fn pending_locks(&self) -> usize {
        self.locks.lock_count()
    }
}

#[cfg(test)]
#[path = "ring_buffer_tests.rs"]
mod tests;
