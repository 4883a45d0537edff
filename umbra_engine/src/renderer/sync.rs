/// GPU synchronization primitives: fences (GPU to CPU) and semaphores
/// (GPU to GPU)

use std::time::Duration;
use crate::error::Result;

/// Outcome of a bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The GPU reached the fence
    Signaled,
    /// The timeout elapsed first
    Timeout,
}

/// GPU completion fence, created signaled-on-completion by
/// `Renderer::insert_fence` or passed to `Renderer::submit`
pub trait Fence: Send + Sync {
    /// Non-blocking status query
    fn is_signaled(&self) -> Result<bool>;

    /// Block until signaled or `timeout` elapses
    fn wait(&self, timeout: Duration) -> Result<FenceStatus>;

    /// Push any batched work to the GPU so the fence can make progress.
    /// A no-op for backends that submit eagerly.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Binary semaphore ordering one queue submission after another
pub trait Semaphore: Send + Sync {}
