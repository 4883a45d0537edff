/// Bounded wait on a GPU fence
///
/// The wait escalates in three steps: a zero-cost status poll, a flush of any
/// batched GPU work (a fence behind unsubmitted work never signals), then one
/// blocking wait bounded by the configured timeout. Reaching the timeout, or
/// any error from the fence itself, means the device is gone.

use std::time::Duration;
use crate::error::{Error, Result};
use crate::renderer::{Fence, FenceStatus};
use crate::engine_fail;

/// States of a fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWaitState {
    /// Query the fence without blocking
    Poll,
    /// Push pending GPU work
    Flush,
    /// Block until signaled or timed out
    Block,
    /// Terminal: the GPU reached the fence
    Signaled,
    /// Terminal: the timeout elapsed
    Timeout,
}

impl FenceWaitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FenceWaitState::Signaled | FenceWaitState::Timeout)
    }
}

/// One in-progress fence wait, advanced with `step()`
pub struct FenceWait<'a> {
    fence: &'a dyn Fence,
    timeout: Duration,
    state: FenceWaitState,
}

impl<'a> FenceWait<'a> {
    pub fn new(fence: &'a dyn Fence, timeout: Duration) -> Self {
        Self {
            fence,
            timeout,
            state: FenceWaitState::Poll,
        }
    }

    pub fn state(&self) -> FenceWaitState {
        self.state
    }

    /// Advance one transition and return the new state.
    /// Terminal states are absorbing.
    pub fn step(&mut self) -> Result<FenceWaitState> {
        self.state = match self.state {
            FenceWaitState::Poll => {
                if self.fence.is_signaled()? {
                    FenceWaitState::Signaled
                } else {
                    FenceWaitState::Flush
                }
            }
            FenceWaitState::Flush => {
                self.fence.flush()?;
                FenceWaitState::Block
            }
            FenceWaitState::Block => match self.fence.wait(self.timeout)? {
                FenceStatus::Signaled => FenceWaitState::Signaled,
                FenceStatus::Timeout => FenceWaitState::Timeout,
            },
            terminal => terminal,
        };
        Ok(self.state)
    }

    /// Step until a terminal state is reached
    pub fn run(mut self) -> Result<FenceWaitState> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        Ok(self.state)
    }
}

/// Wait for `fence`; a timeout or a fence error is `Error::DeviceLost`
pub fn wait_for_fence(fence: &dyn Fence, timeout: Duration) -> Result<()> {
    match FenceWait::new(fence, timeout).run() {
        Ok(FenceWaitState::Signaled) => Ok(()),
        Ok(_) => Err(engine_fail!(
            "umbra::fence",
            Error::DeviceLost(format!("fence not signaled after {:?}", timeout))
        )),
        Err(e) => Err(engine_fail!(
            "umbra::fence",
            Error::DeviceLost(format!("fence wait failed: {}", e))
        )),
    }
}

#[cfg(test)]
#[path = "fence_wait_tests.rs"]
mod tests;
