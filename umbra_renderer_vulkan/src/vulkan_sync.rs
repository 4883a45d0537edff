/// Fence and Semaphore - Vulkan implementations of the sync traits

use umbra_engine::umbra::{Error, Result};
use umbra_engine::umbra::render::{Fence as RendererFence, FenceStatus, Semaphore as RendererSemaphore};
use umbra_engine::engine_err;
use ash::vk;
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_context::GpuContext;

/// Vulkan fence (GPU to CPU)
pub struct Fence {
    ctx: Arc<GpuContext>,
    pub(crate) fence: vk::Fence,
}

impl Fence {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let fence = unsafe {
            ctx.device.create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create fence: {:?}", e))?
        };
        Ok(Self { ctx, fence })
    }
}

impl RendererFence for Fence {
    fn is_signaled(&self) -> Result<bool> {
        unsafe {
            match self.ctx.device.get_fence_status(self.fence) {
                Ok(signaled) => Ok(signaled),
                Err(vk::Result::ERROR_DEVICE_LOST) => Err(Error::DeviceLost("fence status query".to_string())),
                Err(e) => Err(engine_err!("umbra::vulkan", "Failed to query fence status: {:?}", e)),
            }
        }
    }

    fn wait(&self, timeout: Duration) -> Result<FenceStatus> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        unsafe {
            match self.ctx.device.wait_for_fences(&[self.fence], true, timeout_ns) {
                Ok(()) => Ok(FenceStatus::Signaled),
                Err(vk::Result::TIMEOUT) => Ok(FenceStatus::Timeout),
                Err(vk::Result::ERROR_DEVICE_LOST) => Err(Error::DeviceLost("fence wait".to_string())),
                Err(e) => Err(engine_err!("umbra::vulkan", "Failed to wait for fence: {:?}", e)),
            }
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

/// Vulkan binary semaphore (GPU to GPU)
pub struct Semaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Semaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let semaphore = unsafe {
            ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create semaphore: {:?}", e))?
        };
        Ok(Self { ctx, semaphore })
    }
}

impl RendererSemaphore for Semaphore {}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
