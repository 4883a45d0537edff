/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything a resource needs after creation:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics queue (externally synchronized, hence the mutex)
/// - Command pool for one-shot upload operations
/// - Live-object counters reported by `Renderer::stats`

use umbra_engine::umbra::{Error, Result};
use umbra_engine::{engine_err, engine_error};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared GPU context for all Vulkan resources.
///
/// Shared via `Arc` by every GPU object so none of them duplicates
/// device/allocator/queue references. Device and instance destruction is
/// handled by `VulkanRenderer::drop()`, after every resource is gone.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator. Wrapped in ManuallyDrop so it is dropped
    /// BEFORE the device is destroyed.
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Graphics queue for command submission
    pub graphics_queue: Mutex<vk::Queue>,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Reusable command pool for one-shot uploads
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,

    live_buffers: AtomicU32,
    live_textures: AtomicU32,
    memory_used: AtomicU64,
    submissions: AtomicU64,
}

impl GpuContext {
    pub fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        upload_command_pool: vk::CommandPool,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(allocator),
            graphics_queue: Mutex::new(graphics_queue),
            graphics_queue_family,
            upload_command_pool: Mutex::new(upload_command_pool),
            debug_utils_loader,
            debug_messenger,
            live_buffers: AtomicU32::new(0),
            live_textures: AtomicU32::new(0),
            memory_used: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
        }
    }

    /// Allocate memory through gpu-allocator, mapping failure to `OutOfMemory`
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self.allocator.lock()
            .map_err(|_| engine_err!("umbra::vulkan", "GPU allocator mutex poisoned"))?;
        let allocation = allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("umbra::vulkan", "Out of GPU memory for '{}' ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })?;
        self.memory_used.fetch_add(allocation.size(), Ordering::Relaxed);
        Ok(allocation)
    }

    /// Return an allocation to the allocator. Never fails: resources call
    /// this from `Drop`.
    pub fn free(&self, allocation: Allocation) {
        self.memory_used.fetch_sub(allocation.size(), Ordering::Relaxed);
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Record and run a one-shot command buffer on the graphics queue,
    /// blocking until it completes
    pub fn upload<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self.upload_command_pool.lock()
            .map_err(|_| engine_err!("umbra::vulkan", "Upload command pool mutex poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.run_one_shot(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn run_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("umbra::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(command_buffer);

        self.device.end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("umbra::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| engine_err!("umbra::vulkan", "Failed to create upload fence: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let submitted = self.queue_submit(&[submit_info], fence);
        let waited = submitted.and_then(|_| {
            self.device.wait_for_fences(&[fence], true, u64::MAX)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to wait for upload: {:?}", e))
        });
        self.device.destroy_fence(fence, None);
        waited
    }

    /// Submit to the graphics queue under the queue lock
    pub fn queue_submit(&self, submits: &[vk::SubmitInfo], fence: vk::Fence) -> Result<()> {
        let queue = self.graphics_queue.lock()
            .map_err(|_| engine_err!("umbra::vulkan", "Graphics queue mutex poisoned"))?;
        unsafe {
            self.device.queue_submit(*queue, submits, fence).map_err(|e| match e {
                vk::Result::ERROR_DEVICE_LOST => {
                    engine_error!("umbra::vulkan", "Device lost during queue submission");
                    Error::DeviceLost("queue submission".to_string())
                }
                other => engine_err!("umbra::vulkan", "Failed to submit to graphics queue: {:?}", other),
            })?;
        }
        self.submissions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn buffer_created(&self) {
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn buffer_destroyed(&self) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn texture_created(&self) {
        self.live_textures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn texture_destroyed(&self) {
        self.live_textures.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn live_buffers(&self) -> u32 {
        self.live_buffers.load(Ordering::Relaxed)
    }

    pub(crate) fn live_textures(&self) -> u32 {
        self.live_textures.load(Ordering::Relaxed)
    }

    pub(crate) fn memory_used(&self) -> u64 {
        self.memory_used.load(Ordering::Relaxed)
    }

    pub(crate) fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }
}
