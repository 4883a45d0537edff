/// Buffer - Vulkan implementation of the Buffer trait
///
/// `CpuToGpu` buffers stay persistently mapped and `update` is a memcpy.
/// `GpuOnly` buffers are device-local and `update` goes through a staging
/// buffer and a blocking one-shot copy.

use umbra_engine::umbra::{Error, Result};
use umbra_engine::umbra::render::{Buffer as RendererBuffer, BufferDesc, BufferUsage, MemoryLocation};
use umbra_engine::{engine_bail_warn, engine_err, engine_trace};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Buffer size
    size: u64,
    location: MemoryLocation,
}

impl Buffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        let mut usage = buffer_usage_to_vk(desc.usage);
        if desc.location == MemoryLocation::GpuOnly {
            usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        Self::create(ctx, desc, usage)
    }

    /// Host-visible transfer source for one upload
    pub(crate) fn staging(ctx: Arc<GpuContext>, size: u64) -> Result<Self> {
        let desc = BufferDesc::mapped("staging", size, BufferUsage::empty());
        Self::create(ctx, &desc, vk::BufferUsageFlags::TRANSFER_SRC)
    }

    fn create(ctx: Arc<GpuContext>, desc: &BufferDesc, usage: vk::BufferUsageFlags) -> Result<Self> {
        if desc.size == 0 {
            engine_bail_warn!("umbra::vulkan", "Buffer '{}' has zero size", desc.label);
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan",
                    "Failed to create buffer '{}' of size {} bytes: {:?}", desc.label, desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let location = match desc.location {
                MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
                MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
            };

            let allocation = match ctx.allocate(&desc.label, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.free(allocation);
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("umbra::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            ctx.buffer_created();
            engine_trace!("umbra::vulkan", "Buffer '{}' created ({} bytes, {:?})",
                desc.label, desc.size, desc.location);

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                location: desc.location,
            })
        }
    }

    fn update_mapped(&self, allocation: &Allocation, offset: u64, data: &[u8]) -> Result<()> {
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn update_staged(&self, offset: u64, data: &[u8]) -> Result<()> {
        let staging = Buffer::staging(Arc::clone(&self.ctx), data.len() as u64)?;
        staging.update(0, data)?;

        let region = vk::BufferCopy::default()
            .src_offset(0)
            .dst_offset(offset)
            .size(data.len() as u64);
        self.ctx.upload(|command_buffer| unsafe {
            self.ctx.device.cmd_copy_buffer(command_buffer, staging.buffer, self.buffer, &[region]);
        })
    }
}

impl RendererBuffer for Buffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if offset + data.len() as u64 > self.size {
            engine_bail_warn!("umbra::vulkan",
                "Buffer update out of bounds: offset {} + {} bytes > size {}",
                offset, data.len(), self.size);
        }

        let allocation = self.allocation.as_ref()
            .ok_or_else(|| engine_err!("umbra::vulkan", "Buffer update failed: no GPU allocation"))?;

        match self.location {
            MemoryLocation::CpuToGpu => self.update_mapped(allocation, offset, data),
            MemoryLocation::GpuOnly => self.update_staged(offset, data),
        }
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
        self.ctx.buffer_destroyed();
    }
}
