/// Texture - Vulkan implementation of the Texture trait
///
/// Owns the image, its memory and its views. Depth/stencil textures get a
/// second, depth-only view for sampling; every other texture samples through
/// its attachment view.

use umbra_engine::umbra::Result;
use umbra_engine::umbra::render::{
    Buffer as RendererBuffer, Texture as RendererTexture, TextureDesc, TextureInfo, TextureUsage,
};
use umbra_engine::{engine_bail_warn, engine_err, engine_trace};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    aspect_mask, sample_count_to_vk, sampled_aspect_mask, texture_format_to_vk, texture_usage_to_vk,
};

/// Vulkan texture implementation
pub struct Texture {
    ctx: Arc<GpuContext>,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// View over every aspect, used as a framebuffer attachment
    pub(crate) view: vk::ImageView,
    /// Depth-only view of a depth/stencil texture
    sampled_view: Option<vk::ImageView>,
    allocation: Option<Allocation>,
    info: TextureInfo,
}

impl Texture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: TextureDesc) -> Result<Self> {
        let array_layers = desc.array_layers.max(1);
        if desc.width == 0 || desc.height == 0 {
            engine_bail_warn!("umbra::vulkan", "Texture '{}' has a zero extent ({}x{})",
                desc.label, desc.width, desc.height);
        }
        let expected_len = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel() as usize;
        for layer in &desc.data {
            if layer.layer >= array_layers {
                engine_bail_warn!("umbra::vulkan", "Texture '{}': layer index {} exceeds array_layers {}",
                    desc.label, layer.layer, array_layers);
            }
            if layer.bytes.len() != expected_len {
                engine_bail_warn!("umbra::vulkan", "Texture '{}': layer {} has {} bytes, expected {}",
                    desc.label, layer.layer, layer.bytes.len(), expected_len);
            }
        }

        let format = texture_format_to_vk(desc.format);
        let mut usage = texture_usage_to_vk(desc.usage);
        if !desc.data.is_empty() {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        let view_type = if array_layers > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };

        let mut texture = unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(array_layers)
                .samples(sample_count_to_vk(desc.samples))
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create image '{}': {:?}", desc.label, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocate(&desc.label, requirements, gpu_allocator::MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            // From here on Drop releases whatever was created
            ctx.texture_created();
            let mut texture = Self {
                ctx: Arc::clone(&ctx),
                image,
                view: vk::ImageView::null(),
                sampled_view: None,
                allocation: None,
                info: TextureInfo::from(&desc),
            };
            texture.info.array_layers = array_layers;

            let (memory, offset) = (allocation.memory(), allocation.offset());
            texture.allocation = Some(allocation);
            ctx.device.bind_image_memory(image, memory, offset)
                .map_err(|e| engine_err!("umbra::vulkan",
                    "Failed to bind image memory for '{}': {:?}", desc.label, e))?;
            texture
        };

        texture.view = texture.create_view(format, view_type, aspect_mask(desc.format), array_layers)?;
        if desc.format.is_depth() && desc.usage.contains(TextureUsage::SAMPLED) {
            let sampled = texture.create_view(format, view_type, sampled_aspect_mask(desc.format), array_layers)?;
            texture.sampled_view = Some(sampled);
        }

        if !desc.data.is_empty() {
            texture.upload(&desc)?;
        } else if desc.usage == TextureUsage::SAMPLED {
            // Never written: move it out of UNDEFINED so it can be bound
            texture.transition_to_shader_read()?;
        }

        engine_trace!("umbra::vulkan", "Texture '{}' created ({}x{}, {:?}, {} layer(s), {} sample(s))",
            desc.label, desc.width, desc.height, desc.format, array_layers, desc.samples);
        Ok(texture)
    }

    /// View a shader samples
    pub(crate) fn sampled_view(&self) -> vk::ImageView {
        self.sampled_view.unwrap_or(self.view)
    }

    fn create_view(
        &self,
        format: vk::Format,
        view_type: vk::ImageViewType,
        aspect_mask: vk::ImageAspectFlags,
        layer_count: u32,
    ) -> Result<vk::ImageView> {
        let view_create_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count,
            });

        unsafe {
            self.ctx.device.create_image_view(&view_create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create image view: {:?}", e))
        }
    }

    fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: aspect_mask(self.info.format),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: self.info.array_layers,
        }
    }

    /// Copy every provided layer through one staging buffer, then leave
    /// the image in SHADER_READ_ONLY_OPTIMAL
    fn upload(&self, desc: &TextureDesc) -> Result<()> {
        let total: usize = desc.data.iter().map(|layer| layer.bytes.len()).sum();
        let staging = Buffer::staging(Arc::clone(&self.ctx), total as u64)?;

        let mut regions = Vec::with_capacity(desc.data.len());
        let mut offset = 0u64;
        for layer in &desc.data {
            staging.update(offset, &layer.bytes)?;
            regions.push(
                vk::BufferImageCopy::default()
                    .buffer_offset(offset)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: sampled_aspect_mask(desc.format),
                        mip_level: 0,
                        base_array_layer: layer.layer,
                        layer_count: 1,
                    })
                    .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                    .image_extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 }),
            );
            offset += layer.bytes.len() as u64;
        }

        let range = self.full_range();
        let device = &self.ctx.device;
        self.ctx.upload(|command_buffer| unsafe {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            device.cmd_copy_buffer_to_image(
                command_buffer,
                staging.buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })
    }

    fn transition_to_shader_read(&self) -> Result<()> {
        let range = self.full_range();
        let device = &self.ctx.device;
        self.ctx.upload(|command_buffer| unsafe {
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.image)
                .subresource_range(range)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }
}

impl RendererTexture for Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            if let Some(sampled_view) = self.sampled_view.take() {
                self.ctx.device.destroy_image_view(sampled_view, None);
            }
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
        self.ctx.texture_destroyed();
    }
}
