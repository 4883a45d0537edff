/// CommandList - Vulkan implementation of the CommandList trait
///
/// Records rendering commands for later submission to the GPU. Every object
/// bound while recording is retained until the next `begin()`, which the
/// caller only issues once the previous submission has completed.

use umbra_engine::umbra::Result;
use umbra_engine::umbra::render::{
    BindingGroup as RendererBindingGroup, Buffer as RendererBuffer, ClearValue,
    CommandList as RendererCommandList, Framebuffer as RendererFramebuffer, IndexType,
    Pipeline as RendererPipeline, Rect2D, RenderPass as RendererRenderPass, Viewport,
};
use umbra_engine::{engine_bail_warn, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_binding_group::BindingGroup;
use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::index_type_to_vk;
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;

/// Objects a recorded command buffer references
#[derive(Default)]
struct Retained {
    render_passes: Vec<Arc<dyn RendererRenderPass>>,
    framebuffers: Vec<Arc<dyn RendererFramebuffer>>,
    pipelines: Vec<Arc<dyn RendererPipeline>>,
    binding_groups: Vec<Arc<dyn RendererBindingGroup>>,
    buffers: Vec<Arc<dyn RendererBuffer>>,
}

impl Retained {
    fn clear(&mut self) {
        self.render_passes.clear();
        self.framebuffers.clear();
        self.pipelines.clear();
        self.binding_groups.clear();
        self.buffers.clear();
    }
}

/// Vulkan command list implementation
pub struct CommandList {
    ctx: Arc<GpuContext>,
    label: String,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a render pass
    in_render_pass: bool,
    retained: Retained,
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, label: &str) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create command pool for '{}': {:?}", label, e))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("umbra::vulkan",
                        "Failed to allocate command buffer for '{}': {:?}", label, e));
                }
            };

            Ok(Self {
                ctx,
                label: label.to_string(),
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                in_render_pass: false,
                retained: Retained::default(),
            })
        }
    }

    /// True between `begin()` and `end()`
    pub(crate) fn is_recording(&self) -> bool {
        self.is_recording
    }

    fn check_recording(&self) -> Result<()> {
        if !self.is_recording {
            engine_bail_warn!("umbra::vulkan", "Command list '{}' is not recording", self.label);
        }
        Ok(())
    }

    fn check_in_render_pass(&self) -> Result<()> {
        self.check_recording()?;
        if !self.in_render_pass {
            engine_bail_warn!("umbra::vulkan", "Command list '{}': draw outside a render pass", self.label);
        }
        Ok(())
    }
}

impl RendererCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail_warn!("umbra::vulkan", "Command list '{}' already recording", self.label);
        }

        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }

        self.retained.clear();
        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.check_recording()?;
        if self.in_render_pass {
            engine_bail_warn!("umbra::vulkan",
                "Command list '{}': render pass not ended before ending command list", self.label);
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to end command buffer: {:?}", e))?;
        }

        self.is_recording = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to reset command buffer: {:?}", e))?;
        }

        self.retained.clear();
        self.is_recording = false;
        self.in_render_pass = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RendererRenderPass>,
        framebuffer: &Arc<dyn RendererFramebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.check_recording()?;
        if self.in_render_pass {
            engine_bail_warn!("umbra::vulkan", "Command list '{}': already inside a render pass", self.label);
        }

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|clear| match clear {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: *color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: *depth, stencil: *stencil },
                },
            })
            .collect();

        unsafe {
            // Downcast to Vulkan types
            let vk_render_pass = &*(render_pass.as_ref() as *const dyn RendererRenderPass as *const RenderPass);
            let vk_framebuffer = &*(framebuffer.as_ref() as *const dyn RendererFramebuffer as *const Framebuffer);

            let render_pass_begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(vk_render_pass.render_pass)
                .framebuffer(vk_framebuffer.framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: vk::Extent2D {
                        width: framebuffer.width(),
                        height: framebuffer.height(),
                    },
                })
                .clear_values(&vk_clear_values);

            self.ctx.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::INLINE,
            );
        }

        self.retained.render_passes.push(Arc::clone(render_pass));
        self.retained.framebuffers.push(Arc::clone(framebuffer));
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.check_in_render_pass()?;
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.check_recording()?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.check_recording()?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn RendererPipeline>) -> Result<()> {
        self.check_recording()?;
        unsafe {
            let vk_pipeline = &*(pipeline.as_ref() as *const dyn RendererPipeline as *const Pipeline);
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline,
            );
        }
        self.retained.pipelines.push(Arc::clone(pipeline));
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &Arc<dyn RendererPipeline>,
        set_index: u32,
        binding_group: &Arc<dyn RendererBindingGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.check_recording()?;

        let expected = binding_group.layout().desc().dynamic_count();
        if dynamic_offsets.len() != expected {
            engine_bail_warn!("umbra::vulkan",
                "Command list '{}': binding group needs {} dynamic offset(s), got {}",
                self.label, expected, dynamic_offsets.len());
        }
        if set_index as usize >= pipeline.layout().binding_layouts().len() {
            engine_bail_warn!("umbra::vulkan",
                "Command list '{}': set {} out of range for pipeline '{}'",
                self.label, set_index, pipeline.label());
        }

        unsafe {
            let vk_pipeline = &*(pipeline.as_ref() as *const dyn RendererPipeline as *const Pipeline);
            let vk_binding_group = &*(binding_group.as_ref() as *const dyn RendererBindingGroup as *const BindingGroup);

            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.pipeline_layout,
                set_index,
                &[vk_binding_group.descriptor_set],
                dynamic_offsets,
            );
        }
        self.retained.binding_groups.push(Arc::clone(binding_group));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn RendererBuffer>, offset: u64) -> Result<()> {
        self.check_recording()?;
        unsafe {
            let vk_buffer = &*(buffer.as_ref() as *const dyn RendererBuffer as *const Buffer);
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[offset]);
        }
        self.retained.buffers.push(Arc::clone(buffer));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn RendererBuffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.check_recording()?;
        unsafe {
            let vk_buffer = &*(buffer.as_ref() as *const dyn RendererBuffer as *const Buffer);
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        self.retained.buffers.push(Arc::clone(buffer));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.check_in_render_pass()?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.check_in_render_pass()?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }

    fn draw_indexed_indirect_count(
        &mut self,
        buffer: &Arc<dyn RendererBuffer>,
        offset: u64,
        count_buffer: &Arc<dyn RendererBuffer>,
        count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        self.check_in_render_pass()?;
        unsafe {
            let vk_buffer = &*(buffer.as_ref() as *const dyn RendererBuffer as *const Buffer);
            let vk_count_buffer = &*(count_buffer.as_ref() as *const dyn RendererBuffer as *const Buffer);
            self.ctx.device.cmd_draw_indexed_indirect_count(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                vk_count_buffer.buffer,
                count_offset,
                max_draw_count,
                stride,
            );
        }
        self.retained.buffers.push(Arc::clone(buffer));
        self.retained.buffers.push(Arc::clone(count_buffer));
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Freeing the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
