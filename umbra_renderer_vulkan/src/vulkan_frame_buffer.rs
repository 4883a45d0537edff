/// Framebuffer - Vulkan implementation of the Framebuffer trait
///
/// Wraps a VkFramebuffer that groups color and depth/stencil attachments.
/// Created once via Renderer::create_framebuffer(), reused each frame. The
/// attachment textures are kept alive for as long as the framebuffer is.

use umbra_engine::umbra::Result;
use umbra_engine::umbra::render::{
    Framebuffer as RendererFramebuffer, FramebufferDesc, RenderPass as RendererRenderPass,
    Texture as RendererTexture,
};
use umbra_engine::{engine_bail_warn, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_texture::Texture;

/// Vulkan framebuffer implementation
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    /// Vulkan framebuffer handle
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    _attachments: Vec<Arc<dyn RendererTexture>>,
}

impl Framebuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &FramebufferDesc) -> Result<Self> {
        let expected = desc.render_pass.color_attachment_count() as usize;
        if desc.color_attachments.len() != expected
            || desc.depth_attachment.is_some() != desc.render_pass.has_depth_attachment()
        {
            engine_bail_warn!("umbra::vulkan",
                "Framebuffer attachments ({} color, depth: {}) do not match the render pass ({} color, depth: {})",
                desc.color_attachments.len(), desc.depth_attachment.is_some(),
                expected, desc.render_pass.has_depth_attachment());
        }

        let textures: Vec<Arc<dyn RendererTexture>> = desc.color_attachments
            .iter()
            .chain(desc.depth_attachment.iter())
            .cloned()
            .collect();

        for texture in &textures {
            let info = texture.info();
            if info.width < desc.width || info.height < desc.height || info.array_layers < desc.layers {
                engine_bail_warn!("umbra::vulkan",
                    "Attachment {}x{}x{} smaller than framebuffer {}x{}x{}",
                    info.width, info.height, info.array_layers, desc.width, desc.height, desc.layers);
            }
        }

        unsafe {
            // Downcast render pass and attachments to Vulkan types
            let vk_render_pass = desc.render_pass.as_ref()
                as *const dyn RendererRenderPass
                as *const RenderPass;
            let vk_render_pass = &*vk_render_pass;

            let views: Vec<vk::ImageView> = textures
                .iter()
                .map(|texture| {
                    let vk_texture = texture.as_ref() as *const dyn RendererTexture as *const Texture;
                    (*vk_texture).view
                })
                .collect();

            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(vk_render_pass.render_pass)
                .attachments(&views)
                .width(desc.width)
                .height(desc.height)
                .layers(desc.layers.max(1));

            let framebuffer = ctx.device.create_framebuffer(&framebuffer_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create framebuffer: {:?}", e))?;

            Ok(Self {
                ctx,
                framebuffer,
                width: desc.width,
                height: desc.height,
                _attachments: textures,
            })
        }
    }
}

impl RendererFramebuffer for Framebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
