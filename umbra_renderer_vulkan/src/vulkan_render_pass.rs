/// RenderPass - Vulkan implementation of the RenderPass trait
///
/// One subpass: color attachments in order, then the optional depth
/// attachment. Dependencies come from the descriptor verbatim.

use umbra_engine::umbra::Result;
use umbra_engine::umbra::render::{AttachmentDesc, RenderPass as RendererRenderPass, RenderPassDesc};
use umbra_engine::{engine_bail_warn, engine_err, engine_trace};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    access_flags_to_vk, image_layout_to_vk, load_op_to_vk, pipeline_stages_to_vk,
    sample_count_to_vk, store_op_to_vk, subpass_ref_to_vk, texture_format_to_vk,
};

/// Vulkan render pass implementation
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    /// Vulkan render pass handle
    pub(crate) render_pass: vk::RenderPass,
    color_attachment_count: u32,
    has_depth_attachment: bool,
}

fn attachment_to_vk(attachment: &AttachmentDesc) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(texture_format_to_vk(attachment.format))
        .samples(sample_count_to_vk(attachment.samples))
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .stencil_load_op(load_op_to_vk(attachment.stencil_load_op))
        .stencil_store_op(store_op_to_vk(attachment.stencil_store_op))
        .initial_layout(image_layout_to_vk(attachment.initial_layout))
        .final_layout(image_layout_to_vk(attachment.final_layout))
}

impl RenderPass {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        if desc.color_attachments.is_empty() && desc.depth_attachment.is_none() {
            engine_bail_warn!("umbra::vulkan", "Render pass '{}' has no attachments", desc.label);
        }

        let mut attachments: Vec<vk::AttachmentDescription> =
            desc.color_attachments.iter().map(attachment_to_vk).collect();
        let color_attachment_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len())
            .map(|i| vk::AttachmentReference::default()
                .attachment(i as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
            .collect();

        let depth_attachment_ref = desc.depth_attachment.as_ref().map(|depth| {
            attachments.push(attachment_to_vk(depth));
            vk::AttachmentReference::default()
                .attachment(attachments.len() as u32 - 1)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs);
        if let Some(ref depth_ref) = depth_attachment_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let dependencies: Vec<vk::SubpassDependency> = desc.dependencies
            .iter()
            .map(|dependency| {
                let flags = if dependency.by_region {
                    vk::DependencyFlags::BY_REGION
                } else {
                    vk::DependencyFlags::empty()
                };
                vk::SubpassDependency::default()
                    .src_subpass(subpass_ref_to_vk(dependency.src_subpass))
                    .dst_subpass(subpass_ref_to_vk(dependency.dst_subpass))
                    .src_stage_mask(pipeline_stages_to_vk(dependency.src_stages))
                    .dst_stage_mask(pipeline_stages_to_vk(dependency.dst_stages))
                    .src_access_mask(access_flags_to_vk(dependency.src_access))
                    .dst_access_mask(access_flags_to_vk(dependency.dst_access))
                    .dependency_flags(flags)
            })
            .collect();

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device.create_render_pass(&render_pass_info, None)
                .map_err(|e| engine_err!("umbra::vulkan",
                    "Failed to create render pass '{}': {:?}", desc.label, e))?
        };

        engine_trace!("umbra::vulkan", "Render pass '{}' created ({} color, depth: {})",
            desc.label, desc.color_attachments.len(), desc.depth_attachment.is_some());

        Ok(Self {
            ctx,
            render_pass,
            color_attachment_count: desc.color_attachments.len() as u32,
            has_depth_attachment: desc.depth_attachment.is_some(),
        })
    }
}

impl RendererRenderPass for RenderPass {
    fn color_attachment_count(&self) -> u32 {
        self.color_attachment_count
    }

    fn has_depth_attachment(&self) -> bool {
        self.has_depth_attachment
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
