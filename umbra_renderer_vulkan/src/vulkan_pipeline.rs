/// Pipeline, PipelineLayout and PipelineCache - Vulkan implementations

use umbra_engine::umbra::{Error, Result};
use umbra_engine::umbra::render::{
    BindingLayout as RendererBindingLayout, BindingLayoutDesc, BindingType,
    Pipeline as RendererPipeline, PipelineCache as RendererPipelineCache, PipelineDesc,
    PipelineLayout as RendererPipelineLayout, PipelineLayoutDesc, RenderPass as RendererRenderPass,
    Shader as RendererShader, ShaderStage,
};
use umbra_engine::{engine_bail_warn, engine_debug, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_binding_group::BindingLayout;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    buffer_format_to_vk, color_write_mask_to_vk, compare_op_to_vk, cull_mode_to_vk, front_face_to_vk,
    polygon_mode_to_vk, sample_count_to_vk, shader_stage_to_vk, topology_to_vk, vertex_input_rate_to_vk,
};
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_shader::{ReflectedBinding, Shader};

// ============================================================================
// PipelineLayout
// ============================================================================

/// Vulkan pipeline layout: one descriptor set layout per binding layout
pub struct PipelineLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    binding_layouts: Vec<Arc<dyn RendererBindingLayout>>,
}

impl PipelineLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineLayoutDesc) -> Result<Self> {
        let set_layouts: Vec<vk::DescriptorSetLayout> = desc.binding_layouts
            .iter()
            .map(|layout| {
                let vk_layout = unsafe {
                    &*(layout.as_ref() as *const dyn RendererBindingLayout as *const BindingLayout)
                };
                vk_layout.layout
            })
            .collect();

        let layout_create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = unsafe {
            ctx.device.create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create pipeline layout: {:?}", e))?
        };

        Ok(Self {
            ctx,
            layout,
            binding_layouts: desc.binding_layouts.clone(),
        })
    }
}

impl RendererPipelineLayout for PipelineLayout {
    fn binding_layouts(&self) -> &[Arc<dyn RendererBindingLayout>] {
        &self.binding_layouts
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

// ============================================================================
// PipelineCache
// ============================================================================

/// Vulkan pipeline cache, seeded from bytes of a previous run
pub struct PipelineCache {
    ctx: Arc<GpuContext>,
    pub(crate) cache: vk::PipelineCache,
}

impl PipelineCache {
    pub(crate) fn new(ctx: Arc<GpuContext>, initial_data: &[u8]) -> Result<Self> {
        let create = |data: &[u8]| unsafe {
            let info = vk::PipelineCacheCreateInfo::default().initial_data(data);
            ctx.device.create_pipeline_cache(&info, None)
        };

        // Stale or foreign data is ignored by most drivers; the rest reject it
        let cache = match create(initial_data) {
            Ok(cache) => cache,
            Err(e) if !initial_data.is_empty() => {
                engine_debug!("umbra::vulkan", "Pipeline cache data rejected ({:?}), starting empty", e);
                create(&[]).map_err(|e| engine_err!("umbra::vulkan", "Failed to create pipeline cache: {:?}", e))?
            }
            Err(e) => return Err(engine_err!("umbra::vulkan", "Failed to create pipeline cache: {:?}", e)),
        };

        Ok(Self { ctx, cache })
    }
}

impl RendererPipelineCache for PipelineCache {
    fn data(&self) -> Result<Vec<u8>> {
        unsafe {
            self.ctx.device.get_pipeline_cache_data(self.cache)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to read pipeline cache data: {:?}", e))
        }
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_cache(self.cache, None);
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Vulkan graphics pipeline implementation
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    /// Vulkan graphics pipeline
    pub(crate) pipeline: vk::Pipeline,
    /// Pipeline layout handle, used when binding descriptor sets
    pub(crate) pipeline_layout: vk::PipelineLayout,
    label: String,
    layout: Arc<dyn RendererPipelineLayout>,
}

/// Check that every descriptor a shader reads is declared, with a
/// compatible type and visible to the shader's stage, by the set layouts
pub(crate) fn check_reflected_bindings(
    label: &str,
    stage: ShaderStage,
    bindings: &[ReflectedBinding],
    set_layouts: &[&BindingLayoutDesc],
) -> Result<()> {
    for reflected in bindings {
        let Some(set_layout) = set_layouts.get(reflected.set as usize) else {
            engine_bail_warn!("umbra::vulkan",
                "Pipeline '{}': {:?} shader uses set {} but the layout has {} set(s)",
                label, stage, reflected.set, set_layouts.len());
        };
        let Some(entry) = set_layout.entry(reflected.binding) else {
            engine_bail_warn!("umbra::vulkan",
                "Pipeline '{}': {:?} shader binding '{}' (set {}, binding {}) is not declared",
                label, stage, reflected.name, reflected.set, reflected.binding);
        };

        let compatible = match reflected.binding_type {
            BindingType::StorageBuffer => matches!(entry.binding_type,
                BindingType::StorageBuffer | BindingType::StorageBufferDynamic),
            other => entry.binding_type == other,
        };
        if !compatible {
            engine_bail_warn!("umbra::vulkan",
                "Pipeline '{}': binding {} is {:?} in the shader but {:?} in the layout",
                label, reflected.binding, reflected.binding_type, entry.binding_type);
        }
        if !entry.stage_flags.contains(stage) {
            engine_bail_warn!("umbra::vulkan",
                "Pipeline '{}': binding {} is not visible to the {:?} stage",
                label, reflected.binding, stage);
        }
    }
    Ok(())
}

impl Pipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        if desc.color_blend_attachments.len() as u32 != desc.render_pass.color_attachment_count() {
            engine_bail_warn!("umbra::vulkan",
                "Pipeline '{}': {} blend attachment(s) for a render pass with {} color attachment(s)",
                desc.label, desc.color_blend_attachments.len(), desc.render_pass.color_attachment_count());
        }

        unsafe {
            // Downcast shaders, layout, render pass and cache to Vulkan types
            let mut shaders: Vec<&Shader> = vec![
                &*(desc.vertex_shader.as_ref() as *const dyn RendererShader as *const Shader),
            ];
            if let Some(fragment_shader) = &desc.fragment_shader {
                shaders.push(&*(fragment_shader.as_ref() as *const dyn RendererShader as *const Shader));
            }
            let vk_layout = &*(desc.layout.as_ref() as *const dyn RendererPipelineLayout as *const PipelineLayout);
            let vk_render_pass = &*(desc.render_pass.as_ref() as *const dyn RendererRenderPass as *const RenderPass);
            let vk_cache = desc.cache
                .as_ref()
                .map(|cache| (*(cache.as_ref() as *const dyn RendererPipelineCache as *const PipelineCache)).cache)
                .unwrap_or(vk::PipelineCache::null());

            if desc.vertex_shader.stage() != ShaderStage::Vertex
                || desc.fragment_shader.as_ref().is_some_and(|s| s.stage() != ShaderStage::Fragment)
            {
                engine_bail_warn!("umbra::vulkan", "Pipeline '{}': shader stages out of place", desc.label);
            }

            let set_layouts: Vec<&BindingLayoutDesc> = vk_layout.binding_layouts
                .iter()
                .map(|layout| layout.desc())
                .collect();
            for shader in &shaders {
                check_reflected_bindings(&desc.label, shader.stage(), &shader.reflected_bindings, &set_layouts)?;
            }

            let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = shaders
                .iter()
                .map(|shader| vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader_stage_to_vk(shader.stage()))
                    .module(shader.module)
                    .name(&shader.entry_point))
                .collect();

            // Vertex input state
            let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.vertex_layout.bindings
                .iter()
                .map(|binding| vk::VertexInputBindingDescription {
                    binding: binding.binding,
                    stride: binding.stride,
                    input_rate: vertex_input_rate_to_vk(binding.input_rate),
                })
                .collect();

            let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes
                .iter()
                .map(|attribute| vk::VertexInputAttributeDescription {
                    location: attribute.location,
                    binding: attribute.binding,
                    format: buffer_format_to_vk(attribute.format),
                    offset: attribute.offset,
                })
                .collect();

            let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
                .vertex_binding_descriptions(&vertex_bindings)
                .vertex_attribute_descriptions(&vertex_attributes);

            let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(topology_to_vk(desc.topology))
                .primitive_restart_enable(false);

            // Viewport state (dynamic)
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewport_count(1)
                .scissor_count(1);

            let rasterization_state = {
                let mut info = vk::PipelineRasterizationStateCreateInfo::default()
                    .depth_clamp_enable(false)
                    .rasterizer_discard_enable(false)
                    .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
                    .line_width(1.0)
                    .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
                    .front_face(front_face_to_vk(desc.rasterization.front_face));
                if let Some(bias) = desc.rasterization.depth_bias {
                    info = info
                        .depth_bias_enable(true)
                        .depth_bias_constant_factor(bias.constant_factor)
                        .depth_bias_slope_factor(bias.slope_factor)
                        .depth_bias_clamp(bias.clamp);
                } else {
                    info = info.depth_bias_enable(false);
                }
                info
            };

            let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(desc.depth_stencil.depth_test_enable)
                .depth_write_enable(desc.depth_stencil.depth_write_enable)
                .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false);

            let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
                .rasterization_samples(sample_count_to_vk(desc.multisample.samples))
                .sample_shading_enable(desc.multisample.sample_shading)
                .min_sample_shading(if desc.multisample.sample_shading { 1.0 } else { 0.0 });

            let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc.color_blend_attachments
                .iter()
                .map(|attachment| {
                    let state = vk::PipelineColorBlendAttachmentState::default()
                        .color_write_mask(color_write_mask_to_vk(&attachment.color_write_mask))
                        .blend_enable(attachment.blend_enable);
                    if attachment.blend_enable {
                        state
                            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                            .color_blend_op(vk::BlendOp::ADD)
                            .src_alpha_blend_factor(vk::BlendFactor::ONE)
                            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                            .alpha_blend_op(vk::BlendOp::ADD)
                    } else {
                        state
                    }
                })
                .collect();

            let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .attachments(&blend_attachments);

            let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
            let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
                .dynamic_states(&dynamic_states);

            let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
                .stages(&shader_stages)
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterization_state)
                .depth_stencil_state(&depth_stencil_state)
                .multisample_state(&multisample_state)
                .color_blend_state(&color_blend_state)
                .dynamic_state(&dynamic_state)
                .layout(vk_layout.layout)
                .render_pass(vk_render_pass.render_pass)
                .subpass(desc.subpass);

            let pipelines = ctx.device.create_graphics_pipelines(vk_cache, &[pipeline_create_info], None)
                .map_err(|(_, e)| match e {
                    vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfMemory,
                    e => engine_err!("umbra::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.label, e),
                })?;

            engine_debug!("umbra::vulkan", "Pipeline '{}' created", desc.label);

            Ok(Self {
                pipeline: pipelines[0],
                pipeline_layout: vk_layout.layout,
                label: desc.label.clone(),
                layout: Arc::clone(&desc.layout),
                ctx,
            })
        }
    }
}

impl RendererPipeline for Pipeline {
    fn label(&self) -> &str {
        &self.label
    }

    fn layout(&self) -> &Arc<dyn RendererPipelineLayout> {
        &self.layout
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
