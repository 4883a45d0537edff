/// Pipeline Builder: the shadow, geometry and composition pipelines
///
/// The three pipelines share one pipeline layout built from the resource
/// binder's binding layout. The `*_desc` functions are pure policy; `build`
/// hands the descriptors to the renderer.

use std::sync::Arc;
use crate::deferred::{DeferredShaders, PassShaders};
use crate::error::Result;
use crate::renderer::{
    BindingLayout, BufferFormat, ColorBlendAttachment, ColorWriteMask, CullMode, DepthBias,
    DepthStencilState, FrontFace, MultisampleState, Pipeline, PipelineCache, PipelineDesc,
    PipelineLayout, PipelineLayoutDesc, PolygonMode, PrimitiveTopology, RasterizationState,
    RenderPass, Renderer, VertexAttribute, VertexBinding, VertexInputRate, VertexLayout,
};
use crate::scene::MeshVertex;
use crate::engine_info;

/// The built pipelines
#[derive(Clone)]
pub struct DeferredPipelines {
    pub shadow: Arc<dyn Pipeline>,
    pub geometry: Arc<dyn Pipeline>,
    pub composition: Arc<dyn Pipeline>,
}

/// Render passes the pipelines are used in
pub struct PipelineTargets<'a> {
    pub shadow_pass: &'a Arc<dyn RenderPass>,
    pub gbuffer_pass: &'a Arc<dyn RenderPass>,
    /// The frame driver's presentation pass
    pub presentation_pass: &'a Arc<dyn RenderPass>,
    /// Sample count of the G-buffer
    pub geometry_samples: u32,
}

pub struct PipelineBuilder {
    renderer: Arc<dyn Renderer>,
    layout: Arc<dyn PipelineLayout>,
    cache: Option<Arc<dyn PipelineCache>>,
    depth_bias: DepthBias,
}

impl PipelineBuilder {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        binding_layout: &Arc<dyn BindingLayout>,
        cache: Option<Arc<dyn PipelineCache>>,
        depth_bias_constant: f32,
        depth_bias_slope: f32,
    ) -> Result<Self> {
        let layout = renderer.create_pipeline_layout(&PipelineLayoutDesc {
            binding_layouts: vec![Arc::clone(binding_layout)],
        })?;
        Ok(Self {
            renderer,
            layout,
            cache,
            depth_bias: DepthBias {
                constant_factor: depth_bias_constant,
                slope_factor: depth_bias_slope,
                clamp: 0.0,
            },
        })
    }

    /// Vertex input of `MeshVertex`: position, normal, uv at locations 0-2
    pub fn mesh_vertex_layout() -> VertexLayout {
        VertexLayout {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: MeshVertex::STRIDE,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![
                VertexAttribute { location: 0, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, binding: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 12 },
                VertexAttribute { location: 2, binding: 0, format: BufferFormat::R32G32_SFLOAT, offset: 24 },
            ],
        }
    }

    /// Depth-only, front faces culled, depth bias against acne
    pub fn shadow_desc(&self, shaders: &PassShaders, render_pass: &Arc<dyn RenderPass>) -> PipelineDesc {
        PipelineDesc {
            label: "shadow".to_string(),
            vertex_shader: Arc::clone(&shaders.vertex),
            fragment_shader: shaders.fragment.clone(),
            vertex_layout: Self::mesh_vertex_layout(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState {
                cull_mode: CullMode::Front,
                front_face: FrontFace::CounterClockwise,
                polygon_mode: PolygonMode::Fill,
                depth_bias: Some(self.depth_bias),
            },
            depth_stencil: DepthStencilState::default(),
            color_blend_attachments: Vec::new(),
            multisample: MultisampleState::default(),
            layout: Arc::clone(&self.layout),
            render_pass: Arc::clone(render_pass),
            subpass: 0,
            cache: self.cache.clone(),
        }
    }

    /// Writes position, normal and albedo; every attachment keeps a full
    /// write mask
    pub fn geometry_desc(&self, shaders: &PassShaders, render_pass: &Arc<dyn RenderPass>, samples: u32) -> PipelineDesc {
        let blend = ColorBlendAttachment {
            blend_enable: false,
            color_write_mask: ColorWriteMask::ALL,
        };
        PipelineDesc {
            label: "geometry".to_string(),
            vertex_shader: Arc::clone(&shaders.vertex),
            fragment_shader: shaders.fragment.clone(),
            vertex_layout: Self::mesh_vertex_layout(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState {
                cull_mode: CullMode::Back,
                front_face: FrontFace::CounterClockwise,
                polygon_mode: PolygonMode::Fill,
                depth_bias: None,
            },
            depth_stencil: DepthStencilState::default(),
            color_blend_attachments: vec![blend; render_pass.color_attachment_count() as usize],
            multisample: MultisampleState {
                samples: samples.max(1),
                sample_shading: false,
            },
            layout: Arc::clone(&self.layout),
            render_pass: Arc::clone(render_pass),
            subpass: 0,
            cache: self.cache.clone(),
        }
    }

    /// Fullscreen triangle generated in the vertex stage. The triangle winds
    /// opposite to mesh geometry, hence front-face culling.
    pub fn composition_desc(&self, shaders: &PassShaders, render_pass: &Arc<dyn RenderPass>) -> PipelineDesc {
        PipelineDesc {
            label: "composition".to_string(),
            vertex_shader: Arc::clone(&shaders.vertex),
            fragment_shader: shaders.fragment.clone(),
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState {
                cull_mode: CullMode::Front,
                front_face: FrontFace::CounterClockwise,
                polygon_mode: PolygonMode::Fill,
                depth_bias: None,
            },
            depth_stencil: DepthStencilState::DISABLED,
            color_blend_attachments: vec![
                ColorBlendAttachment::default();
                render_pass.color_attachment_count() as usize
            ],
            multisample: MultisampleState::default(),
            layout: Arc::clone(&self.layout),
            render_pass: Arc::clone(render_pass),
            subpass: 0,
            cache: self.cache.clone(),
        }
    }

    pub fn build(&self, shaders: &DeferredShaders, targets: &PipelineTargets) -> Result<DeferredPipelines> {
        let shadow = self
            .renderer
            .create_pipeline(&self.shadow_desc(&shaders.shadow, targets.shadow_pass))?;
        let geometry = self.renderer.create_pipeline(&self.geometry_desc(
            &shaders.geometry,
            targets.gbuffer_pass,
            targets.geometry_samples,
        ))?;
        let composition = self
            .renderer
            .create_pipeline(&self.composition_desc(&shaders.composition, targets.presentation_pass))?;

        engine_info!(
            "umbra::pipelines",
            "Deferred pipelines built (geometry at {} samples{})",
            targets.geometry_samples,
            if self.cache.is_some() { ", cached" } else { "" }
        );
        Ok(DeferredPipelines { shadow, geometry, composition })
    }

    pub fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }

    pub fn cache(&self) -> Option<&Arc<dyn PipelineCache>> {
        self.cache.as_ref()
    }
}

#[cfg(test)]
#[path = "pipelines_tests.rs"]
mod tests;
