/// Offscreen render targets: the G-buffer and the shadow map
///
/// An `OffscreenFramebuffer` owns its attachments, the render pass describing
/// them and the physical framebuffer. The render pass carries the layout
/// transitions around its single subpass: attachments enter from `Undefined`
/// and leave in `ShaderReadOnly` (colors) or `DepthStencilReadOnly` (depth),
/// so later passes sample them with no extra barrier.
///
/// Attachments are destroyed with the framebuffer that created them.

use std::sync::Arc;
use crate::deferred::find_depth_format;
use crate::error::{Error, Result};
use crate::renderer::{
    AccessFlags, AttachmentDesc, ClearValue, Framebuffer, FramebufferDesc, ImageLayout, LoadOp,
    PipelineStages, RenderPass, RenderPassDesc, Renderer, StoreOp, SubpassDependency, SubpassRef,
    Texture, TextureDesc, TextureFormat, TextureUsage,
};
use crate::{engine_debug, engine_fail};

/// Attachment indices of the G-buffer
pub const GBUFFER_POSITION: usize = 0;
pub const GBUFFER_NORMAL: usize = 1;
pub const GBUFFER_ALBEDO: usize = 2;
pub const GBUFFER_DEPTH: usize = 3;

/// Color formats of the G-buffer, in attachment order
pub const GBUFFER_COLOR_FORMATS: [TextureFormat; 3] = [
    TextureFormat::R16G16B16A16_SFLOAT,
    TextureFormat::R16G16B16A16_SFLOAT,
    TextureFormat::R8G8B8A8_UNORM,
];

const GBUFFER_COLOR_NAMES: [&str; 3] = ["position", "normal", "albedo"];

/// Size shared by a framebuffer and all of its attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferSize {
    pub width: u32,
    pub height: u32,
}

/// A render target image owned by an `OffscreenFramebuffer`
#[derive(Clone)]
pub struct Attachment {
    texture: Arc<dyn Texture>,
}

impl Attachment {
    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn format(&self) -> TextureFormat {
        self.texture.info().format
    }

    pub fn usage(&self) -> TextureUsage {
        self.texture.info().usage
    }

    pub fn samples(&self) -> u32 {
        self.texture.info().samples
    }

    pub fn is_depth(&self) -> bool {
        self.format().is_depth()
    }

    /// Whether a later pass reads the attachment in a shader
    pub fn is_sampled(&self) -> bool {
        self.usage().contains(TextureUsage::SAMPLED)
    }

    pub fn size(&self) -> FramebufferSize {
        let info = self.texture.info();
        FramebufferSize { width: info.width, height: info.height }
    }
}

/// How a framebuffer's attachments are laid out
#[derive(Debug, Clone)]
struct TargetLayout {
    label: String,
    color_formats: Vec<TextureFormat>,
    depth_format: TextureFormat,
    depth_sampled: bool,
    samples: u32,
    layers: u32,
}

pub struct OffscreenFramebuffer {
    renderer: Arc<dyn Renderer>,
    layout: TargetLayout,
    size: FramebufferSize,
    attachments: Vec<Attachment>,
    render_pass: Arc<dyn RenderPass>,
    framebuffer: Arc<dyn Framebuffer>,
    clear_values: Vec<ClearValue>,
}

impl OffscreenFramebuffer {
    /// Geometry target: position, normal, albedo and depth at `samples`
    /// samples per pixel.
    pub fn create_gbuffer(renderer: Arc<dyn Renderer>, width: u32, height: u32, samples: u32) -> Result<Self> {
        let depth_format = find_depth_format(renderer.as_ref(), false, false)?;
        let layout = TargetLayout {
            label: "gbuffer".to_string(),
            color_formats: GBUFFER_COLOR_FORMATS.to_vec(),
            depth_format,
            depth_sampled: false,
            samples: samples.max(1),
            layers: 1,
        };
        Self::create(renderer, layout, width, height, 1.0)
    }

    /// Depth+stencil target rendered from the light, sized independently of
    /// the presentation surface.
    pub fn create_shadow_map(renderer: Arc<dyn Renderer>, size: u32, layers: u32, clear_depth: f32) -> Result<Self> {
        let depth_format = find_depth_format(renderer.as_ref(), true, true)?;
        let layout = TargetLayout {
            label: "shadow_map".to_string(),
            color_formats: Vec::new(),
            depth_format,
            depth_sampled: true,
            samples: 1,
            layers: layers.max(1),
        };
        Self::create(renderer, layout, size, size, clear_depth)
    }

    fn create(
        renderer: Arc<dyn Renderer>,
        layout: TargetLayout,
        width: u32,
        height: u32,
        clear_depth: f32,
    ) -> Result<Self> {
        Self::check_size(renderer.as_ref(), &layout.label, width, height)?;

        let render_pass = renderer.create_render_pass(&Self::render_pass_desc(&layout))?;
        let attachments = Self::create_attachments(renderer.as_ref(), &layout, width, height)?;
        let framebuffer = Self::create_framebuffer(renderer.as_ref(), &render_pass, &attachments, &layout, width, height)?;

        let mut clear_values: Vec<ClearValue> = layout
            .color_formats
            .iter()
            .map(|_| ClearValue::Color([0.0, 0.0, 0.0, 0.0]))
            .collect();
        clear_values.push(ClearValue::DepthStencil { depth: clear_depth, stencil: 0 });

        engine_debug!(
            "umbra::framebuffer",
            "'{}' created: {}x{}, {} attachments, depth {:?}, {} samples",
            layout.label, width, height, attachments.len(), layout.depth_format, layout.samples
        );

        Ok(Self {
            renderer,
            layout,
            size: FramebufferSize { width, height },
            attachments,
            render_pass,
            framebuffer,
            clear_values,
        })
    }

    fn check_size(renderer: &dyn Renderer, label: &str, width: u32, height: u32) -> Result<()> {
        let max = renderer.limits().max_image_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(engine_fail!(
                "umbra::framebuffer",
                Error::InvalidResource(format!(
                    "'{}': size {}x{} outside 1..={}", label, width, height, max
                ))
            ));
        }
        Ok(())
    }

    /// Attachment descriptions and the two dependencies guarding the subpass
    fn render_pass_desc(layout: &TargetLayout) -> RenderPassDesc {
        let color_attachments = layout
            .color_formats
            .iter()
            .map(|&format| AttachmentDesc {
                format,
                samples: layout.samples,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::ShaderReadOnly,
            })
            .collect::<Vec<_>>();

        let depth_attachment = AttachmentDesc {
            format: layout.depth_format,
            samples: layout.samples,
            load_op: LoadOp::Clear,
            store_op: if layout.depth_sampled { StoreOp::Store } else { StoreOp::DontCare },
            stencil_load_op: LoadOp::Clear,
            stencil_store_op: StoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::DepthStencilReadOnly,
        };

        let writes_color = !color_attachments.is_empty();
        let (attachment_stages, attachment_writes) = if writes_color {
            (
                PipelineStages::COLOR_ATTACHMENT_OUTPUT
                    | PipelineStages::EARLY_FRAGMENT_TESTS
                    | PipelineStages::LATE_FRAGMENT_TESTS,
                AccessFlags::COLOR_ATTACHMENT_READ
                    | AccessFlags::COLOR_ATTACHMENT_WRITE
                    | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (
                PipelineStages::EARLY_FRAGMENT_TESTS | PipelineStages::LATE_FRAGMENT_TESTS,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        };

        let dependencies = vec![
            // Previous frame's sampling must finish before the attachments are overwritten
            SubpassDependency {
                src_subpass: SubpassRef::External,
                dst_subpass: SubpassRef::Index(0),
                src_stages: PipelineStages::FRAGMENT_SHADER,
                dst_stages: attachment_stages,
                src_access: AccessFlags::SHADER_READ,
                dst_access: attachment_writes,
                by_region: true,
            },
            // Attachment writes are visible to the fragment shaders that sample them
            SubpassDependency {
                src_subpass: SubpassRef::Index(0),
                dst_subpass: SubpassRef::External,
                src_stages: attachment_stages,
                dst_stages: PipelineStages::FRAGMENT_SHADER,
                src_access: attachment_writes,
                dst_access: AccessFlags::SHADER_READ,
                by_region: true,
            },
        ];

        RenderPassDesc {
            label: layout.label.clone(),
            color_attachments,
            depth_attachment: Some(depth_attachment),
            dependencies,
        }
    }

    fn create_attachments(
        renderer: &dyn Renderer,
        layout: &TargetLayout,
        width: u32,
        height: u32,
    ) -> Result<Vec<Attachment>> {
        let mut attachments = Vec::with_capacity(layout.color_formats.len() + 1);

        for (i, &format) in layout.color_formats.iter().enumerate() {
            let name = GBUFFER_COLOR_NAMES.get(i).copied().unwrap_or("color");
            let mut desc = TextureDesc::attachment(
                &format!("{}.{}", layout.label, name),
                width,
                height,
                format,
                TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            );
            desc.samples = layout.samples;
            desc.array_layers = layout.layers;
            attachments.push(Attachment { texture: renderer.create_texture(desc)? });
        }

        let mut depth_usage = TextureUsage::DEPTH_STENCIL_ATTACHMENT;
        if layout.depth_sampled {
            depth_usage |= TextureUsage::SAMPLED;
        }
        let mut desc = TextureDesc::attachment(
            &format!("{}.depth", layout.label),
            width,
            height,
            layout.depth_format,
            depth_usage,
        );
        desc.samples = layout.samples;
        desc.array_layers = layout.layers;
        attachments.push(Attachment { texture: renderer.create_texture(desc)? });

        Ok(attachments)
    }

    fn create_framebuffer(
        renderer: &dyn Renderer,
        render_pass: &Arc<dyn RenderPass>,
        attachments: &[Attachment],
        layout: &TargetLayout,
        width: u32,
        height: u32,
    ) -> Result<Arc<dyn Framebuffer>> {
        let color_count = layout.color_formats.len();
        renderer.create_framebuffer(&FramebufferDesc {
            render_pass,
            color_attachments: attachments[..color_count].iter().map(|a| Arc::clone(&a.texture)).collect(),
            depth_attachment: attachments.get(color_count).map(|a| Arc::clone(&a.texture)),
            width,
            height,
            layers: layout.layers,
        })
    }

    /// Recreate the attachments and the framebuffer at a new size.
    ///
    /// The render pass is kept, so pipelines built against it stay valid.
    /// The caller must make sure no in-flight frame still uses the old
    /// attachments.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        Self::check_size(self.renderer.as_ref(), &self.layout.label, width, height)?;

        let attachments = Self::create_attachments(self.renderer.as_ref(), &self.layout, width, height)?;
        let framebuffer = Self::create_framebuffer(
            self.renderer.as_ref(),
            &self.render_pass,
            &attachments,
            &self.layout,
            width,
            height,
        )?;

        // The old framebuffer goes before the images it references
        self.framebuffer = framebuffer;
        self.attachments = attachments;
        self.size = FramebufferSize { width, height };

        engine_debug!("umbra::framebuffer", "'{}' resized to {}x{}", self.layout.label, width, height);
        Ok(())
    }

    pub fn size(&self) -> FramebufferSize {
        self.size
    }

    pub fn label(&self) -> &str {
        &self.layout.label
    }

    /// Color attachments first, depth last
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, index: usize) -> Option<&Attachment> {
        self.attachments.get(index)
    }

    pub fn color_attachment_count(&self) -> usize {
        self.layout.color_formats.len()
    }

    pub fn depth_attachment(&self) -> &Attachment {
        // create_attachments always pushes depth last
        &self.attachments[self.attachments.len() - 1]
    }

    pub fn depth_format(&self) -> TextureFormat {
        self.layout.depth_format
    }

    pub fn samples(&self) -> u32 {
        self.layout.samples
    }

    pub fn layers(&self) -> u32 {
        self.layout.layers
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.render_pass
    }

    pub fn framebuffer(&self) -> &Arc<dyn Framebuffer> {
        &self.framebuffer
    }

    /// One clear value per attachment, in attachment order
    pub fn clear_values(&self) -> &[ClearValue] {
        &self.clear_values
    }
}

#[cfg(test)]
#[path = "framebuffer_tests.rs"]
mod tests;
