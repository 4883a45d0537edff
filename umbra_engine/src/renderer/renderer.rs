/// Renderer trait - main GPU factory and queue interface

use std::sync::Arc;
use bitflags::bitflags;
use crate::error::Result;
use crate::log::LogSeverity;
use crate::renderer::{
    Buffer, Texture, Shader, Pipeline, PipelineLayout, PipelineCache,
    RenderPass, Framebuffer, BindingLayout, BindingGroup, CommandList,
    Fence, Semaphore,
    BufferDesc, TextureDesc, TextureFormat, ShaderDesc, PipelineDesc, PipelineLayoutDesc,
    RenderPassDesc, FramebufferDesc, BindingLayoutDesc, BindingWrite, PipelineStages,
};

// ============================================================================
// Configuration and device queries
// ============================================================================

/// Backend configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Lowest validation message severity forwarded to the engine log
    pub debug_severity: LogSeverity,
    /// Count validation messages by severity
    pub enable_validation_stats: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Umbra Application".to_string(),
            app_version: (1, 0, 0),
            debug_severity: LogSeverity::Warn,
            enable_validation_stats: false,
        }
    }
}

/// Renderer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RendererStats {
    /// Queue submissions since creation
    pub submissions: u64,
    /// Live buffer allocations
    pub buffers: u32,
    /// Live texture allocations
    pub textures: u32,
    /// GPU memory used (bytes)
    pub gpu_memory_used: u64,
}

/// Device limits the deferred pipeline sizes itself against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Highest sample count usable by both color and depth attachments
    pub max_sample_count: u32,
    /// Required alignment of storage-buffer binding offsets
    pub min_storage_buffer_offset_alignment: u64,
    /// Required alignment of uniform-buffer binding offsets
    pub min_uniform_buffer_offset_alignment: u64,
    /// Largest 2D image dimension
    pub max_image_dimension_2d: u32,
}

/// Image tiling a format is queried for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTiling {
    Linear,
    Optimal,
}

bitflags! {
    /// Features a format supports for a given tiling
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatFeatures: u32 {
        const SAMPLED_IMAGE = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        const SAMPLED_IMAGE_FILTER_LINEAR = 1 << 3;
        const TRANSFER_DST = 1 << 4;
    }
}

/// Reported format capabilities per tiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatProperties {
    pub linear: FormatFeatures,
    pub optimal: FormatFeatures,
}

impl FormatProperties {
    /// Features for `tiling`
    pub fn features(&self, tiling: ImageTiling) -> FormatFeatures {
        match tiling {
            ImageTiling::Linear => self.linear,
            ImageTiling::Optimal => self.optimal,
        }
    }
}

/// One queue submission
pub struct Submission<'a> {
    /// Command lists, executed in order
    pub command_lists: &'a [&'a dyn CommandList],
    /// Semaphores to wait on, each before the given stages
    pub wait_semaphores: &'a [(&'a dyn Semaphore, PipelineStages)],
    /// Semaphores signaled when the lists complete
    pub signal_semaphores: &'a [&'a dyn Semaphore],
    /// Fence signaled when the lists complete
    pub fence: Option<&'a dyn Fence>,
}

// ============================================================================
// Renderer trait
// ============================================================================

/// Main renderer trait
///
/// This is the central factory interface for creating GPU resources and
/// submitting work. Implemented by backend-specific renderers (e.g.,
/// VulkanRenderer). All methods take `&self` so one `Arc<dyn Renderer>` can
/// be shared by every component; implementations synchronize internally.
pub trait Renderer: Send + Sync {
    /// Create a texture (image, memory and view)
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>>;

    /// Create a buffer
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a shader module
    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    /// Create a render pass
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Create a binding layout
    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>>;

    /// Create an immutable binding group from a layout and its writes
    ///
    /// # Arguments
    ///
    /// * `layout` - Layout the group is allocated from
    /// * `set_index` - Set number the group is bound at
    /// * `writes` - One write per populated slot
    fn create_binding_group(
        &self,
        layout: &Arc<dyn BindingLayout>,
        set_index: u32,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>>;

    /// Create a pipeline layout
    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>>;

    /// Create a pipeline cache seeded with `initial_data` (may be empty)
    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<Arc<dyn PipelineCache>>;

    /// Create a graphics pipeline
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a command list
    fn create_command_list(&self, label: &str) -> Result<Box<dyn CommandList>>;

    /// Create a binary semaphore
    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    /// Create an unsignaled fence
    fn create_fence(&self) -> Result<Arc<dyn Fence>>;

    /// Insert a fence behind all work submitted so far
    fn insert_fence(&self) -> Result<Arc<dyn Fence>>;

    /// Submit command lists to the graphics queue
    fn submit(&self, submission: &Submission) -> Result<()>;

    /// Query the capabilities of a format
    fn format_properties(&self, format: TextureFormat) -> FormatProperties;

    /// Device limits
    fn limits(&self) -> DeviceLimits;

    /// Wait for all GPU operations to complete
    fn wait_idle(&self) -> Result<()>;

    /// Get statistics about the renderer
    fn stats(&self) -> RendererStats;
}
