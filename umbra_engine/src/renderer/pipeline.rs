/// Pipeline, pipeline layout and pipeline cache traits with their descriptors

use std::sync::Arc;
use crate::error::Result;
use crate::renderer::{Shader, BufferFormat, BindingLayout, RenderPass};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Triangle list
    TriangleList,
    /// Triangle strip
    TriangleStrip,
    /// Line list
    LineList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices (max ~4 billion vertices)
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    /// Format of the attribute (data type and component count)
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexBinding {
    /// Binding index
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    /// Input rate (per-vertex or per-instance)
    pub input_rate: VertexInputRate,
}

/// Vertex input layout; empty for pipelines that generate their vertices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexLayout {
    /// Vertex bindings
    pub bindings: Vec<VertexBinding>,
    /// Vertex attributes
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.attributes.is_empty()
    }
}

// ===== RASTERIZATION =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise vertices define front face
    CounterClockwise,
    /// Clockwise vertices define front face
    Clockwise,
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    /// Fill polygons
    Fill,
    /// Draw edges only (wireframe)
    Line,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Always,
}

/// Depth bias parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    /// Constant depth offset
    pub constant_factor: f32,
    /// Slope-based depth offset
    pub slope_factor: f32,
    /// Maximum depth bias clamp (0.0 = unclamped)
    pub clamp: f32,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    /// Face culling mode
    pub cull_mode: CullMode,
    /// Front face winding order
    pub front_face: FrontFace,
    /// Polygon rendering mode
    pub polygon_mode: PolygonMode,
    /// Depth bias (None = disabled)
    pub depth_bias: Option<DepthBias>,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_bias: None,
        }
    }
}

/// Depth testing state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    /// Enable depth testing
    pub depth_test_enable: bool,
    /// Enable writing to depth buffer
    pub depth_write_enable: bool,
    /// Depth comparison operator
    pub depth_compare_op: CompareOp,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::LessOrEqual,
        }
    }
}

impl DepthStencilState {
    /// No depth test, no depth write
    pub const DISABLED: Self = Self {
        depth_test_enable: false,
        depth_write_enable: false,
        depth_compare_op: CompareOp::Always,
    };
}

// ===== COLOR BLEND =====

/// Color write mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorWriteMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorWriteMask {
    /// All channels enabled
    pub const ALL: Self = Self { r: true, g: true, b: true, a: true };
    /// No channels enabled
    pub const NONE: Self = Self { r: false, g: false, b: false, a: false };
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Per-attachment color blend state; enabled blending is standard alpha
/// blending (src alpha, one minus src alpha)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorBlendAttachment {
    /// Enable blending
    pub blend_enable: bool,
    /// Color write mask
    pub color_write_mask: ColorWriteMask,
}

/// Multisampling state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultisampleState {
    /// Samples per pixel (power of two)
    pub samples: u32,
    /// Run the fragment shader per sample
    pub sample_shading: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: 1,
            sample_shading: false,
        }
    }
}

// ===== LAYOUT & CACHE =====

/// Descriptor for creating a pipeline layout
#[derive(Clone)]
pub struct PipelineLayoutDesc {
    /// Binding layouts, indexed by set number
    pub binding_layouts: Vec<Arc<dyn BindingLayout>>,
}

/// Pipeline layout shared by every pipeline that binds the same sets
pub trait PipelineLayout: Send + Sync {
    /// Binding layouts, indexed by set number
    fn binding_layouts(&self) -> &[Arc<dyn BindingLayout>];
}

/// Pipeline cache, seeded from and serialized to bytes
pub trait PipelineCache: Send + Sync {
    /// Serialize the cache so the next run can seed from it
    fn data(&self) -> Result<Vec<u8>>;
}

// ===== PIPELINE DESCRIPTOR =====

/// Descriptor for creating a graphics pipeline
#[derive(Clone)]
pub struct PipelineDesc {
    /// Debug label
    pub label: String,
    /// Vertex shader
    pub vertex_shader: Arc<dyn Shader>,
    /// Fragment shader (None for depth-only pipelines without a fragment stage)
    pub fragment_shader: Option<Arc<dyn Shader>>,
    /// Vertex input layout
    pub vertex_layout: VertexLayout,
    /// Primitive topology
    pub topology: PrimitiveTopology,
    /// Rasterization state
    pub rasterization: RasterizationState,
    /// Depth testing state
    pub depth_stencil: DepthStencilState,
    /// One entry per color attachment of the subpass
    pub color_blend_attachments: Vec<ColorBlendAttachment>,
    /// Multisampling state
    pub multisample: MultisampleState,
    /// Pipeline layout
    pub layout: Arc<dyn PipelineLayout>,
    /// Render pass the pipeline is used in
    pub render_pass: Arc<dyn RenderPass>,
    /// Subpass index within the render pass
    pub subpass: u32,
    /// Optional pipeline cache
    pub cache: Option<Arc<dyn PipelineCache>>,
}

/// Pipeline resource trait
///
/// Implemented by backend-specific pipeline types (e.g., VulkanPipeline).
/// The pipeline is automatically destroyed when dropped.
pub trait Pipeline: Send + Sync {
    /// Debug label
    fn label(&self) -> &str;

    /// Layout the pipeline was created with
    fn layout(&self) -> &Arc<dyn PipelineLayout>;
}
