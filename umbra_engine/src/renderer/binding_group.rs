/// BindingLayout / BindingGroup traits and their descriptors
///
/// A BindingGroup is an immutable set of GPU resource bindings (textures,
/// buffers, samplers), the abstraction over a descriptor set. To change a
/// resource, create a new group from the same layout.
///
/// Key properties:
/// - Immutable after creation (no race with in-flight command lists)
/// - Layout declared up front and shared by every pipeline that binds it
/// - Pool managed internally by the renderer

use std::sync::Arc;
use crate::renderer::{Texture, Buffer, SamplerType, ShaderStage, ImageLayout};

// ============================================================================
// Binding types and layout description
// ============================================================================

/// Type of resource bound at a given slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    /// Uniform buffer (read-only structured data)
    UniformBuffer,
    /// Storage buffer (read/write structured data)
    StorageBuffer,
    /// Storage buffer whose offset is supplied at bind time
    StorageBufferDynamic,
    /// Standalone sampler
    Sampler,
    /// Sampled image (no sampler attached)
    SampledImage,
    /// Combined image sampler (texture + sampler in one binding)
    CombinedImageSampler,
}

impl BindingType {
    /// True when bind calls must supply a dynamic offset for this slot
    pub fn is_dynamic(&self) -> bool {
        matches!(self, BindingType::StorageBufferDynamic)
    }
}

/// Shader stage visibility flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStageFlags(u32);

impl ShaderStageFlags {
    pub const VERTEX: Self = Self(0x01);
    pub const FRAGMENT: Self = Self(0x02);
    pub const VERTEX_FRAGMENT: Self = Self(0x03);

    /// Create from a slice of ShaderStage
    pub fn from_stages(stages: &[ShaderStage]) -> Self {
        let mut flags = 0u32;
        for stage in stages {
            flags |= match stage {
                ShaderStage::Vertex => 0x01,
                ShaderStage::Fragment => 0x02,
            };
        }
        Self(flags)
    }

    pub fn contains_vertex(&self) -> bool { self.0 & 0x01 != 0 }
    pub fn contains_fragment(&self) -> bool { self.0 & 0x02 != 0 }
    pub fn contains(&self, stage: ShaderStage) -> bool {
        match stage {
            ShaderStage::Vertex => self.contains_vertex(),
            ShaderStage::Fragment => self.contains_fragment(),
        }
    }
    pub fn bits(&self) -> u32 { self.0 }
}

/// Description of a single binding slot within a BindingLayout
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSlotDesc {
    /// Binding number (corresponds to `layout(binding = N)` in GLSL)
    pub binding: u32,
    /// Type of resource at this binding
    pub binding_type: BindingType,
    /// Number of descriptors at this binding (>1 for arrays)
    pub count: u32,
    /// Shader stages that access this binding
    pub stage_flags: ShaderStageFlags,
    /// Array slots beyond the written ones may stay empty
    pub partially_bound: bool,
}

/// Description of a BindingLayout (blueprint for a set of bindings)
#[derive(Debug, Clone, PartialEq)]
pub struct BindingLayoutDesc {
    /// Binding slot descriptions, sorted by binding number
    pub entries: Vec<BindingSlotDesc>,
}

impl BindingLayoutDesc {
    /// Find the slot declared at `binding`
    pub fn entry(&self, binding: u32) -> Option<&BindingSlotDesc> {
        self.entries.iter().find(|e| e.binding == binding)
    }

    /// Number of dynamic offsets a bind call must supply
    pub fn dynamic_count(&self) -> usize {
        self.entries.iter().filter(|e| e.binding_type.is_dynamic()).count()
    }
}

/// Created GPU layout object
pub trait BindingLayout: Send + Sync {
    /// The description this layout was created from
    fn desc(&self) -> &BindingLayoutDesc;
}

// ============================================================================
// Binding resources (concrete data passed at creation time)
// ============================================================================

/// A concrete resource to bind into a BindingGroup
pub enum BindingResource<'a> {
    /// Uniform buffer binding
    UniformBuffer {
        buffer: &'a dyn Buffer,
        offset: u64,
        range: u64,
    },
    /// Storage buffer binding; for dynamic slots `offset` is the base the
    /// dynamic offset is added to
    StorageBuffer {
        buffer: &'a dyn Buffer,
        offset: u64,
        range: u64,
    },
    /// Standalone sampler (the backend resolves the GPU sampler from the type)
    Sampler(SamplerType),
    /// Array of sampled images; the array may be shorter than the slot count
    /// when the slot is partially bound
    SampledImageArray(Vec<&'a dyn Texture>),
    /// Texture and sampler in one binding, read in the given layout
    SampledTexture {
        texture: &'a dyn Texture,
        sampler: SamplerType,
        layout: ImageLayout,
    },
}

/// One binding write: a slot number and the resource it receives
pub struct BindingWrite<'a> {
    pub binding: u32,
    pub resource: BindingResource<'a>,
}

// ============================================================================
// BindingGroup trait
// ============================================================================

/// An immutable set of GPU resource bindings.
pub trait BindingGroup: Send + Sync {
    /// Returns the set index this BindingGroup was created for
    fn set_index(&self) -> u32;

    /// Layout the group was allocated from
    fn layout(&self) -> &Arc<dyn BindingLayout>;
}
