/// Per-instance data streamed to the GPU every frame
///
/// The vertex stage of the shadow and geometry pipelines indexes an array of
/// these records with the instance index, so the layout is shared with the
/// shaders byte for byte.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4};

/// Model matrix and texture indices of one drawable instance
///
/// `texture_indices.x` selects the albedo texture in the bindless array. The
/// remaining components are free for the shaders (normal map, material...).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerInstanceRecord {
    pub model: Mat4,
    pub texture_indices: UVec4,
}

impl PerInstanceRecord {
    /// Size of one record in the storage buffer
    pub const SIZE: u64 = std::mem::size_of::<PerInstanceRecord>() as u64;

    pub fn new(model: Mat4, texture_indices: UVec4) -> Self {
        Self { model, texture_indices }
    }

    /// Record sampling a single texture
    pub fn with_texture(model: Mat4, texture_index: u32) -> Self {
        Self {
            model,
            texture_indices: UVec4::new(texture_index, 0, 0, 0),
        }
    }

    /// Highest texture index the record references
    pub fn max_texture_index(&self) -> u32 {
        self.texture_indices.max_element()
    }
}

impl Default for PerInstanceRecord {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            texture_indices: UVec4::ZERO,
        }
    }
}

/// View a slice of records as the bytes the ring buffer copies
pub fn instance_bytes(records: &[PerInstanceRecord]) -> &[u8] {
    bytemuck::cast_slice(records)
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
