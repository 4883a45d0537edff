/// Flattening of meshes and their instances into indirect draw data
///
/// Each mesh with at least one instance becomes one `IndirectDrawCommand`
/// whose `first_instance` points at the mesh's first record in the
/// contiguous instance array. The shaders index that array with
/// `gl_InstanceIndex`, so one indirect-count draw covers the whole scene.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use crate::scene::PerInstanceRecord;

/// One indexed indirect draw, laid out as `VkDrawIndexedIndirectCommand`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

impl IndirectDrawCommand {
    /// Stride between consecutive commands in the indirect buffer
    pub const STRIDE: u32 = std::mem::size_of::<IndirectDrawCommand>() as u32;
}

/// Vertex layout of the shadow and geometry pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl MeshVertex {
    pub const STRIDE: u32 = std::mem::size_of::<MeshVertex>() as u32;

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }
}

/// Where a mesh lives in the shared vertex/index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRange {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: i32,
}

/// Draw commands and instance records for one frame
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<IndirectDrawCommand>,
    instances: Vec<PerInstanceRecord>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mesh drawn once per record in `instances`.
    ///
    /// Meshes without instances produce no command.
    pub fn push_mesh(&mut self, mesh: MeshRange, instances: &[PerInstanceRecord]) {
        if instances.is_empty() || mesh.index_count == 0 {
            return;
        }
        self.commands.push(IndirectDrawCommand {
            index_count: mesh.index_count,
            instance_count: instances.len() as u32,
            first_index: mesh.first_index,
            vertex_offset: mesh.vertex_offset,
            first_instance: self.instances.len() as u32,
        });
        self.instances.extend_from_slice(instances);
    }

    pub fn commands(&self) -> &[IndirectDrawCommand] {
        &self.commands
    }

    pub fn instances(&self) -> &[PerInstanceRecord] {
        &self.instances
    }

    /// Number of indirect commands (the value of the draw-count buffer)
    pub fn draw_count(&self) -> u32 {
        self.commands.len() as u32
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    pub fn command_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.commands)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every command and record, keeping the allocations
    pub fn clear(&mut self) {
        self.commands.clear();
        self.instances.clear();
    }
}

#[cfg(test)]
#[path = "draw_list_tests.rs"]
mod tests;
