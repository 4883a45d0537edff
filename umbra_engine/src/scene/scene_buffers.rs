/// GPU buffers describing the scene geometry
///
/// Vertex and index data are shared by every mesh. The indirect buffer holds
/// one `IndirectDrawCommand` per mesh and the count buffer holds the number
/// of valid commands, read by the GPU at draw time.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::renderer::{Buffer, BufferDesc, BufferUsage, IndexType, Renderer};
use crate::scene::{DrawList, IndirectDrawCommand, MeshVertex};
use crate::{engine_debug, engine_fail};

pub struct SceneBuffers {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub index_buffer: Arc<dyn Buffer>,
    pub index_type: IndexType,
    pub indirect_buffer: Arc<dyn Buffer>,
    pub count_buffer: Arc<dyn Buffer>,
    /// Upper bound on the count buffer's value
    pub max_draw_count: u32,
}

impl SceneBuffers {
    /// Create and fill the scene buffers.
    ///
    /// `max_draw_count` sizes the indirect buffer; it must hold at least the
    /// draw list's commands.
    pub fn upload(
        renderer: &dyn Renderer,
        label: &str,
        vertices: &[MeshVertex],
        indices: &[u32],
        draw_list: &DrawList,
        max_draw_count: u32,
    ) -> Result<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(engine_fail!(
                "umbra::scene",
                Error::InvalidResource(format!(
                    "scene '{}' has {} vertices and {} indices",
                    label, vertices.len(), indices.len()
                ))
            ));
        }
        let max_draw_count = max_draw_count.max(1);

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let vertex_buffer = renderer.create_buffer(BufferDesc::mapped(
            &format!("{}.vertices", label),
            vertex_bytes.len() as u64,
            BufferUsage::VERTEX,
        ))?;
        vertex_buffer.update(0, vertex_bytes)?;

        let index_bytes: &[u8] = bytemuck::cast_slice(indices);
        let index_buffer = renderer.create_buffer(BufferDesc::mapped(
            &format!("{}.indices", label),
            index_bytes.len() as u64,
            BufferUsage::INDEX,
        ))?;
        index_buffer.update(0, index_bytes)?;

        let indirect_buffer = renderer.create_buffer(BufferDesc::mapped(
            &format!("{}.indirect", label),
            max_draw_count as u64 * IndirectDrawCommand::STRIDE as u64,
            BufferUsage::INDIRECT,
        ))?;
        let count_buffer = renderer.create_buffer(BufferDesc::mapped(
            &format!("{}.draw_count", label),
            std::mem::size_of::<u32>() as u64,
            BufferUsage::INDIRECT,
        ))?;

        let buffers = Self {
            vertex_buffer,
            index_buffer,
            index_type: IndexType::U32,
            indirect_buffer,
            count_buffer,
            max_draw_count,
        };
        buffers.update_draws(draw_list)?;

        engine_debug!(
            "umbra::scene",
            "'{}': {} vertices, {} indices, {} draws (max {})",
            label, vertices.len(), indices.len(), draw_list.draw_count(), max_draw_count
        );
        Ok(buffers)
    }

    /// Rewrite the indirect commands and the draw count.
    ///
    /// Must not overlap a frame that is still reading the buffers.
    pub fn update_draws(&self, draw_list: &DrawList) -> Result<()> {
        let draw_count = draw_list.draw_count();
        if draw_count > self.max_draw_count {
            return Err(engine_fail!(
                "umbra::scene",
                Error::CapacityExceeded {
                    requested: draw_count as u64,
                    capacity: self.max_draw_count as u64,
                }
            ));
        }
        self.indirect_buffer.update(0, draw_list.command_bytes())?;
        self.count_buffer.update(0, bytemuck::bytes_of(&draw_count))?;
        Ok(())
    }

    /// Byte stride between indirect commands
    pub fn draw_stride(&self) -> u32 {
        IndirectDrawCommand::STRIDE
    }
}

#[cfg(test)]
#[path = "scene_buffers_tests.rs"]
mod tests;
