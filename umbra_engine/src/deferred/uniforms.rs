/// Uniform blocks of the deferred passes and their mapped buffers

use std::marker::PhantomData;
use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec4};
use crate::deferred::DebugDisplay;
use crate::error::Result;
use crate::renderer::{Buffer, BufferDesc, BufferUsage, Renderer};
use crate::scene::{CameraView, LightSource};

/// Vertex uniform of the shadow and geometry passes (binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct OffscreenUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    /// Always identity; instance transforms come from the storage buffer
    pub model: Mat4,
    /// Used by the shadow pass in place of `projection * view`
    pub light_space: Mat4,
}

impl OffscreenUniforms {
    pub fn new(camera: &dyn CameraView, light: &dyn LightSource) -> Self {
        Self {
            projection: camera.projection(),
            view: camera.view(),
            model: Mat4::IDENTITY,
            light_space: light.light_space_matrix(),
        }
    }
}

/// Fragment uniform of the composition pass (binding 7)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositionUniforms {
    pub light_position: Vec4,
    pub light_target: Vec4,
    pub light_color: Vec4,
    pub light_space: Mat4,
    pub camera_position: Vec4,
    /// x: debug display, y: shadows enabled, z: G-buffer sample count
    pub debug: UVec4,
}

impl CompositionUniforms {
    pub fn new(
        camera: &dyn CameraView,
        light: &dyn LightSource,
        display: DebugDisplay,
        shadows_enabled: bool,
        samples: u32,
    ) -> Self {
        Self {
            light_position: light.position().extend(1.0),
            light_target: light.look_at().extend(1.0),
            light_color: light.color(),
            light_space: light.light_space_matrix(),
            camera_position: camera.position().extend(1.0),
            debug: UVec4::new(display.as_u32(), shadows_enabled as u32, samples, 0),
        }
    }
}

/// Persistently mapped buffer holding one `T`
pub struct UniformBuffer<T: Pod> {
    buffer: Arc<dyn Buffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(renderer: &dyn Renderer, label: &str) -> Result<Self> {
        let buffer = renderer.create_buffer(BufferDesc::mapped(label, Self::size(), BufferUsage::UNIFORM))?;
        Ok(Self {
            buffer,
            _marker: PhantomData,
        })
    }

    pub fn write(&self, value: &T) -> Result<()> {
        self.buffer.update(0, bytemuck::bytes_of(value))
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    /// Size of the block in bytes
    pub fn size() -> u64 {
        std::mem::size_of::<T>() as u64
    }
}

#[cfg(test)]
#[path = "uniforms_tests.rs"]
mod tests;
