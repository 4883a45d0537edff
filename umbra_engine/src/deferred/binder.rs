/// Resource Binder: the fixed binding layout of the deferred pipeline
///
/// All three pipelines share one binding set. Its slots are a contract with
/// the shaders:
///
/// | binding | slot | type | stage |
/// |---------|------|------|-------|
/// | 0 | vertex uniform (camera + light matrices) | uniform buffer | vertex |
/// | 1 | per-instance records | dynamic storage buffer | vertex |
/// | 2 | texture sampler | sampler | fragment |
/// | 3 | bindless texture array | sampled images, partially bound | fragment |
/// | 4 | G-buffer position | combined image sampler | fragment |
/// | 5 | G-buffer normal | combined image sampler | fragment |
/// | 6 | G-buffer albedo | combined image sampler | fragment |
/// | 7 | fragment uniform (light + debug) | uniform buffer | fragment |
/// | 8 | shadow map | combined image sampler | fragment |
///
/// The geometry half (0-3) and the composition half (4-8) are bound
/// separately. Binding groups are immutable, so each `bind` builds a new
/// group from both halves once both are known.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::renderer::{
    BindingGroup, BindingLayout, BindingLayoutDesc, BindingResource, BindingSlotDesc, BindingType,
    BindingWrite, Buffer, ImageLayout, Renderer, SamplerType, ShaderStageFlags, Texture,
};
use crate::{engine_debug, engine_fail, engine_warn_err};

/// Set number of the deferred binding group
pub const DEFERRED_BINDING_SET: u32 = 0;

/// A slot of the deferred binding layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSlot {
    VertexUniform,
    InstanceStorage,
    TextureSampler,
    TextureArray,
    GBufferPosition,
    GBufferNormal,
    GBufferAlbedo,
    FragmentUniform,
    ShadowMap,
}

/// Which half of the layout a `bind` call fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPurpose {
    Geometry,
    Composition,
}

impl BindingSlot {
    /// Every slot, in binding order
    pub const ALL: [BindingSlot; 9] = [
        BindingSlot::VertexUniform,
        BindingSlot::InstanceStorage,
        BindingSlot::TextureSampler,
        BindingSlot::TextureArray,
        BindingSlot::GBufferPosition,
        BindingSlot::GBufferNormal,
        BindingSlot::GBufferAlbedo,
        BindingSlot::FragmentUniform,
        BindingSlot::ShadowMap,
    ];

    pub fn binding(&self) -> u32 {
        match self {
            BindingSlot::VertexUniform => 0,
            BindingSlot::InstanceStorage => 1,
            BindingSlot::TextureSampler => 2,
            BindingSlot::TextureArray => 3,
            BindingSlot::GBufferPosition => 4,
            BindingSlot::GBufferNormal => 5,
            BindingSlot::GBufferAlbedo => 6,
            BindingSlot::FragmentUniform => 7,
            BindingSlot::ShadowMap => 8,
        }
    }

    pub fn binding_type(&self) -> BindingType {
        match self {
            BindingSlot::VertexUniform | BindingSlot::FragmentUniform => BindingType::UniformBuffer,
            BindingSlot::InstanceStorage => BindingType::StorageBufferDynamic,
            BindingSlot::TextureSampler => BindingType::Sampler,
            BindingSlot::TextureArray => BindingType::SampledImage,
            BindingSlot::GBufferPosition
            | BindingSlot::GBufferNormal
            | BindingSlot::GBufferAlbedo
            | BindingSlot::ShadowMap => BindingType::CombinedImageSampler,
        }
    }

    pub fn stage_flags(&self) -> ShaderStageFlags {
        match self {
            BindingSlot::VertexUniform | BindingSlot::InstanceStorage => ShaderStageFlags::VERTEX,
            _ => ShaderStageFlags::FRAGMENT,
        }
    }

    pub fn purpose(&self) -> BindPurpose {
        if self.binding() < 4 {
            BindPurpose::Geometry
        } else {
            BindPurpose::Composition
        }
    }
}

/// Resources of the geometry half (slots 0-3)
#[derive(Clone)]
pub struct GeometryBindings {
    pub vertex_uniform: Arc<dyn Buffer>,
    pub vertex_uniform_size: u64,
    /// Ring buffer holding the instance records
    pub instances: Arc<dyn Buffer>,
    /// Bytes visible from each dynamic offset (the ring's frame size)
    pub instance_window: u64,
    pub sampler: SamplerType,
    /// Bindless array; an instance's texture index selects from it
    pub textures: Vec<Arc<dyn Texture>>,
}

/// Resources of the composition half (slots 4-8)
#[derive(Clone)]
pub struct CompositionBindings {
    pub position: Arc<dyn Texture>,
    pub normal: Arc<dyn Texture>,
    pub albedo: Arc<dyn Texture>,
    pub fragment_uniform: Arc<dyn Buffer>,
    pub fragment_uniform_size: u64,
    pub shadow_map: Arc<dyn Texture>,
}

pub enum BindResources {
    Geometry(GeometryBindings),
    Composition(CompositionBindings),
}

pub struct ResourceBinder {
    renderer: Arc<dyn Renderer>,
    layout: Arc<dyn BindingLayout>,
    max_textures: u32,
    geometry: Option<GeometryBindings>,
    composition: Option<CompositionBindings>,
    group: Option<Arc<dyn BindingGroup>>,
    generation: u64,
}

impl ResourceBinder {
    /// The fixed slot list, sized for `max_textures` bindless textures
    pub fn declare_layout(max_textures: u32) -> BindingLayoutDesc {
        let entries = BindingSlot::ALL
            .iter()
            .map(|slot| {
                let is_array = *slot == BindingSlot::TextureArray;
                BindingSlotDesc {
                    binding: slot.binding(),
                    binding_type: slot.binding_type(),
                    count: if is_array { max_textures.max(1) } else { 1 },
                    stage_flags: slot.stage_flags(),
                    partially_bound: is_array,
                }
            })
            .collect();
        BindingLayoutDesc { entries }
    }

    pub fn new(renderer: Arc<dyn Renderer>, max_textures: u32) -> Result<Self> {
        let layout = renderer.create_binding_layout(&Self::declare_layout(max_textures))?;
        Ok(Self {
            renderer,
            layout,
            max_textures: max_textures.max(1),
            geometry: None,
            composition: None,
            group: None,
            generation: 0,
        })
    }

    /// Write the slots of one half and rebuild the binding group.
    ///
    /// Until both halves have been bound there is no group. The previous
    /// group is dropped, so no in-flight frame may still reference it.
    pub fn bind(&mut self, resources: BindResources) -> Result<()> {
        let (geometry, composition) = match resources {
            BindResources::Geometry(geometry) => {
                let requested = geometry.textures.len() as u64;
                if requested > self.max_textures as u64 {
                    return Err(engine_fail!(
                        "umbra::binder",
                        Error::CapacityExceeded { requested, capacity: self.max_textures as u64 }
                    ));
                }
                (Some(geometry), self.composition.clone())
            }
            BindResources::Composition(composition) => (self.geometry.clone(), Some(composition)),
        };

        // Nothing is committed unless the new group could be built
        if let (Some(g), Some(c)) = (&geometry, &composition) {
            let group = self.build_group(g, c)?;
            self.group = Some(group);
            self.generation += 1;
            engine_debug!(
                "umbra::binder",
                "Binding group #{} written with {} textures",
                self.generation, g.textures.len()
            );
        }
        self.geometry = geometry;
        self.composition = composition;
        Ok(())
    }

    fn build_group(
        &self,
        geometry: &GeometryBindings,
        composition: &CompositionBindings,
    ) -> Result<Arc<dyn BindingGroup>> {
        let mut writes = vec![
            BindingWrite {
                binding: BindingSlot::VertexUniform.binding(),
                resource: BindingResource::UniformBuffer {
                    buffer: geometry.vertex_uniform.as_ref(),
                    offset: 0,
                    range: geometry.vertex_uniform_size,
                },
            },
            BindingWrite {
                binding: BindingSlot::InstanceStorage.binding(),
                resource: BindingResource::StorageBuffer {
                    buffer: geometry.instances.as_ref(),
                    offset: 0,
                    range: geometry.instance_window,
                },
            },
            BindingWrite {
                binding: BindingSlot::TextureSampler.binding(),
                resource: BindingResource::Sampler(geometry.sampler),
            },
        ];
        // An empty array stays unbound (the slot is partially bound)
        if !geometry.textures.is_empty() {
            writes.push(BindingWrite {
                binding: BindingSlot::TextureArray.binding(),
                resource: BindingResource::SampledImageArray(
                    geometry.textures.iter().map(|t| t.as_ref()).collect(),
                ),
            });
        }

        let gbuffer = [
            (BindingSlot::GBufferPosition, &composition.position),
            (BindingSlot::GBufferNormal, &composition.normal),
            (BindingSlot::GBufferAlbedo, &composition.albedo),
        ];
        for (slot, texture) in gbuffer {
            writes.push(BindingWrite {
                binding: slot.binding(),
                resource: BindingResource::SampledTexture {
                    texture: texture.as_ref(),
                    sampler: SamplerType::LinearClamp,
                    layout: ImageLayout::ShaderReadOnly,
                },
            });
        }
        writes.push(BindingWrite {
            binding: BindingSlot::FragmentUniform.binding(),
            resource: BindingResource::UniformBuffer {
                buffer: composition.fragment_uniform.as_ref(),
                offset: 0,
                range: composition.fragment_uniform_size,
            },
        });
        writes.push(BindingWrite {
            binding: BindingSlot::ShadowMap.binding(),
            resource: BindingResource::SampledTexture {
                texture: composition.shadow_map.as_ref(),
                sampler: SamplerType::Shadow,
                layout: ImageLayout::DepthStencilReadOnly,
            },
        });

        self.renderer.create_binding_group(&self.layout, DEFERRED_BINDING_SET, &writes)
    }

    /// The current binding group
    pub fn group(&self) -> Result<&Arc<dyn BindingGroup>> {
        self.group.as_ref().ok_or_else(|| {
            engine_warn_err!(
                "umbra::binder",
                "binding group requested before both geometry and composition resources were bound"
            )
        })
    }

    pub fn layout(&self) -> &Arc<dyn BindingLayout> {
        &self.layout
    }

    pub fn is_bound(&self, purpose: BindPurpose) -> bool {
        match purpose {
            BindPurpose::Geometry => self.geometry.is_some(),
            BindPurpose::Composition => self.composition.is_some(),
        }
    }

    /// Textures in the bindless array of the current group
    pub fn texture_count(&self) -> u32 {
        self.geometry.as_ref().map_or(0, |g| g.textures.len() as u32)
    }

    /// Whether an instance may sample bindless texture `index`
    pub fn is_texture_index_valid(&self, index: u32) -> bool {
        self.group.is_some() && index < self.texture_count()
    }

    pub fn max_textures(&self) -> u32 {
        self.max_textures
    }

    /// Number of groups built so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn geometry_bindings(&self) -> Option<&GeometryBindings> {
        self.geometry.as_ref()
    }

    pub fn composition_bindings(&self) -> Option<&CompositionBindings> {
        self.composition.as_ref()
    }
}

#[cfg(test)]
#[path = "binder_tests.rs"]
mod tests;
