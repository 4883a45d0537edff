/// BindingLayout / BindingGroup - Vulkan implementations of the binding traits
///
/// Every layout owns the descriptor pools its groups are allocated from.
/// Pools are sized from the layout itself, hold `SETS_PER_POOL` sets each
/// and a new one is added when the current pools are exhausted. Groups free
/// their set when dropped, so rebuilding a group every frame does not grow
/// the pool list.

use umbra_engine::umbra::{Error, Result};
use umbra_engine::umbra::render::{
    BindingGroup as RendererBindingGroup, BindingLayout as RendererBindingLayout, BindingLayoutDesc,
    BindingResource, BindingType, BindingWrite, Buffer as RendererBuffer, Texture as RendererTexture,
};
use umbra_engine::{engine_bail_warn, engine_debug, engine_err};
use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{binding_type_to_vk, image_layout_to_vk, stage_flags_to_vk};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_texture::Texture;

const SETS_PER_POOL: u32 = 16;

// ============================================================================
// Descriptor pools
// ============================================================================

pub(crate) struct DescriptorPools {
    ctx: Arc<GpuContext>,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    pools: Mutex<Vec<vk::DescriptorPool>>,
}

impl DescriptorPools {
    fn new(ctx: Arc<GpuContext>, desc: &BindingLayoutDesc) -> Self {
        let mut counts: FxHashMap<vk::DescriptorType, u32> = FxHashMap::default();
        for entry in &desc.entries {
            *counts.entry(binding_type_to_vk(entry.binding_type)).or_insert(0) += entry.count.max(1);
        }
        let pool_sizes = counts
            .into_iter()
            .map(|(ty, count)| vk::DescriptorPoolSize {
                ty,
                descriptor_count: count * SETS_PER_POOL,
            })
            .collect();

        Self {
            ctx,
            pool_sizes,
            pools: Mutex::new(Vec::new()),
        }
    }

    fn create_pool(&self) -> Result<vk::DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .pool_sizes(&self.pool_sizes)
            .max_sets(SETS_PER_POOL);

        unsafe {
            self.ctx.device.create_descriptor_pool(&info, None)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfMemory,
                    e => engine_err!("umbra::vulkan", "Failed to create descriptor pool: {:?}", e),
                })
        }
    }

    /// Allocate one set, growing the pool list when every pool is full
    fn allocate(&self, layout: vk::DescriptorSetLayout) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let mut pools = self.pools.lock()
            .map_err(|_| engine_err!("umbra::vulkan", "Descriptor pool lock poisoned"))?;
        let layouts = [layout];

        for &pool in pools.iter().rev() {
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok((pool, sets[0])),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => continue,
                Err(e) => return Err(engine_err!("umbra::vulkan", "Failed to allocate descriptor set: {:?}", e)),
            }
        }

        let pool = self.create_pool()?;
        pools.push(pool);
        engine_debug!("umbra::vulkan", "Descriptor pools exhausted, created new pool (total: {})", pools.len());

        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            self.ctx.device.allocate_descriptor_sets(&allocate_info)
                .map_err(|e| engine_err!("umbra::vulkan",
                    "Failed to allocate descriptor set after pool growth: {:?}", e))?
        };
        Ok((pool, sets[0]))
    }

    fn free(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        // Freeing must not race an allocation from the same pool
        if let Ok(_pools) = self.pools.lock() {
            unsafe {
                let _ = self.ctx.device.free_descriptor_sets(pool, &[set]);
            }
        }
    }
}

impl Drop for DescriptorPools {
    fn drop(&mut self) {
        if let Ok(pools) = self.pools.get_mut() {
            for pool in pools.drain(..) {
                unsafe { self.ctx.device.destroy_descriptor_pool(pool, None); }
            }
        }
    }
}

// ============================================================================
// BindingLayout
// ============================================================================

/// Vulkan descriptor set layout plus the pools its sets come from
pub struct BindingLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    pools: Arc<DescriptorPools>,
    desc: BindingLayoutDesc,
}

impl BindingLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BindingLayoutDesc) -> Result<Self> {
        for (i, entry) in desc.entries.iter().enumerate() {
            if desc.entries[..i].iter().any(|e| e.binding == entry.binding) {
                engine_bail_warn!("umbra::vulkan", "Binding {} declared twice in layout", entry.binding);
            }
        }

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.entries
            .iter()
            .map(|entry| vk::DescriptorSetLayoutBinding::default()
                .binding(entry.binding)
                .descriptor_type(binding_type_to_vk(entry.binding_type))
                .descriptor_count(entry.count.max(1))
                .stage_flags(stage_flags_to_vk(entry.stage_flags)))
            .collect();

        let binding_flags: Vec<vk::DescriptorBindingFlags> = desc.entries
            .iter()
            .map(|entry| if entry.partially_bound {
                vk::DescriptorBindingFlags::PARTIALLY_BOUND
            } else {
                vk::DescriptorBindingFlags::empty()
            })
            .collect();
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(&binding_flags);

        let mut layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        if desc.entries.iter().any(|entry| entry.partially_bound) {
            layout_info = layout_info.push_next(&mut flags_info);
        }

        let layout = unsafe {
            ctx.device.create_descriptor_set_layout(&layout_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create descriptor set layout: {:?}", e))?
        };

        Ok(Self {
            pools: Arc::new(DescriptorPools::new(Arc::clone(&ctx), desc)),
            ctx,
            layout,
            desc: desc.clone(),
        })
    }
}

impl RendererBindingLayout for BindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

impl Drop for BindingLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

// ============================================================================
// BindingGroup
// ============================================================================

/// Vulkan binding group implementation
///
/// Wraps a VkDescriptorSet. Immutable after creation: create a new group to
/// change resources.
pub struct BindingGroup {
    pools: Arc<DescriptorPools>,
    pool: vk::DescriptorPool,
    /// Vulkan descriptor set handle
    pub(crate) descriptor_set: vk::DescriptorSet,
    set_index: u32,
    layout: Arc<dyn RendererBindingLayout>,
}

/// Resolved descriptor info for one write
enum WriteInfo {
    Buffer(vk::DescriptorBufferInfo),
    Images(Vec<vk::DescriptorImageInfo>),
}

fn check_type(binding: u32, declared: BindingType, accepted: &[BindingType]) -> Result<()> {
    if !accepted.contains(&declared) {
        engine_bail_warn!("umbra::vulkan",
            "Binding {} is declared as {:?}, which does not accept {:?}", binding, declared, accepted);
    }
    Ok(())
}

fn buffer_info(buffer: &dyn RendererBuffer, offset: u64, range: u64) -> Result<vk::DescriptorBufferInfo> {
    if range == 0 || offset + range > buffer.size() {
        engine_bail_warn!("umbra::vulkan",
            "Buffer binding range {}..{} outside buffer of {} bytes", offset, offset + range, buffer.size());
    }
    let vk_buffer = unsafe { &*(buffer as *const dyn RendererBuffer as *const Buffer) };
    Ok(vk::DescriptorBufferInfo::default()
        .buffer(vk_buffer.buffer)
        .offset(offset)
        .range(range))
}

fn texture_view(texture: &dyn RendererTexture) -> vk::ImageView {
    let vk_texture = unsafe { &*(texture as *const dyn RendererTexture as *const Texture) };
    vk_texture.sampled_view()
}

impl BindingGroup {
    pub(crate) fn new(
        layout: &Arc<dyn RendererBindingLayout>,
        set_index: u32,
        writes: &[BindingWrite],
        samplers: &mut SamplerCache,
    ) -> Result<Self> {
        // Downcast layout to access the descriptor set layout and its pools
        let vk_layout = unsafe {
            &*(layout.as_ref() as *const dyn RendererBindingLayout as *const BindingLayout)
        };
        let desc = &vk_layout.desc;

        let mut infos: Vec<(u32, vk::DescriptorType, WriteInfo)> = Vec::with_capacity(writes.len());
        for write in writes {
            let Some(entry) = desc.entry(write.binding) else {
                engine_bail_warn!("umbra::vulkan", "Binding {} is not declared in the layout", write.binding);
            };
            let declared = entry.binding_type;

            let info = match &write.resource {
                BindingResource::UniformBuffer { buffer, offset, range } => {
                    check_type(write.binding, declared, &[BindingType::UniformBuffer])?;
                    WriteInfo::Buffer(buffer_info(*buffer, *offset, *range)?)
                }
                BindingResource::StorageBuffer { buffer, offset, range } => {
                    check_type(write.binding, declared,
                        &[BindingType::StorageBuffer, BindingType::StorageBufferDynamic])?;
                    WriteInfo::Buffer(buffer_info(*buffer, *offset, *range)?)
                }
                BindingResource::Sampler(sampler_type) => {
                    check_type(write.binding, declared, &[BindingType::Sampler])?;
                    let sampler = samplers.get(*sampler_type)?;
                    WriteInfo::Images(vec![vk::DescriptorImageInfo::default().sampler(sampler)])
                }
                BindingResource::SampledImageArray(textures) => {
                    check_type(write.binding, declared, &[BindingType::SampledImage])?;
                    let count = entry.count.max(1) as usize;
                    if textures.len() > count {
                        return Err(Error::CapacityExceeded {
                            requested: textures.len() as u64,
                            capacity: count as u64,
                        });
                    }
                    if textures.len() < count && !entry.partially_bound {
                        engine_bail_warn!("umbra::vulkan",
                            "Binding {} needs {} images but only {} were given", write.binding, count, textures.len());
                    }
                    if textures.is_empty() {
                        continue;
                    }
                    WriteInfo::Images(textures
                        .iter()
                        .map(|texture| vk::DescriptorImageInfo::default()
                            .image_view(texture_view(*texture))
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))
                        .collect())
                }
                BindingResource::SampledTexture { texture, sampler, layout } => {
                    check_type(write.binding, declared, &[BindingType::CombinedImageSampler])?;
                    let sampler = samplers.get(*sampler)?;
                    WriteInfo::Images(vec![vk::DescriptorImageInfo::default()
                        .image_view(texture_view(*texture))
                        .image_layout(image_layout_to_vk(*layout))
                        .sampler(sampler)])
                }
            };
            infos.push((write.binding, binding_type_to_vk(declared), info));
        }

        let (pool, descriptor_set) = vk_layout.pools.allocate(vk_layout.layout)?;

        let vk_writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .map(|(binding, descriptor_type, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(descriptor_set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*descriptor_type);
                match info {
                    WriteInfo::Buffer(buffer) => write.buffer_info(std::slice::from_ref(buffer)),
                    WriteInfo::Images(images) => write.image_info(images),
                }
            })
            .collect();

        unsafe {
            vk_layout.ctx.device.update_descriptor_sets(&vk_writes, &[]);
        }

        Ok(Self {
            pools: Arc::clone(&vk_layout.pools),
            pool,
            descriptor_set,
            set_index,
            layout: Arc::clone(layout),
        })
    }
}

impl RendererBindingGroup for BindingGroup {
    fn set_index(&self) -> u32 {
        self.set_index
    }

    fn layout(&self) -> &Arc<dyn RendererBindingLayout> {
        &self.layout
    }
}

impl Drop for BindingGroup {
    fn drop(&mut self) {
        self.pools.free(self.pool, self.descriptor_set);
    }
}
