/// SamplerCache - internal VkSampler management for the Vulkan backend
///
/// Creates and caches one VkSampler per `SamplerType` on first use. The
/// deferred pipeline needs at most five, so the cache never evicts.

use umbra_engine::umbra::Result;
use umbra_engine::umbra::render::SamplerType;
use umbra_engine::{engine_debug, engine_err};
use ash::vk;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

pub(crate) struct SamplerCache {
    ctx: Option<Arc<GpuContext>>,
    cache: FxHashMap<SamplerType, vk::Sampler>,
    max_anisotropy: f32,
}

/// Filter, address mode, anisotropy and border color of one preset
struct SamplerParams {
    filter: vk::Filter,
    mipmap_mode: vk::SamplerMipmapMode,
    address_mode: vk::SamplerAddressMode,
    anisotropy: Option<f32>,
    border_color: vk::BorderColor,
}

impl SamplerCache {
    pub(crate) fn new(ctx: Arc<GpuContext>, max_anisotropy: f32) -> Self {
        Self {
            ctx: Some(ctx),
            cache: FxHashMap::default(),
            max_anisotropy,
        }
    }

    /// Get or create the VkSampler for `sampler_type`
    pub(crate) fn get(&mut self, sampler_type: SamplerType) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(&sampler_type) {
            return Ok(sampler);
        }

        let ctx = self.ctx.as_ref()
            .ok_or_else(|| engine_err!("umbra::vulkan", "Sampler cache used after shutdown"))?;
        let sampler = Self::create_vk_sampler(ctx, Self::params(sampler_type, self.max_anisotropy))?;
        engine_debug!("umbra::vulkan", "Created sampler {:?}", sampler_type);
        self.cache.insert(sampler_type, sampler);
        Ok(sampler)
    }

    /// Destroy all cached VkSamplers and release the GpuContext reference.
    /// Called from `VulkanRenderer::drop()` while the device is still alive.
    pub(crate) fn shutdown(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            for (_, sampler) in self.cache.drain() {
                unsafe { ctx.device.destroy_sampler(sampler, None); }
            }
        }
    }

    fn params(sampler_type: SamplerType, max_anisotropy: f32) -> SamplerParams {
        let anisotropy = (max_anisotropy > 1.0).then_some(max_anisotropy);
        match sampler_type {
            SamplerType::LinearRepeat => SamplerParams {
                filter: vk::Filter::LINEAR,
                mipmap_mode: vk::SamplerMipmapMode::LINEAR,
                address_mode: vk::SamplerAddressMode::REPEAT,
                anisotropy,
                border_color: vk::BorderColor::FLOAT_OPAQUE_BLACK,
            },
            SamplerType::LinearClamp => SamplerParams {
                filter: vk::Filter::LINEAR,
                mipmap_mode: vk::SamplerMipmapMode::LINEAR,
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                anisotropy,
                border_color: vk::BorderColor::FLOAT_OPAQUE_BLACK,
            },
            SamplerType::NearestRepeat => SamplerParams {
                filter: vk::Filter::NEAREST,
                mipmap_mode: vk::SamplerMipmapMode::NEAREST,
                address_mode: vk::SamplerAddressMode::REPEAT,
                anisotropy: None,
                border_color: vk::BorderColor::FLOAT_OPAQUE_BLACK,
            },
            SamplerType::NearestClamp => SamplerParams {
                filter: vk::Filter::NEAREST,
                mipmap_mode: vk::SamplerMipmapMode::NEAREST,
                address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                anisotropy: None,
                border_color: vk::BorderColor::FLOAT_OPAQUE_BLACK,
            },
            // Outside the shadow map reads as fully lit
            SamplerType::Shadow => SamplerParams {
                filter: vk::Filter::LINEAR,
                mipmap_mode: vk::SamplerMipmapMode::NEAREST,
                address_mode: vk::SamplerAddressMode::CLAMP_TO_BORDER,
                anisotropy: None,
                border_color: vk::BorderColor::FLOAT_OPAQUE_WHITE,
            },
        }
    }

    fn create_vk_sampler(ctx: &GpuContext, params: SamplerParams) -> Result<vk::Sampler> {
        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(params.filter)
            .min_filter(params.filter)
            .mipmap_mode(params.mipmap_mode)
            .address_mode_u(params.address_mode)
            .address_mode_v(params.address_mode)
            .address_mode_w(params.address_mode)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(params.border_color)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .unnormalized_coordinates(false);

        create_info = match params.anisotropy {
            Some(max_aniso) => create_info.anisotropy_enable(true).max_anisotropy(max_aniso),
            None => create_info.anisotropy_enable(false).max_anisotropy(1.0),
        };

        unsafe {
            ctx.device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan", "Failed to create VkSampler: {:?}", e))
        }
    }
}

impl Drop for SamplerCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
