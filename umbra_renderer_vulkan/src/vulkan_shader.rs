/// Shader - Vulkan implementation of the Shader trait
///
/// Besides the module, each shader keeps the descriptor bindings its entry
/// point references (reflected with spirq) so pipeline creation can check
/// them against the pipeline layout.

use umbra_engine::umbra::Result;
use umbra_engine::umbra::render::{BindingType, Shader as RendererShader, ShaderDesc, ShaderStage};
use umbra_engine::{engine_bail_warn, engine_err, engine_trace};
use ash::vk;
use std::ffi::CString;
use std::io::Cursor;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// A descriptor binding referenced by a shader entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReflectedBinding {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub binding_type: BindingType,
}

/// Vulkan shader implementation
pub struct Shader {
    ctx: Arc<GpuContext>,
    /// Vulkan shader module
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    /// Entry point name
    pub(crate) entry_point: CString,
    pub(crate) reflected_bindings: Vec<ReflectedBinding>,
}

impl Shader {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ShaderDesc) -> Result<Self> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            engine_bail_warn!("umbra::vulkan",
                "Shader '{}': code not 4-byte aligned (size: {} bytes)", desc.label, desc.code.len());
        }

        let code = ash::util::read_spv(&mut Cursor::new(desc.code))
            .map_err(|e| engine_err!("umbra::vulkan", "Shader '{}': invalid SPIR-V: {}", desc.label, e))?;
        let entry_point = CString::new(desc.entry_point)
            .map_err(|_| engine_err!("umbra::vulkan",
                "Shader '{}': entry point contains a NUL byte", desc.label))?;
        let reflected_bindings = reflect_bindings(&code, desc)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe {
            ctx.device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("umbra::vulkan",
                    "Failed to create shader module '{}': {:?}", desc.label, e))?
        };

        engine_trace!("umbra::vulkan", "Shader '{}' created ({:?}, {} binding(s))",
            desc.label, desc.stage, reflected_bindings.len());

        Ok(Self {
            ctx,
            module,
            stage: desc.stage,
            entry_point,
            reflected_bindings,
        })
    }
}

/// Parse SPIR-V bytecode and extract the descriptor bindings of the
/// requested entry point
fn reflect_bindings(code: &[u32], desc: &ShaderDesc) -> Result<Vec<ReflectedBinding>> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("umbra::vulkan",
            "SPIR-V reflection failed for '{}': {:?}", desc.label, e))?;

    let Some(entry_point) = entry_points.iter().find(|ep| ep.name == desc.entry_point) else {
        engine_bail_warn!("umbra::vulkan",
            "Shader '{}' has no entry point named '{}'", desc.label, desc.entry_point);
    };

    let mut bindings = Vec::new();
    for var in entry_point.vars.iter() {
        if let spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, .. } = var {
            bindings.push(ReflectedBinding {
                name: name.clone().unwrap_or_default(),
                set: desc_bind.set(),
                binding: desc_bind.bind(),
                binding_type: spirq_desc_type_to_binding_type(desc_ty)?,
            });
        }
    }
    Ok(bindings)
}

fn spirq_desc_type_to_binding_type(desc_ty: &spirq::ty::DescriptorType) -> Result<BindingType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::UniformBuffer() => Ok(BindingType::UniformBuffer),
        DescriptorType::StorageBuffer(..) => Ok(BindingType::StorageBuffer),
        DescriptorType::CombinedImageSampler() => Ok(BindingType::CombinedImageSampler),
        DescriptorType::SampledImage() => Ok(BindingType::SampledImage),
        DescriptorType::Sampler() => Ok(BindingType::Sampler),
        other => Err(engine_err!("umbra::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other)),
    }
}

impl RendererShader for Shader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}
