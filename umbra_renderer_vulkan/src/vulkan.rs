/// VulkanRenderer - Vulkan implementation of the Renderer trait

use umbra_engine::umbra::{Error, Renderer, Result};
use umbra_engine::umbra::render::{
    BindingGroup as RendererBindingGroup, BindingLayout as RendererBindingLayout, BindingLayoutDesc,
    BindingWrite, Buffer as RendererBuffer, BufferDesc, CommandList as RendererCommandList, Config,
    DeviceLimits, Fence as RendererFence, FormatProperties, Framebuffer as RendererFramebuffer,
    FramebufferDesc, Pipeline as RendererPipeline, PipelineCache as RendererPipelineCache, PipelineDesc,
    PipelineLayout as RendererPipelineLayout, PipelineLayoutDesc, RenderPass as RendererRenderPass,
    RenderPassDesc, RendererStats, Semaphore as RendererSemaphore, Shader as RendererShader, ShaderDesc,
    Submission, Texture as RendererTexture, TextureDesc, TextureFormat,
};
use umbra_engine::{engine_bail_warn, engine_debug, engine_err, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_binding_group::{BindingGroup, BindingLayout};
use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    format_features_from_vk, gbuffer_sample_counts, max_sample_count_from_vk, pipeline_stages_to_vk,
    texture_format_to_vk,
};
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_pipeline::{Pipeline, PipelineCache, PipelineLayout};
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_shader::Shader;
use crate::vulkan_sync::{Fence, Semaphore};
use crate::vulkan_texture::Texture;

fn init_err(message: String) -> Error {
    umbra_engine::engine_error!("umbra::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

/// Physical device chosen at creation, with the queue family that both
/// renders and presents to the window
struct DeviceChoice {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    name: String,
}

/// Vulkan device implementation
///
/// Central object for creating resources and submitting work. Presentation
/// stays with the frame driver: the renderer only makes sure its graphics
/// queue can present to the window it was created for.
pub struct VulkanRenderer {
    /// Vulkan entry (keeps the loader alive)
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,

    /// GPU memory allocator reference (also stored in GpuContext)
    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Internal sampler cache (creates VkSampler on first use, behind Mutex for &self access)
    sampler_cache: Mutex<SamplerCache>,

    limits: DeviceLimits,

    /// Shared GPU context for every created object
    gpu_context: Arc<GpuContext>,
}

impl VulkanRenderer {
    /// Create a new Vulkan renderer
    ///
    /// # Arguments
    ///
    /// * `window` - Window the graphics queue must be able to present to
    /// * `config` - Renderer configuration
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_err(format!("Failed to load Vulkan library: {:?}", e)))?;

            let instance_version = entry.try_enumerate_instance_version()
                .ok()
                .flatten()
                .unwrap_or(vk::API_VERSION_1_0);
            if instance_version < vk::API_VERSION_1_2 {
                return Err(init_err(format!(
                    "Vulkan 1.2 required, instance supports {}.{}",
                    vk::api_version_major(instance_version), vk::api_version_minor(instance_version))));
            }

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| init_err("Application name contains a NUL byte".to_string()))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Umbra")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle()
                .map_err(|e| init_err(format!("Failed to get display handle: {}", e)))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_err(format!("Failed to get required extensions: {}", e)))?
                .to_vec();

            let enable_validation = Self::validation_available(&entry, &config);
            let mut layer_names = Vec::new();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None)
                .map_err(|e| init_err(format!("Failed to create Vulkan instance: {:?}", e)))?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                Self::create_debug_messenger(&entry, &instance, &config)?
            } else {
                (None, None)
            };

            // Temporary surface, only for queue family selection
            let window_handle = window.window_handle()
                .map_err(|e| init_err(format!("Failed to get window handle: {}", e)))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_err(format!("Failed to create surface: {:?}", e)))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let choice = Self::pick_physical_device(&instance, &surface_loader, surface);
            surface_loader.destroy_surface(surface, None);
            let choice = choice?;
            let physical_device = choice.physical_device;

            // Required Vulkan 1.2 features
            let mut supported12 = vk::PhysicalDeviceVulkan12Features::default();
            let mut supported = vk::PhysicalDeviceFeatures2::default().push_next(&mut supported12);
            instance.get_physical_device_features2(physical_device, &mut supported);
            let supports_anisotropy = supported.features.sampler_anisotropy == vk::TRUE;
            if supported12.draw_indirect_count != vk::TRUE
                || supported12.descriptor_binding_partially_bound != vk::TRUE
            {
                return Err(init_err(format!(
                    "GPU '{}' lacks drawIndirectCount or descriptorBindingPartiallyBound", choice.name)));
            }

            let mut enabled12 = vk::PhysicalDeviceVulkan12Features::default()
                .draw_indirect_count(true)
                .descriptor_binding_partially_bound(true)
                .runtime_descriptor_array(supported12.runtime_descriptor_array == vk::TRUE)
                .shader_sampled_image_array_non_uniform_indexing(
                    supported12.shader_sampled_image_array_non_uniform_indexing == vk::TRUE);
            let enabled_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(supports_anisotropy);

            let available_extensions = instance.enumerate_device_extension_properties(physical_device)
                .unwrap_or_default();
            let has_swapchain = available_extensions.iter().any(|ext| {
                ext.extension_name_as_c_str().is_ok_and(|name| name == ash::khr::swapchain::NAME)
            });
            let mut device_extension_names = Vec::new();
            if has_swapchain {
                device_extension_names.push(ash::khr::swapchain::NAME.as_ptr());
            }

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(choice.queue_family)
                .queue_priorities(&queue_priorities)];

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&enabled_features)
                .push_next(&mut enabled12);

            let device = instance.create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_err(format!("Failed to create logical device: {:?}", e)))?;
            let graphics_queue = device.get_device_queue(choice.queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_err(format!("Failed to create GPU allocator: {:?}", e)))?;

            // Upload command pool (TRANSIENT + RESET for reusable one-shot uploads)
            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(choice.queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device.create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| init_err(format!("Failed to create upload command pool: {:?}", e)))?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_limits = properties.limits;
            let limits = DeviceLimits {
                max_sample_count: max_sample_count_from_vk(gbuffer_sample_counts(&device_limits)),
                min_storage_buffer_offset_alignment: device_limits.min_storage_buffer_offset_alignment,
                min_uniform_buffer_offset_alignment: device_limits.min_uniform_buffer_offset_alignment,
                max_image_dimension_2d: device_limits.max_image_dimension2_d,
            };
            let max_anisotropy = if supports_anisotropy {
                device_limits.max_sampler_anisotropy.min(16.0)
            } else {
                1.0
            };

            let allocator_arc = Arc::new(Mutex::new(allocator));
            let gpu_context = Arc::new(GpuContext::new(
                device,
                Arc::clone(&allocator_arc),
                graphics_queue,
                choice.queue_family,
                upload_command_pool,
                debug_utils_loader,
                debug_messenger,
            ));

            engine_info!("umbra::vulkan", "Vulkan renderer on '{}' (queue family {}, max {}x MSAA, validation: {})",
                choice.name, choice.queue_family, limits.max_sample_count, enable_validation);

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                allocator: ManuallyDrop::new(allocator_arc),
                sampler_cache: Mutex::new(SamplerCache::new(Arc::clone(&gpu_context), max_anisotropy)),
                limits,
                gpu_context,
            })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    fn validation_available(entry: &ash::Entry, config: &Config) -> bool {
        if !config.enable_validation {
            return false;
        }
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let found = layers.iter().any(|layer| {
            layer.layer_name_as_c_str().is_ok_and(|name| name == c"VK_LAYER_KHRONOS_validation")
        });
        if !found {
            engine_warn!("umbra::vulkan", "VK_LAYER_KHRONOS_validation not installed, validation disabled");
        }
        found
    }

    #[cfg(not(feature = "vulkan-validation"))]
    fn validation_available(_entry: &ash::Entry, config: &Config) -> bool {
        if config.enable_validation {
            engine_warn!("umbra::vulkan",
                "Validation requested but umbra_renderer_vulkan was built without the vulkan-validation feature");
        }
        false
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(crate::debug::DebugConfig {
            severity: config.debug_severity,
            enable_stats: config.enable_validation_stats,
        });

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_mask(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils.create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_err(format!("Failed to create debug messenger: {:?}", e)))?;

        Ok((Some(debug_utils), Some(messenger)))
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
        _config: &Config,
    ) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
        Ok((None, None))
    }

    /// First Vulkan 1.2 device with a queue family that does graphics and
    /// presents to `surface`, preferring discrete GPUs
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<DeviceChoice> {
        let physical_devices = instance.enumerate_physical_devices()
            .map_err(|e| init_err(format!("Failed to enumerate physical devices: {:?}", e)))?;

        let mut best: Option<(bool, DeviceChoice)> = None;
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = properties.device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if properties.api_version < vk::API_VERSION_1_2 {
                engine_debug!("umbra::vulkan", "Skipping '{}': Vulkan 1.2 not supported", name);
                continue;
            }

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
            let queue_family = (0..queue_families.len() as u32).find(|&i| {
                queue_families[i as usize].queue_flags.contains(vk::QueueFlags::GRAPHICS)
                    && surface_loader
                        .get_physical_device_surface_support(physical_device, i, surface)
                        .unwrap_or(false)
            });
            let Some(queue_family) = queue_family else {
                engine_debug!("umbra::vulkan", "Skipping '{}': no graphics queue that can present", name);
                continue;
            };

            let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
            if best.as_ref().map_or(true, |(best_discrete, _)| discrete && !best_discrete) {
                best = Some((discrete, DeviceChoice { physical_device, queue_family, name }));
            }
        }

        best.map(|(_, choice)| choice)
            .ok_or_else(|| init_err("No Vulkan 1.2 GPU with a presenting graphics queue found".to_string()))
    }

    fn ctx(&self) -> Arc<GpuContext> {
        Arc::clone(&self.gpu_context)
    }
}

impl Renderer for VulkanRenderer {
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn RendererTexture>> {
        Ok(Arc::new(Texture::new(self.ctx(), desc)?))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn RendererBuffer>> {
        Ok(Arc::new(Buffer::new(self.ctx(), &desc)?))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn RendererShader>> {
        Ok(Arc::new(Shader::new(self.ctx(), &desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RendererRenderPass>> {
        Ok(Arc::new(RenderPass::new(self.ctx(), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn RendererFramebuffer>> {
        Ok(Arc::new(Framebuffer::new(self.ctx(), desc)?))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn RendererBindingLayout>> {
        Ok(Arc::new(BindingLayout::new(self.ctx(), desc)?))
    }

    fn create_binding_group(
        &self,
        layout: &Arc<dyn RendererBindingLayout>,
        set_index: u32,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn RendererBindingGroup>> {
        let mut samplers = self.sampler_cache.lock()
            .map_err(|_| engine_err!("umbra::vulkan", "Sampler cache mutex poisoned"))?;
        Ok(Arc::new(BindingGroup::new(layout, set_index, writes, &mut samplers)?))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn RendererPipelineLayout>> {
        Ok(Arc::new(PipelineLayout::new(self.ctx(), desc)?))
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<Arc<dyn RendererPipelineCache>> {
        Ok(Arc::new(PipelineCache::new(self.ctx(), initial_data)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn RendererPipeline>> {
        Ok(Arc::new(Pipeline::new(self.ctx(), desc)?))
    }

    fn create_command_list(&self, label: &str) -> Result<Box<dyn RendererCommandList>> {
        Ok(Box::new(CommandList::new(self.ctx(), label)?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn RendererSemaphore>> {
        Ok(Arc::new(Semaphore::new(self.ctx())?))
    }

    fn create_fence(&self) -> Result<Arc<dyn RendererFence>> {
        Ok(Arc::new(Fence::new(self.ctx())?))
    }

    fn insert_fence(&self) -> Result<Arc<dyn RendererFence>> {
        let fence = Fence::new(self.ctx())?;
        // An empty batch signals once everything submitted before it is done
        self.gpu_context.queue_submit(&[], fence.fence)?;
        Ok(Arc::new(fence))
    }

    fn submit(&self, submission: &Submission) -> Result<()> {
        unsafe {
            // Downcast command lists, semaphores and fence to Vulkan types
            let mut command_buffers = Vec::with_capacity(submission.command_lists.len());
            for list in submission.command_lists {
                let vk_list = &*(*list as *const dyn RendererCommandList as *const CommandList);
                if vk_list.is_recording() {
                    engine_bail_warn!("umbra::vulkan", "Submitting a command list that is still recording");
                }
                command_buffers.push(vk_list.command_buffer);
            }

            let (wait_semaphores, wait_stages): (Vec<vk::Semaphore>, Vec<vk::PipelineStageFlags>) = submission
                .wait_semaphores
                .iter()
                .map(|(semaphore, stages)| {
                    let vk_semaphore = &*(*semaphore as *const dyn RendererSemaphore as *const Semaphore);
                    (vk_semaphore.semaphore, pipeline_stages_to_vk(*stages))
                })
                .unzip();

            let signal_semaphores: Vec<vk::Semaphore> = submission
                .signal_semaphores
                .iter()
                .map(|semaphore| (*(*semaphore as *const dyn RendererSemaphore as *const Semaphore)).semaphore)
                .collect();

            let fence = match submission.fence {
                Some(fence) => {
                    let vk_fence = (*(fence as *const dyn RendererFence as *const Fence)).fence;
                    self.gpu_context.device.reset_fences(&[vk_fence])
                        .map_err(|e| engine_err!("umbra::vulkan", "Failed to reset submit fence: {:?}", e))?;
                    vk_fence
                }
                None => vk::Fence::null(),
            };

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            self.gpu_context.queue_submit(&[submit_info], fence)
        }
    }

    fn format_properties(&self, format: TextureFormat) -> FormatProperties {
        let properties = unsafe {
            self.instance.get_physical_device_format_properties(self.physical_device, texture_format_to_vk(format))
        };
        FormatProperties {
            linear: format_features_from_vk(properties.linear_tiling_features),
            optimal: format_features_from_vk(properties.optimal_tiling_features),
        }
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn wait_idle(&self) -> Result<()> {
        // Queue access must be synchronized with submissions
        let _queue = self.gpu_context.graphics_queue.lock()
            .map_err(|_| engine_err!("umbra::vulkan", "Graphics queue mutex poisoned"))?;
        unsafe {
            self.gpu_context.device.device_wait_idle().map_err(|e| match e {
                vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost("wait idle".to_string()),
                e => engine_err!("umbra::vulkan", "Failed to wait idle: {:?}", e),
            })
        }
    }

    fn stats(&self) -> RendererStats {
        RendererStats {
            submissions: self.gpu_context.submissions(),
            buffers: self.gpu_context.live_buffers(),
            textures: self.gpu_context.live_textures(),
            gpu_memory_used: self.gpu_context.memory_used(),
        }
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        unsafe {
            self.gpu_context.device.device_wait_idle().ok();

            // 1. Destroy VkSamplers and release the cache's Arc<GpuContext>
            if let Ok(cache) = self.sampler_cache.get_mut() {
                cache.shutdown();
            }

            // 2. Destroy the upload command pool
            if let Ok(mut pool) = self.gpu_context.upload_command_pool.lock() {
                if *pool != vk::CommandPool::null() {
                    self.gpu_context.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // 3. Drop the allocator (frees VkDeviceMemory) BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);
            let exclusive = match Arc::get_mut(&mut self.gpu_context) {
                Some(ctx) => {
                    ManuallyDrop::drop(&mut ctx.allocator);
                    true
                }
                None => {
                    engine_warn!("umbra::vulkan",
                        "GPU objects outlive the renderer ({} references), device leaked",
                        Arc::strong_count(&self.gpu_context) - 1);
                    false
                }
            };

            // 4. Stop forwarding validation messages, then destroy the messenger
            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();

            if let (Some(debug_utils), Some(messenger)) = (
                &self.gpu_context.debug_utils_loader,
                &self.gpu_context.debug_messenger,
            ) {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            // 5. Destroy device and instance, unless surviving objects still use them
            if exclusive {
                self.gpu_context.device.destroy_device(None);
                self.instance.destroy_instance(None);
            }
        }
    }
}
