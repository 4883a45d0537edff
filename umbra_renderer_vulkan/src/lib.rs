/*!
# Umbra - Vulkan Renderer Backend

Vulkan implementation of the Umbra `Renderer` strategy trait.

This crate implements the umbra_engine GPU object traits using the Ash
library for Vulkan bindings and gpu-allocator for memory management. It
needs Vulkan 1.2 with `drawIndirectCount` and partially bound descriptor
arrays, which the deferred pipeline relies on.

Validation layer support (debug messenger, message counting) is compiled in
only with the `vulkan-validation` feature.

```no_run
use umbra_renderer_vulkan::umbra::VulkanRenderer;
use umbra_engine::umbra::render::Config;
# fn demo(window: &winit::window::Window) -> umbra_engine::umbra::Result<()> {
let renderer = VulkanRenderer::new(window, Config::default())?;
# Ok(())
# }
```
*/

// Vulkan implementation modules
mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_texture;
mod vulkan_buffer;
mod vulkan_shader;
mod vulkan_sampler;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_binding_group;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_sync;
#[cfg(feature = "vulkan-validation")]
mod debug;

pub mod umbra {
    pub use crate::vulkan::VulkanRenderer;

    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, log_validation_stats_report, ValidationStats};
}
