//! GPU tests for VulkanRenderer
//!
//! These tests verify that VulkanRenderer correctly implements the Renderer trait
//! and that the deferred attachment manager runs on it. They require a GPU and
//! are marked with #[ignore].
//!
//! winit allows one event loop per process, so a single test owns the hidden
//! window and runs every check against the same renderer.
//!
//! Run with: cargo test --test vulkan_renderer_tests -- --ignored

use std::sync::Arc;
use std::time::Duration;

use umbra_engine::umbra::{Error, Renderer};
use umbra_engine::umbra::deferred::OffscreenFramebuffer;
use umbra_engine::umbra::render::{
    BindingLayoutDesc, BindingResource, BindingSlotDesc, BindingType, BindingWrite, Buffer, BufferDesc,
    BufferUsage, Config, FenceStatus, FormatFeatures, ImageLayout, MemoryLocation, PipelineStages, Rect2D,
    SamplerType, ShaderStageFlags, Submission, TextureData, TextureDesc, TextureFormat, TextureUsage,
    Viewport,
};
use umbra_renderer_vulkan::umbra::VulkanRenderer;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window for Vulkan
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let mut builder = EventLoop::builder();
    #[cfg(target_os = "linux")]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_any_thread(true);
    }
    let event_loop = builder.build().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Umbra Vulkan Test")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// TEXTURES
// ============================================================================

fn check_simple_texture(renderer: &Arc<dyn Renderer>) {
    let desc = TextureDesc::attachment("simple", 256, 256, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED);
    let texture = renderer.create_texture(desc).unwrap();
    let info = texture.info();

    assert_eq!(info.width, 256);
    assert_eq!(info.height, 256);
    assert_eq!(info.format, TextureFormat::R8G8B8A8_UNORM);
    assert_eq!(info.array_layers, 1);
}

fn check_texture_with_data(renderer: &Arc<dyn Renderer>) {
    let mut desc = TextureDesc::attachment("with_data", 4, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED);
    desc.data = vec![TextureData { layer: 0, bytes: (0..64).collect() }];

    let texture = renderer.create_texture(desc).unwrap();
    assert_eq!(texture.info().width, 4);
}

fn check_texture_array(renderer: &Arc<dyn Renderer>) {
    let mut desc = TextureDesc::attachment("array", 8, 8, TextureFormat::R8G8B8A8_SRGB, TextureUsage::SAMPLED);
    desc.array_layers = 3;
    desc.data = vec![
        TextureData { layer: 0, bytes: vec![255; 256] },
        TextureData { layer: 2, bytes: vec![128; 256] },
    ];

    let texture = renderer.create_texture(desc).unwrap();
    assert!(texture.info().is_array());
    assert_eq!(texture.info().array_layers, 3);
}

fn check_texture_rejects_bad_data(renderer: &Arc<dyn Renderer>) {
    let mut desc = TextureDesc::attachment("bad", 4, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED);
    desc.data = vec![TextureData { layer: 0, bytes: vec![0; 10] }];
    assert!(matches!(renderer.create_texture(desc), Err(Error::InvalidState(_))));

    let desc = TextureDesc::attachment("empty", 0, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED);
    assert!(matches!(renderer.create_texture(desc), Err(Error::InvalidState(_))));
}

fn check_sampled_depth_texture(renderer: &Arc<dyn Renderer>) {
    let desc = TextureDesc::attachment(
        "depth",
        512,
        512,
        TextureFormat::D32_SFLOAT,
        TextureUsage::DEPTH_STENCIL_ATTACHMENT | TextureUsage::SAMPLED,
    );
    let texture = renderer.create_texture(desc).unwrap();
    assert!(texture.info().format.is_depth());
}

// ============================================================================
// BUFFERS
// ============================================================================

fn check_mapped_buffer(renderer: &Arc<dyn Renderer>) {
    let buffer = renderer
        .create_buffer(BufferDesc::mapped("uniform", 256, BufferUsage::UNIFORM))
        .unwrap();
    assert_eq!(buffer.size(), 256);

    buffer.update(0, &[1u8; 64]).unwrap();
    buffer.update(192, &[2u8; 64]).unwrap();
    assert!(matches!(buffer.update(200, &[0u8; 64]), Err(Error::InvalidState(_))));
}

fn check_gpu_only_buffer(renderer: &Arc<dyn Renderer>) {
    let buffer = renderer
        .create_buffer(BufferDesc {
            label: "vertices".to_string(),
            size: 1024,
            usage: BufferUsage::VERTEX,
            location: MemoryLocation::GpuOnly,
        })
        .unwrap();
    buffer.update(512, &[7u8; 512]).unwrap();
}

fn check_zero_size_buffer(renderer: &Arc<dyn Renderer>) {
    let result = renderer.create_buffer(BufferDesc::mapped("empty", 0, BufferUsage::STORAGE));
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

fn check_stats_track_live_objects(renderer: &Arc<dyn Renderer>) {
    let before = renderer.stats();
    let buffer = renderer.create_buffer(BufferDesc::mapped("counted", 64, BufferUsage::STORAGE)).unwrap();
    let texture = renderer
        .create_texture(TextureDesc::attachment("counted", 16, 16, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED))
        .unwrap();

    let during = renderer.stats();
    assert_eq!(during.buffers, before.buffers + 1);
    assert_eq!(during.textures, before.textures + 1);
    assert!(during.gpu_memory_used > before.gpu_memory_used);

    drop(buffer);
    drop(texture);
    let after = renderer.stats();
    assert_eq!(after.buffers, before.buffers);
    assert_eq!(after.textures, before.textures);
}

// ============================================================================
// DEVICE QUERIES
// ============================================================================

fn check_limits(renderer: &Arc<dyn Renderer>) {
    let limits = renderer.limits();
    assert!(limits.max_sample_count >= 1);
    assert!(limits.max_sample_count.is_power_of_two());
    assert!(limits.min_storage_buffer_offset_alignment.is_power_of_two());
    assert!(limits.max_image_dimension_2d >= 4096);
}

fn check_format_properties(renderer: &Arc<dyn Renderer>) {
    let rgba = renderer.format_properties(TextureFormat::R8G8B8A8_UNORM);
    assert!(rgba.optimal.contains(FormatFeatures::SAMPLED_IMAGE | FormatFeatures::COLOR_ATTACHMENT));

    let depth = renderer.format_properties(TextureFormat::D16_UNORM);
    assert!(depth.optimal.contains(FormatFeatures::DEPTH_STENCIL_ATTACHMENT));
}

// ============================================================================
// DEFERRED TARGETS
// ============================================================================

fn check_gbuffer(renderer: &Arc<dyn Renderer>) {
    let mut gbuffer = OffscreenFramebuffer::create_gbuffer(Arc::clone(renderer), 640, 480, 1).unwrap();
    assert_eq!(gbuffer.color_attachment_count(), 3);
    assert_eq!(gbuffer.framebuffer().width(), 640);
    assert_eq!(gbuffer.clear_values().len(), 4);

    gbuffer.resize(800, 600).unwrap();
    assert_eq!(gbuffer.framebuffer().width(), 800);
    assert_eq!(gbuffer.framebuffer().height(), 600);
}

fn check_shadow_map(renderer: &Arc<dyn Renderer>) {
    let shadow = OffscreenFramebuffer::create_shadow_map(Arc::clone(renderer), 1024, 1, 1.0).unwrap();
    assert_eq!(shadow.color_attachment_count(), 0);
    assert!(shadow.depth_attachment().is_sampled());
    assert_eq!(shadow.framebuffer().width(), 1024);
}

// ============================================================================
// BINDING GROUPS
// ============================================================================

fn check_binding_group(renderer: &Arc<dyn Renderer>) {
    let layout = renderer
        .create_binding_layout(&BindingLayoutDesc {
            entries: vec![
                BindingSlotDesc {
                    binding: 0,
                    binding_type: BindingType::UniformBuffer,
                    count: 1,
                    stage_flags: ShaderStageFlags::VERTEX,
                    partially_bound: false,
                },
                BindingSlotDesc {
                    binding: 1,
                    binding_type: BindingType::Sampler,
                    count: 1,
                    stage_flags: ShaderStageFlags::FRAGMENT,
                    partially_bound: false,
                },
                BindingSlotDesc {
                    binding: 2,
                    binding_type: BindingType::SampledImage,
                    count: 8,
                    stage_flags: ShaderStageFlags::FRAGMENT,
                    partially_bound: true,
                },
                BindingSlotDesc {
                    binding: 3,
                    binding_type: BindingType::CombinedImageSampler,
                    count: 1,
                    stage_flags: ShaderStageFlags::FRAGMENT,
                    partially_bound: false,
                },
            ],
        })
        .unwrap();

    let uniform = renderer.create_buffer(BufferDesc::mapped("ubo", 128, BufferUsage::UNIFORM)).unwrap();
    let texture = renderer
        .create_texture(TextureDesc::attachment("tex", 4, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED))
        .unwrap();

    // Rebuilding groups returns their sets to the pool
    for _ in 0..64 {
        let group = renderer
            .create_binding_group(&layout, 0, &[
                BindingWrite {
                    binding: 0,
                    resource: BindingResource::UniformBuffer { buffer: uniform.as_ref(), offset: 0, range: 128 },
                },
                BindingWrite { binding: 1, resource: BindingResource::Sampler(SamplerType::LinearRepeat) },
                BindingWrite {
                    binding: 2,
                    resource: BindingResource::SampledImageArray(vec![texture.as_ref(), texture.as_ref()]),
                },
                BindingWrite {
                    binding: 3,
                    resource: BindingResource::SampledTexture {
                        texture: texture.as_ref(),
                        sampler: SamplerType::LinearClamp,
                        layout: ImageLayout::ShaderReadOnly,
                    },
                },
            ])
            .unwrap();
        assert_eq!(group.set_index(), 0);
        assert_eq!(group.layout().desc().entries.len(), 4);
    }

    let undeclared = renderer.create_binding_group(&layout, 0, &[BindingWrite {
        binding: 9,
        resource: BindingResource::Sampler(SamplerType::NearestClamp),
    }]);
    assert!(matches!(undeclared, Err(Error::InvalidState(_))));

    let wrong_type = renderer.create_binding_group(&layout, 0, &[BindingWrite {
        binding: 1,
        resource: BindingResource::UniformBuffer { buffer: uniform.as_ref(), offset: 0, range: 128 },
    }]);
    assert!(matches!(wrong_type, Err(Error::InvalidState(_))));

    let too_many: Vec<_> = (0..9).map(|_| texture.as_ref()).collect();
    let overflow = renderer.create_binding_group(&layout, 0, &[BindingWrite {
        binding: 2,
        resource: BindingResource::SampledImageArray(too_many),
    }]);
    assert!(matches!(overflow, Err(Error::CapacityExceeded { requested: 9, capacity: 8 })));
}

// ============================================================================
// COMMAND LISTS AND SYNCHRONIZATION
// ============================================================================

fn check_command_list_state(renderer: &Arc<dyn Renderer>) {
    let mut list = renderer.create_command_list("state").unwrap();
    assert!(matches!(list.end(), Err(Error::InvalidState(_))));

    list.begin().unwrap();
    assert!(matches!(list.begin(), Err(Error::InvalidState(_))));
    assert!(matches!(list.draw(3, 0), Err(Error::InvalidState(_))));

    // Abandoning a recording frees the list for the next one
    list.reset().unwrap();
    assert!(matches!(list.end(), Err(Error::InvalidState(_))));
    list.begin().unwrap();
    list.end().unwrap();
}

fn check_submit_with_fence(renderer: &Arc<dyn Renderer>) {
    let mut list = renderer.create_command_list("empty").unwrap();
    let fence = renderer.create_fence().unwrap();
    assert!(!fence.is_signaled().unwrap());

    // The same list and fence are reused across frames
    for _ in 0..3 {
        list.begin().unwrap();
        list.end().unwrap();
        renderer
            .submit(&Submission {
                command_lists: &[list.as_ref()],
                wait_semaphores: &[],
                signal_semaphores: &[],
                fence: Some(fence.as_ref()),
            })
            .unwrap();
        assert_eq!(fence.wait(WAIT).unwrap(), FenceStatus::Signaled);
    }
}

fn check_submit_rejects_recording_list(renderer: &Arc<dyn Renderer>) {
    let mut list = renderer.create_command_list("open").unwrap();
    list.begin().unwrap();
    let result = renderer.submit(&Submission {
        command_lists: &[list.as_ref()],
        wait_semaphores: &[],
        signal_semaphores: &[],
        fence: None,
    });
    assert!(matches!(result, Err(Error::InvalidState(_))));
    list.end().unwrap();
}

fn check_semaphore_chain(renderer: &Arc<dyn Renderer>) {
    let mut first = renderer.create_command_list("first").unwrap();
    let mut second = renderer.create_command_list("second").unwrap();
    let semaphore = renderer.create_semaphore().unwrap();
    let fence = renderer.create_fence().unwrap();

    first.begin().unwrap();
    first.end().unwrap();
    second.begin().unwrap();
    second.end().unwrap();

    renderer
        .submit(&Submission {
            command_lists: &[first.as_ref()],
            wait_semaphores: &[],
            signal_semaphores: &[semaphore.as_ref()],
            fence: None,
        })
        .unwrap();
    renderer
        .submit(&Submission {
            command_lists: &[second.as_ref()],
            wait_semaphores: &[(semaphore.as_ref(), PipelineStages::TOP_OF_PIPE)],
            signal_semaphores: &[],
            fence: Some(fence.as_ref()),
        })
        .unwrap();
    assert_eq!(fence.wait(WAIT).unwrap(), FenceStatus::Signaled);
}

fn check_insert_fence(renderer: &Arc<dyn Renderer>) {
    let before = renderer.stats().submissions;
    let fence = renderer.insert_fence().unwrap();
    assert_eq!(fence.wait(WAIT).unwrap(), FenceStatus::Signaled);
    assert!(fence.is_signaled().unwrap());
    assert_eq!(renderer.stats().submissions, before + 1);
}

fn check_record_gbuffer_pass(renderer: &Arc<dyn Renderer>) {
    let gbuffer = OffscreenFramebuffer::create_gbuffer(Arc::clone(renderer), 320, 240, 1).unwrap();
    let mut list = renderer.create_command_list("gbuffer_clear").unwrap();
    let fence = renderer.create_fence().unwrap();

    list.begin().unwrap();
    list.begin_render_pass(gbuffer.render_pass(), gbuffer.framebuffer(), gbuffer.clear_values()).unwrap();
    list.set_viewport(Viewport::full(320, 240)).unwrap();
    list.set_scissor(Rect2D::full(320, 240)).unwrap();
    assert!(matches!(list.end(), Err(Error::InvalidState(_))));
    list.end_render_pass().unwrap();
    list.end().unwrap();

    renderer
        .submit(&Submission {
            command_lists: &[list.as_ref()],
            wait_semaphores: &[],
            signal_semaphores: &[],
            fence: Some(fence.as_ref()),
        })
        .unwrap();
    assert_eq!(fence.wait(WAIT).unwrap(), FenceStatus::Signaled);
}

fn check_pipeline_cache(renderer: &Arc<dyn Renderer>) {
    let cache = renderer.create_pipeline_cache(&[]).unwrap();
    let data = cache.data().unwrap();

    // Seeding from our own output, or from garbage, both succeed
    renderer.create_pipeline_cache(&data).unwrap();
    renderer.create_pipeline_cache(&[1, 2, 3, 4]).unwrap();
}

// ============================================================================
// ENTRY POINT
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_renderer() {
    let (window, _event_loop) = create_test_window();
    let renderer: Arc<dyn Renderer> = Arc::new(VulkanRenderer::new(&window, Config::default()).unwrap());

    check_simple_texture(&renderer);
    check_texture_with_data(&renderer);
    check_texture_array(&renderer);
    check_texture_rejects_bad_data(&renderer);
    check_sampled_depth_texture(&renderer);

    check_mapped_buffer(&renderer);
    check_gpu_only_buffer(&renderer);
    check_zero_size_buffer(&renderer);
    check_stats_track_live_objects(&renderer);

    check_limits(&renderer);
    check_format_properties(&renderer);

    check_gbuffer(&renderer);
    check_shadow_map(&renderer);
    check_binding_group(&renderer);

    check_command_list_state(&renderer);
    check_submit_with_fence(&renderer);
    check_submit_rejects_recording_list(&renderer);
    check_semaphore_chain(&renderer);
    check_insert_fence(&renderer);
    check_record_gbuffer_pass(&renderer);
    check_pipeline_cache(&renderer);

    renderer.wait_idle().unwrap();
}
