//! Unit tests for DeferredRenderer frame flow

use crate::deferred::{
    BindingSlot, CompositionUniforms, DebugDisplay, DeferredConfig, DeferredRenderer, MemoryShaderLoader,
    PassState, PresentationDesc, ShaderPass,
};
use crate::error::Error;
use crate::renderer::mock_renderer::{MockBindingGroup, MockBuffer, MockCommand, MockRenderer};
use crate::renderer::{
    AttachmentDesc, BindingGroup, Buffer, CommandList, Framebuffer, FramebufferDesc, ImageLayout, LoadOp,
    Pipeline, RenderPass, RenderPassDesc, Renderer, ShaderStage, StoreOp, Texture, TextureDesc, TextureFormat,
    TextureUsage,
};
use crate::scene::{
    DirectionalLight, DrawList, MeshRange, MeshVertex, PerInstanceRecord, SceneBuffers, StaticCamera,
};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// TEST HELPERS
// ============================================================================

struct Presentation {
    render_pass: Arc<dyn RenderPass>,
    framebuffer: Arc<dyn Framebuffer>,
}

fn presentation(renderer: &dyn Renderer, width: u32, height: u32) -> Presentation {
    let render_pass = renderer
        .create_render_pass(&RenderPassDesc {
            label: "presentation".to_string(),
            color_attachments: vec![AttachmentDesc {
                format: TextureFormat::B8G8R8A8_SRGB,
                samples: 1,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::PresentSrc,
            }],
            depth_attachment: None,
            dependencies: Vec::new(),
        })
        .unwrap();
    let image = renderer
        .create_texture(TextureDesc::attachment(
            "swapchain",
            width,
            height,
            TextureFormat::B8G8R8A8_SRGB,
            TextureUsage::COLOR_ATTACHMENT,
        ))
        .unwrap();
    let framebuffer = renderer
        .create_framebuffer(&FramebufferDesc {
            render_pass: &render_pass,
            color_attachments: vec![image],
            depth_attachment: None,
            width,
            height,
            layers: 1,
        })
        .unwrap();
    Presentation { render_pass, framebuffer }
}

fn shader_loader() -> MemoryShaderLoader {
    MemoryShaderLoader::new()
        .with(ShaderPass::Shadow, ShaderStage::Vertex, vec![0; 4])
        .with(ShaderPass::Geometry, ShaderStage::Vertex, vec![0; 4])
        .with(ShaderPass::Geometry, ShaderStage::Fragment, vec![0; 4])
        .with(ShaderPass::Composition, ShaderStage::Vertex, vec![0; 4])
        .with(ShaderPass::Composition, ShaderStage::Fragment, vec![0; 4])
}

fn textures(renderer: &dyn Renderer, count: usize) -> Vec<Arc<dyn Texture>> {
    (0..count)
        .map(|i| {
            renderer
                .create_texture(TextureDesc::attachment(
                    &format!("material{}", i),
                    16,
                    16,
                    TextureFormat::R8G8B8A8_UNORM,
                    TextureUsage::SAMPLED,
                ))
                .unwrap()
        })
        .collect()
}

/// A quad drawn twice and a triangle drawn three times
fn two_meshes_five_instances() -> (Vec<MeshVertex>, Vec<u32>, DrawList) {
    let vertex = |x: f32, y: f32| MeshVertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::new(x, y));
    let vertices = vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(1.0, 1.0), vertex(0.0, 1.0)];
    let indices = vec![0, 1, 2, 2, 3, 0, 0, 1, 2];

    let record = |x: f32, texture: u32| PerInstanceRecord::with_texture(Mat4::from_translation(Vec3::X * x), texture);
    let mut draws = DrawList::new();
    draws.push_mesh(
        MeshRange { first_index: 0, index_count: 6, vertex_offset: 0 },
        &[record(0.0, 0), record(2.0, 1)],
    );
    draws.push_mesh(
        MeshRange { first_index: 6, index_count: 3, vertex_offset: 0 },
        &[record(4.0, 0), record(6.0, 1), record(8.0, 0)],
    );
    (vertices, indices, draws)
}

struct Harness {
    mock: MockRenderer,
    deferred: DeferredRenderer,
    presentation: Presentation,
    draws: DrawList,
}

fn config() -> DeferredConfig {
    DeferredConfig {
        shadow_map_size: 2048,
        max_instances_per_frame: 16,
        max_textures: 8,
        ..DeferredConfig::default()
    }
}

fn harness_with(mock: MockRenderer, config: DeferredConfig) -> Harness {
    let renderer: Arc<dyn Renderer> = Arc::new(mock.clone());
    let presentation = presentation(renderer.as_ref(), 800, 600);
    let (vertices, indices, draws) = two_meshes_five_instances();
    let scene = SceneBuffers::upload(renderer.as_ref(), "scene", &vertices, &indices, &draws, 8).unwrap();

    let deferred = DeferredRenderer::initialize(
        Arc::clone(&renderer),
        PresentationDesc {
            render_pass: Arc::clone(&presentation.render_pass),
            width: 800,
            height: 600,
            pipeline_cache: None,
        },
        config,
        &shader_loader(),
        textures(renderer.as_ref(), 2),
        scene,
    )
    .unwrap();
    Harness { mock, deferred, presentation, draws }
}

fn harness() -> Harness {
    harness_with(MockRenderer::auto_signaling(), config())
}

fn camera() -> StaticCamera {
    StaticCamera {
        projection: Mat4::perspective_rh(1.0, 800.0 / 600.0, 0.1, 100.0),
        view: Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y),
        position: Vec3::new(0.0, 2.0, 5.0),
    }
}

fn light() -> DirectionalLight {
    DirectionalLight {
        position: Vec3::new(10.0, 10.0, 10.0),
        target: Vec3::ZERO,
        color: Vec4::ONE,
        projection: Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 50.0),
    }
}

impl Harness {
    /// Run one complete frame through a presentation list named `label`
    fn run_frame(&mut self, label: &str) {
        self.deferred.update_deferred(&camera(), &light()).unwrap();
        self.deferred.stream_instances(self.draws.instances()).unwrap();
        self.deferred.record_offscreen().unwrap();
        self.deferred.submit_offscreen().unwrap();

        let mut present = self.begin_presentation(label);
        self.deferred.record_composition(present.as_mut()).unwrap();
        present.end_render_pass().unwrap();
        present.end().unwrap();
        self.deferred.submit_composition(present.as_ref(), &[], &[], None).unwrap();
        self.deferred.finish_frame().unwrap();
    }

    fn begin_presentation(&self, label: &str) -> Box<dyn CommandList> {
        let mut present = self.mock.create_command_list(label).unwrap();
        present.begin().unwrap();
        present
            .begin_render_pass(&self.presentation.render_pass, &self.presentation.framebuffer, &[])
            .unwrap();
        present
    }
}

fn count(commands: &[MockCommand], predicate: impl Fn(&MockCommand) -> bool) -> usize {
    commands.iter().filter(|c| predicate(c)).count()
}

fn as_mock_group(group: &Arc<dyn BindingGroup>) -> &MockBindingGroup {
    unsafe { &*(group.as_ref() as *const dyn BindingGroup as *const MockBindingGroup) }
}

fn as_mock_buffer(buffer: &Arc<dyn Buffer>) -> &MockBuffer {
    unsafe { &*(buffer.as_ref() as *const dyn Buffer as *const MockBuffer) }
}

// ============================================================================
// INITIALIZATION
// ============================================================================

#[test]
fn test_initialize_builds_targets_and_pipelines() {
    let h = harness();

    assert_eq!(h.deferred.samples(), 4);
    assert_eq!(h.deferred.gbuffer().samples(), 4);
    assert_eq!(h.deferred.gbuffer().size().width, 800);
    assert_eq!(h.deferred.shadow_map().size().width, 2048);
    assert_eq!(h.deferred.composition_pipeline().label(), "composition");
    assert!(Arc::ptr_eq(h.deferred.pipelines().geometry.layout(), h.deferred.pipeline_layout()));
    assert_eq!(h.deferred.binder().texture_count(), 2);
    assert!(h.deferred.binding_group().is_ok());
    assert_eq!(h.deferred.pass_state(), PassState::Idle);
}

#[test]
fn test_initialize_without_composition_shader_fails() {
    let mock = MockRenderer::new();
    let renderer: Arc<dyn Renderer> = Arc::new(mock.clone());
    let presentation = presentation(renderer.as_ref(), 800, 600);
    let (vertices, indices, draws) = two_meshes_five_instances();
    let scene = SceneBuffers::upload(renderer.as_ref(), "scene", &vertices, &indices, &draws, 8).unwrap();
    let loader = MemoryShaderLoader::new()
        .with(ShaderPass::Shadow, ShaderStage::Vertex, vec![0; 4])
        .with(ShaderPass::Geometry, ShaderStage::Vertex, vec![0; 4])
        .with(ShaderPass::Geometry, ShaderStage::Fragment, vec![0; 4]);

    let result = DeferredRenderer::initialize(
        renderer,
        PresentationDesc {
            render_pass: presentation.render_pass,
            width: 800,
            height: 600,
            pipeline_cache: None,
        },
        DeferredConfig::default(),
        &loader,
        Vec::new(),
        scene,
    );
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

// ============================================================================
// PASS ORDERING
// ============================================================================

#[test]
fn test_two_meshes_five_instances_frame() {
    let mut h = harness();
    h.run_frame("present");

    let offscreen = h.mock.commands_of("offscreen.0");
    assert_eq!(count(&offscreen, |c| matches!(c, MockCommand::DrawIndexedIndirectCount { .. })), 2);
    for command in &offscreen {
        if let MockCommand::DrawIndexedIndirectCount { max_draw_count, stride, .. } = command {
            assert_eq!(*max_draw_count, 8);
            assert_eq!(*stride, 20);
        }
    }

    let present = h.mock.commands_of("present");
    assert_eq!(count(&present, |c| matches!(c, MockCommand::Draw { .. })), 1);
    assert!(present.contains(&MockCommand::Draw { vertex_count: 3, first_vertex: 0 }));

    // The composition submission waits on what the offscreen one signaled
    let submissions = h.mock.submissions();
    let offscreen_submit = submissions
        .iter()
        .position(|s| s.command_lists == vec!["offscreen.0".to_string()])
        .unwrap();
    let present_submit = submissions
        .iter()
        .position(|s| s.command_lists == vec!["present".to_string()])
        .unwrap();
    assert!(offscreen_submit < present_submit);
    let semaphore = submissions[offscreen_submit].signal_semaphores[0];
    assert_eq!(submissions[present_submit].wait_semaphores, vec![semaphore]);

    assert_eq!(h.deferred.frame_index(), 1);
    assert_eq!(h.deferred.pass_state(), PassState::Idle);
}

#[test]
fn test_draw_count_buffer_holds_two_draws() {
    let h = harness();
    let count = as_mock_buffer(&h.deferred.scene().count_buffer).read(0, 4);
    assert_eq!(count, 2u32.to_ne_bytes().to_vec());
}

#[test]
fn test_composition_submit_requires_offscreen_submit() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    h.deferred.record_offscreen().unwrap();

    let mut present = h.begin_presentation("present");
    h.deferred.record_composition(present.as_mut()).unwrap();
    present.end_render_pass().unwrap();
    present.end().unwrap();

    let result = h.deferred.submit_composition(present.as_ref(), &[], &[], None);
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert!(h.mock.submissions().is_empty());
}

#[test]
fn test_record_offscreen_requires_instances() {
    let mut h = harness();
    assert!(matches!(h.deferred.record_offscreen(), Err(Error::InvalidState(_))));
    assert!(matches!(h.deferred.submit_offscreen(), Err(Error::InvalidState(_))));
}

#[test]
fn test_offscreen_cannot_be_recorded_twice() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    h.deferred.record_offscreen().unwrap();

    assert!(matches!(h.deferred.record_offscreen(), Err(Error::InvalidState(_))));
    assert!(matches!(
        h.deferred.stream_instances(h.draws.instances()),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn test_finish_frame_requires_composition() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    h.deferred.record_offscreen().unwrap();
    h.deferred.submit_offscreen().unwrap();

    assert!(matches!(h.deferred.finish_frame(), Err(Error::InvalidState(_))));
    assert_eq!(h.deferred.frame_index(), 0);
}

#[test]
fn test_abort_frame_replaces_dangling_semaphore() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    h.deferred.record_offscreen().unwrap();
    h.deferred.submit_offscreen().unwrap();
    let before = Arc::clone(h.deferred.offscreen_semaphore());

    h.deferred.abort_frame().unwrap();
    assert!(!Arc::ptr_eq(&before, h.deferred.offscreen_semaphore()));
    assert_eq!(h.deferred.pass_state(), PassState::Idle);

    // The next frame runs normally
    h.run_frame("present");
}

#[test]
fn test_abort_after_failed_offscreen_fence_replaces_semaphore() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    h.deferred.record_offscreen().unwrap();
    h.mock.fail_next_insert_fence();

    // The list reached the queue before the fence failed
    assert!(matches!(h.deferred.submit_offscreen(), Err(Error::BackendError(_))));
    assert_eq!(h.mock.submissions().len(), 1);
    let before = Arc::clone(h.deferred.offscreen_semaphore());

    h.deferred.abort_frame().unwrap();
    assert!(!Arc::ptr_eq(&before, h.deferred.offscreen_semaphore()));
    assert_eq!(h.deferred.frame_index(), 1);

    h.run_frame("present");
}

#[test]
fn test_abort_before_submit_resets_offscreen_list() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    h.deferred.record_offscreen().unwrap();
    let before = Arc::clone(h.deferred.offscreen_semaphore());

    h.deferred.abort_frame().unwrap();
    assert!(Arc::ptr_eq(&before, h.deferred.offscreen_semaphore()));
    assert_eq!(h.mock.commands_of("offscreen.0").last(), Some(&MockCommand::Reset));
    assert_eq!(h.deferred.frame_index(), 0);

    // The same list records again
    h.run_frame("present");
    assert_eq!(h.mock.commands_of("offscreen.0").last(), Some(&MockCommand::End));
}

#[test]
fn test_disabled_shadows_skip_shadow_draws() {
    let mut h = harness_with(
        MockRenderer::auto_signaling(),
        DeferredConfig { enable_shadows: false, ..config() },
    );
    h.run_frame("present");

    let offscreen = h.mock.commands_of("offscreen.0");
    assert_eq!(count(&offscreen, |c| matches!(c, MockCommand::BeginRenderPass { .. })), 2);
    assert_eq!(count(&offscreen, |c| matches!(c, MockCommand::DrawIndexedIndirectCount { .. })), 1);
}

// ============================================================================
// STREAMING
// ============================================================================

#[test]
fn test_instance_offsets_follow_the_ring() {
    let mut h = harness();
    for i in 0..3 {
        h.run_frame(&format!("present{}", i));
    }

    // 5 records are 400 bytes; each frame moves the cursor by 512
    let offsets: Vec<Vec<u32>> = (0..3)
        .map(|i| {
            h.mock
                .commands_of(&format!("present{}", i))
                .into_iter()
                .find_map(|c| match c {
                    MockCommand::BindBindingGroup { dynamic_offsets, .. } => Some(dynamic_offsets),
                    _ => None,
                })
                .unwrap()
        })
        .collect();
    assert_eq!(offsets, vec![vec![0], vec![512], vec![1024]]);
}

#[test]
fn test_offscreen_lists_rotate() {
    let mut h = harness();
    for i in 0..4 {
        h.run_frame(&format!("present{}", i));
    }

    let lists: Vec<String> = h
        .mock
        .submissions()
        .into_iter()
        .filter(|s| s.command_lists.iter().any(|l| l.starts_with("offscreen")))
        .map(|s| s.command_lists[0].clone())
        .collect();
    assert_eq!(lists, vec!["offscreen.0", "offscreen.1", "offscreen.2", "offscreen.0"]);
}

#[test]
fn test_reused_list_waits_for_its_fence() {
    let mock = MockRenderer::new();
    let mut h = harness_with(
        mock.clone(),
        DeferredConfig { fence_timeout: Duration::from_millis(20), ..config() },
    );
    for i in 0..3 {
        h.run_frame(&format!("present{}", i));
    }

    // offscreen.0 is still in flight
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    assert!(matches!(h.deferred.record_offscreen(), Err(Error::DeviceLost(_))));
    assert_eq!(h.deferred.pass_state(), PassState::Idle);

    mock.signal_all_fences();
    h.deferred.record_offscreen().unwrap();
}

#[test]
fn test_too_many_instances() {
    let mut h = harness();
    let records = vec![PerInstanceRecord::default(); 17];

    let result = h.deferred.stream_instances(&records);
    assert_eq!(result, Err(Error::CapacityExceeded { requested: 17 * 80, capacity: 16 * 80 }));
    assert_eq!(h.deferred.instance_ring().cursor(), 0);
}

// ============================================================================
// RECONFIGURATION
// ============================================================================

#[test]
fn test_resize_recreates_gbuffer_only() {
    let mut h = harness();
    let generation = h.deferred.binder().generation();

    h.deferred.resize(1024, 768).unwrap();

    assert_eq!(h.deferred.gbuffer().size().width, 1024);
    assert_eq!(h.deferred.gbuffer().size().height, 768);
    assert_eq!(h.deferred.shadow_map().size().width, 2048);
    assert_eq!(h.deferred.shadow_map().size().height, 2048);
    assert_eq!(h.deferred.binder().generation(), generation + 1);
}

#[test]
fn test_resize_mid_frame_is_rejected() {
    let mut h = harness();
    h.deferred.stream_instances(h.draws.instances()).unwrap();
    assert!(matches!(h.deferred.resize(1024, 768), Err(Error::InvalidState(_))));
    assert_eq!(h.deferred.gbuffer().size().width, 800);
}

#[test]
fn test_set_textures_grows_the_array() {
    let mut h = harness();
    let more = textures(&h.mock, 5);

    h.deferred.set_textures(more).unwrap();

    assert_eq!(h.deferred.binder().texture_count(), 5);
    assert!(h.deferred.binder().is_texture_index_valid(4));
    let group = as_mock_group(h.deferred.binding_group().unwrap());
    assert_eq!(group.binding(BindingSlot::TextureArray.binding()), Some("images:5"));
}

#[test]
fn test_set_textures_beyond_capacity_keeps_old_array() {
    let mut h = harness();
    let too_many = textures(&h.mock, 9);

    let result = h.deferred.set_textures(too_many);
    assert!(matches!(result, Err(Error::CapacityExceeded { requested: 9, capacity: 8 })));
    assert_eq!(h.deferred.binder().texture_count(), 2);
}

#[test]
fn test_debug_display_reaches_composition_uniform() {
    let mut h = harness();
    h.deferred.set_debug_display(DebugDisplay::Normal);
    h.deferred.update_deferred(&camera(), &light()).unwrap();

    let size = std::mem::size_of::<CompositionUniforms>();
    let bytes = as_mock_buffer(h.deferred.composition_uniform_buffer()).read(0, size);
    let uniforms: CompositionUniforms = bytemuck::pod_read_unaligned(&bytes);
    assert_eq!(uniforms.debug.x, DebugDisplay::Normal.as_u32());
    assert_eq!(uniforms.debug.y, 1);
    assert_eq!(uniforms.debug.z, 4);
    assert_eq!(uniforms.camera_position, Vec4::new(0.0, 2.0, 5.0, 1.0));
}
