/// DeferredRenderer: the deferred pipeline as seen by a frame driver
///
/// Owns the shadow map and G-buffer, the resource binder, the uniform
/// buffers, the instance ring, the three pipelines and the offscreen command
/// lists. A frame goes:
///
/// ```text
/// update_deferred -> stream_instances -> record_offscreen -> submit_offscreen
///                 -> record_composition -> submit_composition -> finish_frame
/// ```
///
/// The driver owns the presentation command list, render pass and
/// swapchain. `record_composition` is called inside its presentation render
/// pass, and `submit_composition` makes the presentation submission wait on
/// the offscreen semaphore.

use std::sync::Arc;
use crate::deferred::{
    BindResources, CompositionBindings, CompositionFrame, CompositionUniforms, DebugDisplay, DeferredConfig,
    DeferredPipelines, DeferredShaders, GeometryBindings, OffscreenFrame, OffscreenFramebuffer, OffscreenUniforms,
    PassSequencer, PassState, PipelineBuilder, PipelineTargets, ResourceBinder, ShaderLoader, UniformBuffer,
    GBUFFER_ALBEDO, GBUFFER_NORMAL, GBUFFER_POSITION,
};
use crate::error::{Error, Result};
use crate::renderer::{
    BindingGroup, Buffer, BufferUsage, CommandList, Fence, Pipeline, PipelineCache, PipelineLayout,
    PipelineStages, RenderPass, Renderer, SamplerType, Semaphore, Submission, Texture,
};
use crate::scene::{instance_bytes, CameraView, LightSource, PerInstanceRecord, SceneBuffers};
use crate::streaming::{wait_for_fence, RingBufferRegion, StreamingRingBuffer, RING_FRAME_COUNT};
use crate::{engine_bail_warn, engine_debug, engine_fail, engine_info, engine_warn, engine_warn_err};

/// The frame driver's presentation target
pub struct PresentationDesc {
    /// Render pass the composition pipeline draws in
    pub render_pass: Arc<dyn RenderPass>,
    pub width: u32,
    pub height: u32,
    /// Optional cache shared by every pipeline
    pub pipeline_cache: Option<Arc<dyn PipelineCache>>,
}

/// Progress of the frame being built
struct FrameInFlight {
    region: RingBufferRegion,
    list: usize,
    recorded: bool,
    offscreen_submitted: bool,
    composition_submitted: bool,
}

pub struct DeferredRenderer {
    renderer: Arc<dyn Renderer>,
    config: DeferredConfig,
    samples: u32,
    presentation_pass: Arc<dyn RenderPass>,
    width: u32,
    height: u32,

    shadow_map: OffscreenFramebuffer,
    gbuffer: OffscreenFramebuffer,
    binder: ResourceBinder,
    offscreen_ubo: UniformBuffer<OffscreenUniforms>,
    composition_ubo: UniformBuffer<CompositionUniforms>,
    instances: StreamingRingBuffer,
    builder: PipelineBuilder,
    pipelines: DeferredPipelines,
    sequencer: PassSequencer,
    scene: SceneBuffers,

    offscreen_lists: Vec<Box<dyn CommandList>>,
    list_fences: Vec<Option<Arc<dyn Fence>>>,
    offscreen_semaphore: Arc<dyn Semaphore>,
    frame: Option<FrameInFlight>,
    frame_index: u64,
}

impl DeferredRenderer {
    /// Create every target, binding, pipeline and command list.
    ///
    /// The G-buffer matches the presentation size and renders at the
    /// device's highest sample count. `textures` fill the bindless array.
    pub fn initialize(
        renderer: Arc<dyn Renderer>,
        presentation: PresentationDesc,
        config: DeferredConfig,
        loader: &dyn ShaderLoader,
        textures: Vec<Arc<dyn Texture>>,
        scene: SceneBuffers,
    ) -> Result<Self> {
        let samples = renderer.limits().max_sample_count.max(1);

        let shadow_map = OffscreenFramebuffer::create_shadow_map(
            Arc::clone(&renderer),
            config.shadow_map_size,
            config.shadow_map_layers,
            config.shadow_clear_depth,
        )?;
        let gbuffer = OffscreenFramebuffer::create_gbuffer(
            Arc::clone(&renderer),
            presentation.width,
            presentation.height,
            samples,
        )?;

        let offscreen_ubo = UniformBuffer::<OffscreenUniforms>::new(renderer.as_ref(), "offscreen_ubo")?;
        let composition_ubo = UniformBuffer::<CompositionUniforms>::new(renderer.as_ref(), "composition_ubo")?;
        let instances = StreamingRingBuffer::new(
            Arc::clone(&renderer),
            "instances",
            config.max_instances_per_frame.max(1) as u64 * PerInstanceRecord::SIZE,
            BufferUsage::STORAGE,
            config.fence_timeout,
        )?;

        let mut binder = ResourceBinder::new(Arc::clone(&renderer), config.max_textures)?;
        binder.bind(BindResources::Geometry(GeometryBindings {
            vertex_uniform: Arc::clone(offscreen_ubo.buffer()),
            vertex_uniform_size: UniformBuffer::<OffscreenUniforms>::size(),
            instances: Arc::clone(instances.buffer()),
            instance_window: instances.frame_size(),
            sampler: SamplerType::LinearRepeat,
            textures,
        }))?;
        binder.bind(BindResources::Composition(Self::composition_bindings(
            &gbuffer,
            &shadow_map,
            &composition_ubo,
        )))?;

        let shaders = DeferredShaders::load(renderer.as_ref(), loader)?;
        let builder = PipelineBuilder::new(
            Arc::clone(&renderer),
            binder.layout(),
            presentation.pipeline_cache,
            config.depth_bias_constant,
            config.depth_bias_slope,
        )?;
        let pipelines = builder.build(
            &shaders,
            &PipelineTargets {
                shadow_pass: shadow_map.render_pass(),
                gbuffer_pass: gbuffer.render_pass(),
                presentation_pass: &presentation.render_pass,
                geometry_samples: samples,
            },
        )?;

        let offscreen_lists = (0..RING_FRAME_COUNT)
            .map(|i| renderer.create_command_list(&format!("offscreen.{}", i)))
            .collect::<Result<Vec<_>>>()?;
        let offscreen_semaphore = renderer.create_semaphore()?;

        engine_info!(
            "umbra::deferred",
            "Deferred renderer ready: {}x{} G-buffer at {} samples, {}x{} shadow map, {} textures, {} instances per frame",
            presentation.width, presentation.height, samples,
            config.shadow_map_size, config.shadow_map_size,
            binder.texture_count(), config.max_instances_per_frame
        );

        Ok(Self {
            renderer,
            samples,
            presentation_pass: presentation.render_pass,
            width: presentation.width,
            height: presentation.height,
            shadow_map,
            gbuffer,
            binder,
            offscreen_ubo,
            composition_ubo,
            instances,
            builder,
            pipelines,
            sequencer: PassSequencer::new(),
            scene,
            list_fences: vec![None; offscreen_lists.len()],
            offscreen_lists,
            offscreen_semaphore,
            frame: None,
            frame_index: 0,
            config,
        })
    }

    fn composition_bindings(
        gbuffer: &OffscreenFramebuffer,
        shadow_map: &OffscreenFramebuffer,
        composition_ubo: &UniformBuffer<CompositionUniforms>,
    ) -> CompositionBindings {
        let attachments = gbuffer.attachments();
        CompositionBindings {
            position: Arc::clone(attachments[GBUFFER_POSITION].texture()),
            normal: Arc::clone(attachments[GBUFFER_NORMAL].texture()),
            albedo: Arc::clone(attachments[GBUFFER_ALBEDO].texture()),
            fragment_uniform: Arc::clone(composition_ubo.buffer()),
            fragment_uniform_size: UniformBuffer::<CompositionUniforms>::size(),
            shadow_map: Arc::clone(shadow_map.depth_attachment().texture()),
        }
    }

    // ===== PER-FRAME =====

    /// Write the camera and light into both uniform blocks
    pub fn update_deferred(&mut self, camera: &dyn CameraView, light: &dyn LightSource) -> Result<()> {
        self.offscreen_ubo.write(&OffscreenUniforms::new(camera, light))?;
        self.composition_ubo.write(&CompositionUniforms::new(
            camera,
            light,
            self.config.debug_display,
            self.config.enable_shadows,
            self.samples,
        ))
    }

    /// Copy this frame's instance records into the ring buffer.
    ///
    /// Blocks while the destination bytes are still read by an earlier
    /// frame. May be called again to replace the records until the
    /// offscreen passes are recorded.
    pub fn stream_instances(&mut self, records: &[PerInstanceRecord]) -> Result<RingBufferRegion> {
        if self.frame.as_ref().is_some_and(|f| f.recorded) {
            engine_bail_warn!("umbra::deferred", "stream_instances after the offscreen passes were recorded");
        }
        let max = self.config.max_instances_per_frame as u64;
        if records.len() as u64 > max {
            return Err(engine_fail!(
                "umbra::deferred",
                Error::CapacityExceeded {
                    requested: records.len() as u64 * PerInstanceRecord::SIZE,
                    capacity: max * PerInstanceRecord::SIZE,
                }
            ));
        }

        let invalid = records
            .iter()
            .filter(|r| !self.binder.is_texture_index_valid(r.max_texture_index()))
            .count();
        if invalid > 0 {
            engine_warn!(
                "umbra::deferred",
                "{} of {} instances reference textures beyond the {} bound",
                invalid, records.len(), self.binder.texture_count()
            );
        }

        let region = self.instances.set_data(instance_bytes(records))?;
        self.frame = Some(FrameInFlight {
            region,
            list: (self.frame_index % self.offscreen_lists.len() as u64) as usize,
            recorded: false,
            offscreen_submitted: false,
            composition_submitted: false,
        });
        Ok(region)
    }

    /// Record the shadow and geometry passes into this frame's offscreen
    /// command list, once the GPU is done with its previous use.
    pub fn record_offscreen(&mut self) -> Result<()> {
        let Some(frame) = self.frame.as_ref() else {
            engine_bail_warn!("umbra::deferred", "record_offscreen before stream_instances");
        };
        if frame.recorded {
            engine_bail_warn!("umbra::deferred", "offscreen passes already recorded this frame");
        }
        let list = frame.list;
        let instance_offset = frame.region.dynamic_offset();

        if let Some(fence) = self.list_fences[list].take() {
            if let Err(e) = wait_for_fence(fence.as_ref(), self.config.fence_timeout) {
                self.list_fences[list] = Some(fence);
                return Err(e);
            }
        }

        let group = self.binder.group()?;
        let offscreen = OffscreenFrame {
            pipelines: &self.pipelines,
            binding_group: group,
            instance_offset,
            scene: &self.scene,
            draw_shadows: self.config.enable_shadows,
        };
        let result = self.sequencer.record_offscreen(
            self.offscreen_lists[list].as_mut(),
            &self.shadow_map,
            &self.gbuffer,
            &offscreen,
        );
        if let Err(e) = result {
            self.sequencer.reset();
            return Err(e);
        }

        if let Some(frame) = self.frame.as_mut() {
            frame.recorded = true;
        }
        Ok(())
    }

    /// Submit the offscreen list, signaling the offscreen semaphore, and hand
    /// the instance region to the GPU.
    pub fn submit_offscreen(&mut self) -> Result<()> {
        let (list, length) = match self.frame.as_ref() {
            Some(f) if f.recorded && !f.offscreen_submitted => (f.list, f.region.length),
            Some(f) if f.offscreen_submitted => {
                engine_bail_warn!("umbra::deferred", "offscreen list already submitted this frame")
            }
            _ => engine_bail_warn!("umbra::deferred", "submit_offscreen before record_offscreen"),
        };

        self.renderer.submit(&Submission {
            command_lists: &[self.offscreen_lists[list].as_ref()],
            wait_semaphores: &[],
            signal_semaphores: &[self.offscreen_semaphore.as_ref()],
            fence: None,
        })?;
        if let Some(frame) = self.frame.as_mut() {
            frame.offscreen_submitted = true;
        }

        self.instances.on_usage_complete(length)?;
        self.list_fences[list] = Some(self.renderer.insert_fence()?);
        Ok(())
    }

    /// Record the composition pass into `cmd`, inside the presentation
    /// render pass.
    pub fn record_composition(&mut self, cmd: &mut dyn CommandList) -> Result<()> {
        let Some(frame) = self.frame.as_ref() else {
            engine_bail_warn!("umbra::deferred", "record_composition before stream_instances");
        };
        let composition = CompositionFrame {
            pipeline: &self.pipelines.composition,
            binding_group: self.binder.group()?,
            instance_offset: frame.region.dynamic_offset(),
            width: self.width,
            height: self.height,
        };
        self.sequencer.record_composition_pass(cmd, &composition)
    }

    /// Submit the presentation list after the offscreen work.
    ///
    /// The offscreen semaphore is waited on at the fragment stage ahead of
    /// `wait`.
    pub fn submit_composition(
        &mut self,
        cmd: &dyn CommandList,
        wait: &[(&dyn Semaphore, PipelineStages)],
        signal: &[&dyn Semaphore],
        fence: Option<&dyn Fence>,
    ) -> Result<()> {
        match self.frame.as_ref() {
            Some(f) if f.offscreen_submitted && !f.composition_submitted => {}
            _ => engine_bail_warn!("umbra::deferred", "submit_composition before submit_offscreen"),
        }
        if self.sequencer.state() != PassState::CompositionPass {
            engine_bail_warn!("umbra::deferred", "submit_composition before record_composition");
        }

        let mut waits: Vec<(&dyn Semaphore, PipelineStages)> = Vec::with_capacity(wait.len() + 1);
        waits.push((self.offscreen_semaphore.as_ref(), PipelineStages::FRAGMENT_SHADER));
        waits.extend_from_slice(wait);

        self.renderer.submit(&Submission {
            command_lists: &[cmd],
            wait_semaphores: &waits,
            signal_semaphores: signal,
            fence,
        })?;

        if let Some(frame) = self.frame.as_mut() {
            frame.composition_submitted = true;
        }
        Ok(())
    }

    /// Close the frame; the next `stream_instances` starts a new one
    pub fn finish_frame(&mut self) -> Result<()> {
        if !self.frame.as_ref().is_some_and(|f| f.composition_submitted) {
            engine_bail_warn!("umbra::deferred", "finish_frame before submit_composition");
        }
        self.sequencer.finish()?;
        self.frame = None;
        self.frame_index += 1;
        Ok(())
    }

    /// Drop a frame that failed part-way, so the next one starts clean.
    ///
    /// A recorded but unsubmitted offscreen list is reset. If the offscreen
    /// semaphore was signaled but never waited on, the device is drained and
    /// the semaphore replaced.
    pub fn abort_frame(&mut self) -> Result<()> {
        let dangling_signal = self
            .frame
            .as_ref()
            .is_some_and(|f| f.offscreen_submitted && !f.composition_submitted);
        self.sequencer.reset();
        if let Some(frame) = self.frame.take() {
            if frame.offscreen_submitted {
                self.frame_index += 1;
            } else if self.list_fences[frame.list].is_none() {
                self.offscreen_lists[frame.list].reset()?;
            }
        }
        if dangling_signal {
            self.renderer.wait_idle()?;
            self.offscreen_semaphore = self.renderer.create_semaphore()?;
        }
        engine_warn!("umbra::deferred", "Frame {} aborted", self.frame_index);
        Ok(())
    }

    // ===== RECONFIGURATION =====

    /// Recreate the G-buffer for a new presentation size and rebind it.
    ///
    /// Drains the device first. The shadow map keeps its size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.ensure_between_frames("resize")?;
        self.renderer.wait_idle()?;
        self.gbuffer.resize(width, height)?;
        self.binder.bind(BindResources::Composition(Self::composition_bindings(
            &self.gbuffer,
            &self.shadow_map,
            &self.composition_ubo,
        )))?;
        self.width = width;
        self.height = height;
        engine_debug!("umbra::deferred", "Resized to {}x{}", width, height);
        Ok(())
    }

    /// Replace the bindless texture array.
    ///
    /// Drains the device first, since the previous binding group may still
    /// be read by an in-flight frame. Fails with `CapacityExceeded` beyond
    /// `max_textures`, leaving the current textures bound.
    pub fn set_textures(&mut self, textures: Vec<Arc<dyn Texture>>) -> Result<()> {
        self.ensure_between_frames("set_textures")?;
        let Some(current) = self.binder.geometry_bindings() else {
            return Err(engine_warn_err!("umbra::deferred", "set_textures before initialization"));
        };
        let geometry = GeometryBindings {
            textures,
            ..current.clone()
        };
        self.renderer.wait_idle()?;
        self.binder.bind(BindResources::Geometry(geometry))
    }

    /// Select what the composition pass shows, from the next
    /// `update_deferred` on
    pub fn set_debug_display(&mut self, display: DebugDisplay) {
        self.config.debug_display = display;
    }

    /// Enable or skip shadow rendering, from the next frame on
    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        self.config.enable_shadows = enabled;
    }

    fn ensure_between_frames(&self, op: &str) -> Result<()> {
        if self.frame.is_some() {
            engine_bail_warn!("umbra::deferred", "{} called in the middle of a frame", op);
        }
        Ok(())
    }

    // ===== ACCESSORS =====

    /// The offscreen list of the current (or next) frame
    pub fn offscreen_command_list(&self) -> &dyn CommandList {
        let index = self
            .frame
            .as_ref()
            .map_or((self.frame_index % self.offscreen_lists.len() as u64) as usize, |f| f.list);
        self.offscreen_lists[index].as_ref()
    }

    pub fn offscreen_semaphore(&self) -> &Arc<dyn Semaphore> {
        &self.offscreen_semaphore
    }

    pub fn composition_pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipelines.composition
    }

    pub fn pipelines(&self) -> &DeferredPipelines {
        &self.pipelines
    }

    pub fn pipeline_layout(&self) -> &Arc<dyn PipelineLayout> {
        self.builder.layout()
    }

    pub fn binding_group(&self) -> Result<&Arc<dyn BindingGroup>> {
        self.binder.group()
    }

    pub fn binder(&self) -> &ResourceBinder {
        &self.binder
    }

    pub fn shadow_map(&self) -> &OffscreenFramebuffer {
        &self.shadow_map
    }

    pub fn gbuffer(&self) -> &OffscreenFramebuffer {
        &self.gbuffer
    }

    pub fn presentation_pass(&self) -> &Arc<dyn RenderPass> {
        &self.presentation_pass
    }

    pub fn scene(&self) -> &SceneBuffers {
        &self.scene
    }

    pub fn instance_ring(&self) -> &StreamingRingBuffer {
        &self.instances
    }

    pub fn offscreen_uniform_buffer(&self) -> &Arc<dyn Buffer> {
        self.offscreen_ubo.buffer()
    }

    pub fn composition_uniform_buffer(&self) -> &Arc<dyn Buffer> {
        self.composition_ubo.buffer()
    }

    pub fn pass_state(&self) -> PassState {
        self.sequencer.state()
    }

    /// G-buffer sample count
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Frames finished so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn config(&self) -> &DeferredConfig {
        &self.config
    }
}

impl Drop for DeferredRenderer {
    fn drop(&mut self) {
        // Command lists and attachments may still be in use by the GPU
        if let Err(e) = self.renderer.wait_idle() {
            engine_warn!("umbra::deferred", "wait_idle failed while dropping: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "deferred_renderer_tests.rs"]
mod tests;
