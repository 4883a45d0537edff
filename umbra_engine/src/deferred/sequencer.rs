/// Pass Sequencer: records the three deferred passes in a fixed order
///
/// ```text
/// Idle ──shadow──▶ ShadowPass ──geometry──▶ GeometryPass ──composition──▶ CompositionPass ──finish──▶ Idle
/// ```
///
/// Shadow and geometry go into the offscreen command list, one after the
/// other. Composition is recorded into the frame driver's presentation list,
/// inside its presentation render pass. Any other order is an
/// `InvalidState` error and leaves the state unchanged.

use std::sync::Arc;
use crate::deferred::{DeferredPipelines, OffscreenFramebuffer, DEFERRED_BINDING_SET};
use crate::error::Result;
use crate::renderer::{BindingGroup, CommandList, Pipeline, Rect2D, Viewport};
use crate::scene::SceneBuffers;
use crate::{engine_bail_warn, engine_trace, engine_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    ShadowPass,
    GeometryPass,
    CompositionPass,
}

/// Everything the offscreen passes bind
pub struct OffscreenFrame<'a> {
    pub pipelines: &'a DeferredPipelines,
    pub binding_group: &'a Arc<dyn BindingGroup>,
    /// Dynamic offset of this frame's instance records
    pub instance_offset: u32,
    pub scene: &'a SceneBuffers,
    /// When false the shadow pass only clears the shadow map
    pub draw_shadows: bool,
}

/// Everything the composition pass binds
pub struct CompositionFrame<'a> {
    pub pipeline: &'a Arc<dyn Pipeline>,
    pub binding_group: &'a Arc<dyn BindingGroup>,
    pub instance_offset: u32,
    /// Extent of the presentation target
    pub width: u32,
    pub height: u32,
}

pub struct PassSequencer {
    state: PassState,
}

impl Default for PassSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl PassSequencer {
    pub fn new() -> Self {
        Self { state: PassState::Idle }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    fn check(&self, from: PassState, to: PassState) -> Result<()> {
        if self.state != from {
            engine_bail_warn!(
                "umbra::sequencer",
                "cannot enter {:?} from {:?} (expected {:?})",
                to, self.state, from
            );
        }
        Ok(())
    }

    fn advance(&mut self, to: PassState) {
        engine_trace!("umbra::sequencer", "{:?} -> {:?}", self.state, to);
        self.state = to;
    }

    /// Return to `Idle` after a failed frame
    pub fn reset(&mut self) {
        self.state = PassState::Idle;
    }

    /// `Idle -> ShadowPass`: render scene depth from the light
    pub fn record_shadow_pass(
        &mut self,
        cmd: &mut dyn CommandList,
        shadow_map: &OffscreenFramebuffer,
        frame: &OffscreenFrame,
    ) -> Result<()> {
        self.check(PassState::Idle, PassState::ShadowPass)?;
        Self::record_scene_pass(cmd, shadow_map, &frame.pipelines.shadow, frame, frame.draw_shadows)?;
        self.advance(PassState::ShadowPass);
        Ok(())
    }

    /// `ShadowPass -> GeometryPass`: fill the G-buffer
    pub fn record_geometry_pass(
        &mut self,
        cmd: &mut dyn CommandList,
        gbuffer: &OffscreenFramebuffer,
        frame: &OffscreenFrame,
    ) -> Result<()> {
        self.check(PassState::ShadowPass, PassState::GeometryPass)?;
        Self::record_scene_pass(cmd, gbuffer, &frame.pipelines.geometry, frame, true)?;
        self.advance(PassState::GeometryPass);
        Ok(())
    }

    /// `GeometryPass -> CompositionPass`: light the G-buffer with a
    /// fullscreen triangle. The presentation render pass must be active on
    /// `cmd`.
    pub fn record_composition_pass(&mut self, cmd: &mut dyn CommandList, frame: &CompositionFrame) -> Result<()> {
        self.check(PassState::GeometryPass, PassState::CompositionPass)?;
        cmd.set_viewport(Viewport::full(frame.width, frame.height))?;
        cmd.set_scissor(Rect2D::full(frame.width, frame.height))?;
        cmd.bind_pipeline(frame.pipeline)?;
        cmd.bind_binding_group(frame.pipeline, DEFERRED_BINDING_SET, frame.binding_group, &[frame.instance_offset])?;
        cmd.draw(3, 0)?;
        self.advance(PassState::CompositionPass);
        Ok(())
    }

    /// `CompositionPass -> Idle`
    pub fn finish(&mut self) -> Result<()> {
        self.check(PassState::CompositionPass, PassState::Idle)?;
        self.advance(PassState::Idle);
        Ok(())
    }

    /// Record shadow then geometry into `cmd` between `begin` and `end`.
    ///
    /// On failure `cmd` is reset and the sequencer is back in `Idle`, so the
    /// same list can be recorded again.
    pub fn record_offscreen(
        &mut self,
        cmd: &mut dyn CommandList,
        shadow_map: &OffscreenFramebuffer,
        gbuffer: &OffscreenFramebuffer,
        frame: &OffscreenFrame,
    ) -> Result<()> {
        self.check(PassState::Idle, PassState::ShadowPass)?;
        cmd.begin()?;
        if let Err(e) = self.record_offscreen_passes(cmd, shadow_map, gbuffer, frame) {
            self.reset();
            if let Err(reset) = cmd.reset() {
                engine_warn!("umbra::sequencer", "Failed to reset offscreen list: {}", reset);
            }
            return Err(e);
        }
        Ok(())
    }

    fn record_offscreen_passes(
        &mut self,
        cmd: &mut dyn CommandList,
        shadow_map: &OffscreenFramebuffer,
        gbuffer: &OffscreenFramebuffer,
        frame: &OffscreenFrame,
    ) -> Result<()> {
        self.record_shadow_pass(cmd, shadow_map, frame)?;
        self.record_geometry_pass(cmd, gbuffer, frame)?;
        cmd.end()
    }

    /// One render pass over the scene: viewport, pipeline, bindings and a
    /// single indirect-count draw
    fn record_scene_pass(
        cmd: &mut dyn CommandList,
        target: &OffscreenFramebuffer,
        pipeline: &Arc<dyn Pipeline>,
        frame: &OffscreenFrame,
        draw: bool,
    ) -> Result<()> {
        let size = target.size();
        cmd.begin_render_pass(target.render_pass(), target.framebuffer(), target.clear_values())?;
        if draw {
            let scene = frame.scene;
            cmd.set_viewport(Viewport::full(size.width, size.height))?;
            cmd.set_scissor(Rect2D::full(size.width, size.height))?;
            cmd.bind_pipeline(pipeline)?;
            cmd.bind_vertex_buffer(&scene.vertex_buffer, 0)?;
            cmd.bind_index_buffer(&scene.index_buffer, 0, scene.index_type)?;
            cmd.bind_binding_group(pipeline, DEFERRED_BINDING_SET, frame.binding_group, &[frame.instance_offset])?;
            cmd.draw_indexed_indirect_count(
                &scene.indirect_buffer,
                0,
                &scene.count_buffer,
                0,
                scene.max_draw_count,
                scene.draw_stride(),
            )?;
        }
        cmd.end_render_pass()
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
