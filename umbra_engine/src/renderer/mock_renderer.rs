/// Mock Renderer for unit tests (no GPU required)
///
/// Every object the mock creates shares one `MockState`, so tests can inspect
/// the recorded command stream, the submissions in queue order, the buffer
/// contents and the fences the components inserted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::renderer::{
    Renderer, Buffer, Texture, Shader, Pipeline, PipelineLayout, PipelineCache, CommandList,
    RenderPass, BindingLayout, BindingGroup, Framebuffer, Fence, FenceStatus, Semaphore,
    BufferDesc, TextureDesc, TextureFormat, TextureInfo, ShaderDesc, ShaderStage, PipelineDesc,
    PipelineLayoutDesc, RenderPassDesc, FramebufferDesc, BindingLayoutDesc, BindingWrite,
    BindingResource, BindingType, Submission, FormatFeatures, FormatProperties, DeviceLimits,
    RendererStats, Viewport, Rect2D, ClearValue, IndexType,
};
use crate::error::Result;
use crate::{engine_bail_warn, engine_err};

// ============================================================================
// Shared state
// ============================================================================

/// A recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Begin,
    End,
    Reset,
    BeginRenderPass {
        render_pass: String,
        width: u32,
        height: u32,
        clear_values: Vec<ClearValue>,
    },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindPipeline(String),
    BindBindingGroup {
        set_index: u32,
        dynamic_offsets: Vec<u32>,
    },
    BindVertexBuffer(String),
    BindIndexBuffer(String, IndexType),
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
    DrawIndexedIndirectCount {
        buffer: String,
        count_buffer: String,
        max_draw_count: u32,
        stride: u32,
    },
}

/// A recorded queue submission
#[derive(Debug, Clone, PartialEq)]
pub struct MockSubmission {
    pub command_lists: Vec<String>,
    pub wait_semaphores: Vec<u64>,
    pub signal_semaphores: Vec<u64>,
    pub fence: Option<u64>,
}

#[derive(Default)]
pub struct MockState {
    next_id: AtomicU64,
    /// (command list label, command) in recording order
    pub commands: Mutex<Vec<(String, MockCommand)>>,
    pub submissions: Mutex<Vec<MockSubmission>>,
    pub textures: Mutex<Vec<(String, TextureInfo)>>,
    pub buffers: Mutex<Vec<String>>,
    pub pipelines: Mutex<Vec<PipelineDesc>>,
    pub render_passes: Mutex<Vec<RenderPassDesc>>,
    pub binding_layouts: Mutex<Vec<BindingLayoutDesc>>,
    fences: Mutex<Vec<Arc<AtomicBool>>>,
    /// When set, inserted fences start signaled
    pub auto_signal_fences: AtomicBool,
    pub fence_flushes: AtomicU64,
    /// When set, the next `insert_fence` fails like a lost device would
    pub fail_next_insert_fence: AtomicBool,
    format_overrides: Mutex<HashMap<TextureFormat, FormatProperties>>,
    limits: Mutex<Option<DeviceLimits>>,
}

impl MockState {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn record(&self, list: &str, command: MockCommand) {
        self.commands.lock().unwrap().push((list.to_string(), command));
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub label: String,
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64, label: &str) -> Self {
        Self {
            label: label.to_string(),
            data: Mutex::new(vec![0; size as usize]),
        }
    }

    /// Copy `len` bytes starting at `offset`
    pub fn read(&self, offset: u64, len: usize) -> Vec<u8> {
        let data = self.data.lock().unwrap();
        data[offset as usize..offset as usize + len].to_vec()
    }
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let end = offset as usize + bytes.len();
        if end > data.len() {
            return Err(crate::error::Error::InvalidResource(format!(
                "write of {} bytes at {} overflows buffer '{}' of {} bytes",
                bytes.len(), offset, self.label, data.len()
            )));
        }
        data[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }
}

// ============================================================================
// Mock Texture / Shader / RenderPass / Framebuffer
// ============================================================================

pub struct MockTexture {
    pub label: String,
    pub info: TextureInfo,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

pub struct MockShader {
    pub label: String,
    pub stage: ShaderStage,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

pub struct MockRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn color_attachment_count(&self) -> u32 {
        self.desc.color_attachments.len() as u32
    }

    fn has_depth_attachment(&self) -> bool {
        self.desc.depth_attachment.is_some()
    }
}

pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
    pub attachment_count: usize,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ============================================================================
// Mock bindings
// ============================================================================

pub struct MockBindingLayout {
    pub desc: BindingLayoutDesc,
}

impl BindingLayout for MockBindingLayout {
    fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

pub struct MockBindingGroup {
    pub set_index: u32,
    pub layout: Arc<dyn BindingLayout>,
    /// (binding, summary of the written resource)
    pub bindings: Vec<(u32, String)>,
}

impl MockBindingGroup {
    /// Summary written at `binding`
    pub fn binding(&self, binding: u32) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, s)| s.as_str())
    }
}

impl BindingGroup for MockBindingGroup {
    fn set_index(&self) -> u32 {
        self.set_index
    }

    fn layout(&self) -> &Arc<dyn BindingLayout> {
        &self.layout
    }
}

// ============================================================================
// Mock pipelines
// ============================================================================

pub struct MockPipelineLayout {
    pub binding_layouts: Vec<Arc<dyn BindingLayout>>,
}

impl PipelineLayout for MockPipelineLayout {
    fn binding_layouts(&self) -> &[Arc<dyn BindingLayout>] {
        &self.binding_layouts
    }
}

pub struct MockPipelineCache {
    pub data: Vec<u8>,
}

impl PipelineCache for MockPipelineCache {
    fn data(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

pub struct MockPipeline {
    pub label: String,
    pub layout: Arc<dyn PipelineLayout>,
}

impl Pipeline for MockPipeline {
    fn label(&self) -> &str {
        &self.label
    }

    fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }
}

// ============================================================================
// Mock sync
// ============================================================================

pub struct MockFence {
    pub id: u64,
    pub signaled: Arc<AtomicBool>,
    state: Arc<MockState>,
}

impl MockFence {
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::SeqCst);
    }
}

impl Fence for MockFence {
    fn is_signaled(&self) -> Result<bool> {
        Ok(self.signaled.load(Ordering::SeqCst))
    }

    fn wait(&self, timeout: Duration) -> Result<FenceStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.signaled.load(Ordering::SeqCst) {
                return Ok(FenceStatus::Signaled);
            }
            if Instant::now() >= deadline {
                return Ok(FenceStatus::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn flush(&self) -> Result<()> {
        self.state.fence_flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockSemaphore {
    pub id: u64,
    pub signaled: AtomicBool,
}

impl Semaphore for MockSemaphore {}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub label: String,
    state: Arc<MockState>,
    recording: bool,
    in_render_pass: bool,
    executable: bool,
}

impl MockCommandList {
    fn check_recording(&self, op: &str) -> Result<()> {
        if !self.recording {
            engine_bail_warn!("umbra::mock", "{}: command list '{}' is not recording", op, self.label);
        }
        Ok(())
    }

    fn check_in_render_pass(&self, op: &str) -> Result<()> {
        self.check_recording(op)?;
        if !self.in_render_pass {
            engine_bail_warn!("umbra::mock", "{}: no render pass active on '{}'", op, self.label);
        }
        Ok(())
    }

    fn push(&self, command: MockCommand) {
        self.state.record(&self.label, command);
    }
}

fn buffer_label(buffer: &Arc<dyn Buffer>) -> String {
    let mock = unsafe { &*(buffer.as_ref() as *const dyn Buffer as *const MockBuffer) };
    mock.label.clone()
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            engine_bail_warn!("umbra::mock", "begin: command list '{}' already recording", self.label);
        }
        self.recording = true;
        self.executable = false;
        self.push(MockCommand::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.check_recording("end")?;
        if self.in_render_pass {
            engine_bail_warn!("umbra::mock", "end: render pass still active on '{}'", self.label);
        }
        self.recording = false;
        self.executable = true;
        self.push(MockCommand::End);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.recording = false;
        self.in_render_pass = false;
        self.executable = false;
        self.push(MockCommand::Reset);
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.check_recording("begin_render_pass")?;
        if self.in_render_pass {
            engine_bail_warn!("umbra::mock", "begin_render_pass: render pass already active");
        }
        let pass = unsafe { &*(render_pass.as_ref() as *const dyn RenderPass as *const MockRenderPass) };
        self.in_render_pass = true;
        self.push(MockCommand::BeginRenderPass {
            render_pass: pass.desc.label.clone(),
            width: framebuffer.width(),
            height: framebuffer.height(),
            clear_values: clear_values.to_vec(),
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.check_in_render_pass("end_render_pass")?;
        self.in_render_pass = false;
        self.push(MockCommand::EndRenderPass);
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.check_recording("set_viewport")?;
        self.push(MockCommand::SetViewport(viewport));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.check_recording("set_scissor")?;
        self.push(MockCommand::SetScissor(scissor));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.check_recording("bind_pipeline")?;
        self.push(MockCommand::BindPipeline(pipeline.label().to_string()));
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        binding_group: &Arc<dyn BindingGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.check_recording("bind_binding_group")?;
        let expected = binding_group.layout().desc().dynamic_count();
        if dynamic_offsets.len() != expected {
            engine_bail_warn!(
                "umbra::mock",
                "bind_binding_group: {} dynamic offsets given, layout needs {}",
                dynamic_offsets.len(), expected
            );
        }
        self.push(MockCommand::BindBindingGroup {
            set_index,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.check_recording("bind_vertex_buffer")?;
        self.push(MockCommand::BindVertexBuffer(buffer_label(buffer)));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, _offset: u64, index_type: IndexType) -> Result<()> {
        self.check_recording("bind_index_buffer")?;
        self.push(MockCommand::BindIndexBuffer(buffer_label(buffer), index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.check_in_render_pass("draw")?;
        self.push(MockCommand::Draw { vertex_count, first_vertex });
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.check_in_render_pass("draw_indexed")?;
        self.push(MockCommand::DrawIndexed { index_count, first_index, vertex_offset });
        Ok(())
    }

    fn draw_indexed_indirect_count(
        &mut self,
        buffer: &Arc<dyn Buffer>,
        _offset: u64,
        count_buffer: &Arc<dyn Buffer>,
        _count_offset: u64,
        max_draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        self.check_in_render_pass("draw_indexed_indirect_count")?;
        self.push(MockCommand::DrawIndexedIndirectCount {
            buffer: buffer_label(buffer),
            count_buffer: buffer_label(count_buffer),
            max_draw_count,
            stride,
        });
        Ok(())
    }
}

// ============================================================================
// Mock Renderer
// ============================================================================

/// Mock Renderer that tracks created resources and submissions without GPU
#[derive(Clone, Default)]
pub struct MockRenderer {
    pub state: Arc<MockState>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock with fences that signal as soon as they are inserted
    pub fn auto_signaling() -> Self {
        let mock = Self::new();
        mock.state.auto_signal_fences.store(true, Ordering::SeqCst);
        mock
    }

    /// Override the reported capabilities of `format`
    pub fn set_format_properties(&self, format: TextureFormat, properties: FormatProperties) {
        self.state.format_overrides.lock().unwrap().insert(format, properties);
    }

    pub fn set_limits(&self, limits: DeviceLimits) {
        *self.state.limits.lock().unwrap() = Some(limits);
    }

    pub fn fail_next_insert_fence(&self) {
        self.state.fail_next_insert_fence.store(true, Ordering::SeqCst);
    }

    /// Signal every fence inserted so far
    pub fn signal_all_fences(&self) {
        for fence in self.state.fences.lock().unwrap().iter() {
            fence.store(true, Ordering::SeqCst);
        }
    }

    /// Commands recorded into the list labelled `label`
    pub fn commands_of(&self, label: &str) -> Vec<MockCommand> {
        self.state
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn clear_commands(&self) {
        self.state.commands.lock().unwrap().clear();
    }

    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.state.submissions.lock().unwrap().clone()
    }

    fn default_format_properties(format: TextureFormat) -> FormatProperties {
        let optimal = if format.is_depth() {
            FormatFeatures::DEPTH_STENCIL_ATTACHMENT | FormatFeatures::SAMPLED_IMAGE
        } else {
            FormatFeatures::COLOR_ATTACHMENT
                | FormatFeatures::SAMPLED_IMAGE
                | FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR
                | FormatFeatures::TRANSFER_DST
        };
        FormatProperties {
            linear: FormatFeatures::empty(),
            optimal,
        }
    }

    fn describe(resource: &BindingResource) -> (BindingType, u32, String) {
        match resource {
            BindingResource::UniformBuffer { buffer, offset, range } => {
                let mock = unsafe { &*(*buffer as *const dyn Buffer as *const MockBuffer) };
                (BindingType::UniformBuffer, 1, format!("uniform:{}@{}+{}", mock.label, offset, range))
            }
            BindingResource::StorageBuffer { buffer, offset, range } => {
                let mock = unsafe { &*(*buffer as *const dyn Buffer as *const MockBuffer) };
                (BindingType::StorageBuffer, 1, format!("storage:{}@{}+{}", mock.label, offset, range))
            }
            BindingResource::Sampler(sampler) => {
                (BindingType::Sampler, 1, format!("sampler:{:?}", sampler))
            }
            BindingResource::SampledImageArray(textures) => {
                (BindingType::SampledImage, textures.len() as u32, format!("images:{}", textures.len()))
            }
            BindingResource::SampledTexture { texture, sampler, layout } => {
                let mock = unsafe { &*(*texture as *const dyn Texture as *const MockTexture) };
                (
                    BindingType::CombinedImageSampler,
                    1,
                    format!("texture:{}:{:?}:{:?}", mock.label, sampler, layout),
                )
            }
        }
    }
}

impl Renderer for MockRenderer {
    fn create_texture(&self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        let info = TextureInfo::from(&desc);
        self.state.textures.lock().unwrap().push((desc.label.clone(), info.clone()));
        Ok(Arc::new(MockTexture { label: desc.label, info }))
    }

    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.state.buffers.lock().unwrap().push(desc.label.clone());
        Ok(Arc::new(MockBuffer::new(desc.size, &desc.label)))
    }

    fn create_shader(&self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            return Err(crate::error::Error::InvalidResource(format!(
                "shader '{}' has {} bytes, not a SPIR-V word stream", desc.label, desc.code.len()
            )));
        }
        Ok(Arc::new(MockShader { label: desc.label.to_string(), stage: desc.stage }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        self.state.render_passes.lock().unwrap().push(desc.clone());
        Ok(Arc::new(MockRenderPass { desc: desc.clone() }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        let attachments = desc.color_attachments.iter().chain(desc.depth_attachment.iter());
        for attachment in attachments.clone() {
            let info = attachment.info();
            if info.width != desc.width || info.height != desc.height {
                engine_bail_warn!(
                    "umbra::mock",
                    "attachment {}x{} does not match framebuffer {}x{}",
                    info.width, info.height, desc.width, desc.height
                );
            }
        }
        Ok(Arc::new(MockFramebuffer {
            width: desc.width,
            height: desc.height,
            attachment_count: attachments.count(),
        }))
    }

    fn create_binding_layout(&self, desc: &BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        self.state.binding_layouts.lock().unwrap().push(desc.clone());
        Ok(Arc::new(MockBindingLayout { desc: desc.clone() }))
    }

    fn create_binding_group(
        &self,
        layout: &Arc<dyn BindingLayout>,
        set_index: u32,
        writes: &[BindingWrite],
    ) -> Result<Arc<dyn BindingGroup>> {
        let mut bindings = Vec::with_capacity(writes.len());
        for write in writes {
            let Some(slot) = layout.desc().entry(write.binding) else {
                engine_bail_warn!("umbra::mock", "binding {} not declared in layout", write.binding);
            };
            let (kind, count, summary) = Self::describe(&write.resource);
            let kind_matches = kind == slot.binding_type
                || (kind == BindingType::StorageBuffer && slot.binding_type == BindingType::StorageBufferDynamic);
            if !kind_matches {
                engine_bail_warn!(
                    "umbra::mock",
                    "binding {}: {:?} written into a {:?} slot",
                    write.binding, kind, slot.binding_type
                );
            }
            if count > slot.count || (count < slot.count && !slot.partially_bound) {
                engine_bail_warn!(
                    "umbra::mock",
                    "binding {}: {} descriptors written, slot holds {}",
                    write.binding, count, slot.count
                );
            }
            bindings.push((write.binding, summary));
        }
        Ok(Arc::new(MockBindingGroup {
            set_index,
            layout: Arc::clone(layout),
            bindings,
        }))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        Ok(Arc::new(MockPipelineLayout { binding_layouts: desc.binding_layouts.clone() }))
    }

    fn create_pipeline_cache(&self, initial_data: &[u8]) -> Result<Arc<dyn PipelineCache>> {
        Ok(Arc::new(MockPipelineCache { data: initial_data.to_vec() }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        let color_count = desc.render_pass.color_attachment_count() as usize;
        if desc.color_blend_attachments.len() != color_count {
            engine_bail_warn!(
                "umbra::mock",
                "pipeline '{}': {} blend attachments for a {}-color subpass",
                desc.label, desc.color_blend_attachments.len(), color_count
            );
        }
        self.state.pipelines.lock().unwrap().push(desc.clone());
        Ok(Arc::new(MockPipeline {
            label: desc.label.clone(),
            layout: Arc::clone(&desc.layout),
        }))
    }

    fn create_command_list(&self, label: &str) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList {
            label: label.to_string(),
            state: Arc::clone(&self.state),
            recording: false,
            in_render_pass: false,
            executable: false,
        }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(MockSemaphore {
            id: self.state.next_id(),
            signaled: AtomicBool::new(false),
        }))
    }

    fn create_fence(&self) -> Result<Arc<dyn Fence>> {
        let signaled = Arc::new(AtomicBool::new(false));
        self.state.fences.lock().unwrap().push(Arc::clone(&signaled));
        Ok(Arc::new(MockFence {
            id: self.state.next_id(),
            signaled,
            state: Arc::clone(&self.state),
        }))
    }

    fn insert_fence(&self) -> Result<Arc<dyn Fence>> {
        if self.state.fail_next_insert_fence.swap(false, Ordering::SeqCst) {
            return Err(engine_err!("umbra::mock", "insert_fence: queue submission failed"));
        }
        let auto = self.state.auto_signal_fences.load(Ordering::SeqCst);
        let signaled = Arc::new(AtomicBool::new(auto));
        self.state.fences.lock().unwrap().push(Arc::clone(&signaled));
        Ok(Arc::new(MockFence {
            id: self.state.next_id(),
            signaled,
            state: Arc::clone(&self.state),
        }))
    }

    fn submit(&self, submission: &Submission) -> Result<()> {
        let mut lists = Vec::with_capacity(submission.command_lists.len());
        for list in submission.command_lists {
            let mock = unsafe { &*(*list as *const dyn CommandList as *const MockCommandList) };
            if !mock.executable {
                engine_bail_warn!("umbra::mock", "submit: command list '{}' was not ended", mock.label);
            }
            lists.push(mock.label.clone());
        }

        let mut waits = Vec::new();
        for (semaphore, _stages) in submission.wait_semaphores {
            let mock = unsafe { &*(*semaphore as *const dyn Semaphore as *const MockSemaphore) };
            if !mock.signaled.swap(false, Ordering::SeqCst) {
                engine_bail_warn!("umbra::mock", "submit: waiting on unsignaled semaphore {}", mock.id);
            }
            waits.push(mock.id);
        }

        let mut signals = Vec::new();
        for semaphore in submission.signal_semaphores {
            let mock = unsafe { &*(*semaphore as *const dyn Semaphore as *const MockSemaphore) };
            mock.signaled.store(true, Ordering::SeqCst);
            signals.push(mock.id);
        }

        let fence = submission.fence.map(|fence| {
            let mock = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
            if self.state.auto_signal_fences.load(Ordering::SeqCst) {
                mock.signal();
            }
            mock.id
        });

        self.state.submissions.lock().unwrap().push(MockSubmission {
            command_lists: lists,
            wait_semaphores: waits,
            signal_semaphores: signals,
            fence,
        });
        Ok(())
    }

    fn format_properties(&self, format: TextureFormat) -> FormatProperties {
        self.state
            .format_overrides
            .lock()
            .unwrap()
            .get(&format)
            .copied()
            .unwrap_or_else(|| Self::default_format_properties(format))
    }

    fn limits(&self) -> DeviceLimits {
        let limits = *self.state.limits.lock().unwrap();
        limits.unwrap_or(DeviceLimits {
            max_sample_count: 4,
            min_storage_buffer_offset_alignment: 256,
            min_uniform_buffer_offset_alignment: 256,
            max_image_dimension_2d: 16384,
        })
    }

    fn wait_idle(&self) -> Result<()> {
        self.signal_all_fences();
        Ok(())
    }

    fn stats(&self) -> RendererStats {
        RendererStats {
            submissions: self.state.submissions.lock().unwrap().len() as u64,
            buffers: self.state.buffers.lock().unwrap().len() as u32,
            textures: self.state.textures.lock().unwrap().len() as u32,
            gpu_memory_used: 0,
        }
    }
}

#[cfg(test)]
#[path = "mock_renderer_tests.rs"]
mod tests;
