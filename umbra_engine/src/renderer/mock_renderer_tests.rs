/// Unit tests for MockRenderer
///
/// The deferred components are only as trustworthy as the mock they are
/// tested against, so the mock's own rules get checked here.

use crate::renderer::mock_renderer::*;
use crate::renderer::{
    Renderer, Buffer, Fence, FenceStatus, BufferDesc, BufferUsage, Submission, PipelineStages,
    BindingLayoutDesc, BindingSlotDesc, BindingType, ShaderStageFlags, BindingWrite,
    BindingResource, SamplerType,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// MockBuffer Tests
// ============================================================================

#[test]
fn test_mock_buffer_update_and_read() {
    let buffer = MockBuffer::new(16, "test_buffer");
    buffer.update(4, &[1, 2, 3, 4]).unwrap();
    assert_eq!(buffer.read(4, 4), vec![1, 2, 3, 4]);
    assert_eq!(buffer.size(), 16);
}

#[test]
fn test_mock_buffer_rejects_overflow() {
    let buffer = MockBuffer::new(8, "small");
    assert!(buffer.update(6, &[0; 4]).is_err());
}

// ============================================================================
// CommandList state Tests
// ============================================================================

#[test]
fn test_command_list_requires_begin() {
    let mock = MockRenderer::new();
    let mut cmd = mock.create_command_list("cmd").unwrap();
    assert!(cmd.draw(3, 0).is_err());
    assert!(cmd.end().is_err());
}

#[test]
fn test_draw_outside_render_pass_fails() {
    let mock = MockRenderer::new();
    let mut cmd = mock.create_command_list("cmd").unwrap();
    cmd.begin().unwrap();
    assert!(cmd.draw(3, 0).is_err());
    cmd.end().unwrap();
    assert_eq!(mock.commands_of("cmd"), vec![MockCommand::Begin, MockCommand::End]);
}

#[test]
fn test_reset_discards_an_unfinished_recording() {
    let mock = MockRenderer::new();
    let mut cmd = mock.create_command_list("cmd").unwrap();
    cmd.begin().unwrap();
    assert!(cmd.begin().is_err());

    cmd.reset().unwrap();
    assert!(cmd.draw(3, 0).is_err());
    cmd.begin().unwrap();
    cmd.end().unwrap();
    assert_eq!(
        mock.commands_of("cmd"),
        vec![MockCommand::Begin, MockCommand::Reset, MockCommand::Begin, MockCommand::End]
    );
}

#[test]
fn test_reset_list_cannot_be_submitted() {
    let mock = MockRenderer::new();
    let mut cmd = mock.create_command_list("cmd").unwrap();
    cmd.begin().unwrap();
    cmd.end().unwrap();
    cmd.reset().unwrap();

    let result = mock.submit(&Submission {
        command_lists: &[cmd.as_ref()],
        wait_semaphores: &[],
        signal_semaphores: &[],
        fence: None,
    });
    assert!(result.is_err());
}

// ============================================================================
// Submission Tests
// ============================================================================

#[test]
fn test_submit_requires_ended_list() {
    let mock = MockRenderer::new();
    let mut cmd = mock.create_command_list("cmd").unwrap();
    cmd.begin().unwrap();

    let result = mock.submit(&Submission {
        command_lists: &[cmd.as_ref()],
        wait_semaphores: &[],
        signal_semaphores: &[],
        fence: None,
    });
    assert!(result.is_err());
}

#[test]
fn test_semaphore_must_be_signaled_before_wait() {
    let mock = MockRenderer::new();
    let semaphore = mock.create_semaphore().unwrap();
    let mut first = mock.create_command_list("first").unwrap();
    let mut second = mock.create_command_list("second").unwrap();
    first.begin().unwrap();
    first.end().unwrap();
    second.begin().unwrap();
    second.end().unwrap();

    let waits = [(semaphore.as_ref(), PipelineStages::FRAGMENT_SHADER)];
    let premature = mock.submit(&Submission {
        command_lists: &[second.as_ref()],
        wait_semaphores: &waits,
        signal_semaphores: &[],
        fence: None,
    });
    assert!(premature.is_err());

    mock.submit(&Submission {
        command_lists: &[first.as_ref()],
        wait_semaphores: &[],
        signal_semaphores: &[semaphore.as_ref()],
        fence: None,
    }).unwrap();
    mock.submit(&Submission {
        command_lists: &[second.as_ref()],
        wait_semaphores: &waits,
        signal_semaphores: &[],
        fence: None,
    }).unwrap();

    let submissions = mock.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].command_lists, vec!["first".to_string()]);
    assert_eq!(submissions[1].wait_semaphores, submissions[0].signal_semaphores);
}

// ============================================================================
// Fence Tests
// ============================================================================

#[test]
fn test_inserted_fence_waits_until_signaled() {
    let mock = MockRenderer::new();
    let fence = mock.insert_fence().unwrap();
    assert!(!fence.is_signaled().unwrap());
    assert_eq!(fence.wait(Duration::from_millis(5)).unwrap(), FenceStatus::Timeout);

    mock.signal_all_fences();
    assert!(fence.is_signaled().unwrap());
    assert_eq!(fence.wait(Duration::ZERO).unwrap(), FenceStatus::Signaled);
}

#[test]
fn test_auto_signaling_mock() {
    let mock = MockRenderer::auto_signaling();
    let fence: Arc<dyn Fence> = mock.insert_fence().unwrap();
    assert!(fence.is_signaled().unwrap());
}

// ============================================================================
// Binding validation Tests
// ============================================================================

#[test]
fn test_binding_group_rejects_type_mismatch() {
    let mock = MockRenderer::new();
    let layout = mock.create_binding_layout(&BindingLayoutDesc {
        entries: vec![BindingSlotDesc {
            binding: 0,
            binding_type: BindingType::UniformBuffer,
            count: 1,
            stage_flags: ShaderStageFlags::VERTEX,
            partially_bound: false,
        }],
    }).unwrap();

    let wrong = mock.create_binding_group(&layout, 0, &[BindingWrite {
        binding: 0,
        resource: BindingResource::Sampler(SamplerType::LinearRepeat),
    }]);
    assert!(wrong.is_err());

    let buffer = mock.create_buffer(BufferDesc::mapped("ubo", 64, BufferUsage::UNIFORM)).unwrap();
    let right = mock.create_binding_group(&layout, 0, &[BindingWrite {
        binding: 0,
        resource: BindingResource::UniformBuffer { buffer: buffer.as_ref(), offset: 0, range: 64 },
    }]);
    assert!(right.is_ok());
}
