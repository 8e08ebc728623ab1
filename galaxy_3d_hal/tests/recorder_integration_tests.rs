//! Integration tests for the command recorder
//!
//! Records upload and input-assembly sequences through a `DeviceContext`
//! and checks the barriers and commands that reach the backend.
//! No GPU required.
//!
//! Run with: cargo test --test recorder_integration_tests

mod test_device;

use galaxy_3d_hal::galaxy3d::context::DeviceContext;
use galaxy_3d_hal::galaxy3d::device::{BufferBindFlags, Fence, IndexType, ResourceRef};
use galaxy_3d_hal::galaxy3d::state::{ResourceState, StateTransitionDesc, TransitionMode};
use galaxy_3d_hal::galaxy3d::Error;
use std::sync::Arc;
use std::thread;
use test_device::{buffer, texture_2d, TestDevice};

const TRANSITION: TransitionMode = TransitionMode::Transition;

fn barrier(name: &str, from: ResourceState, to: ResourceState) -> String {
    format!("barrier {} {:?} -> {:?}", name, from, to)
}

// ============================================================================
// UPLOADS
// ============================================================================

#[test]
fn test_integration_upload_then_draw_inputs() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Upload").unwrap();

    let staging = buffer("Staging", 1024, BufferBindFlags::empty(), ResourceState::COPY_SOURCE);
    let vertices = buffer("Vertices", 1024, BufferBindFlags::VERTEX, ResourceState::UNDEFINED);
    let indices = buffer("Indices", 256, BufferBindFlags::INDEX, ResourceState::UNDEFINED);

    context.update_buffer(&staging, 0, &[1u8; 512], TRANSITION).unwrap();
    context.copy_buffer(&staging, 0, TRANSITION, &vertices, 0, TRANSITION, 512).unwrap();
    context.update_buffer(&indices, 0, &[0u8; 64], TRANSITION).unwrap();
    context.set_vertex_buffers(0, &[(vertices.clone(), 0)], TRANSITION).unwrap();
    context.set_index_buffer(&indices, 0, IndexType::U16, TRANSITION).unwrap();

    assert_eq!(device.commands(), vec![
        barrier("Staging", ResourceState::COPY_SOURCE, ResourceState::COPY_DEST),
        "update Staging +0 512 bytes".to_string(),
        barrier("Staging", ResourceState::COPY_DEST, ResourceState::COPY_SOURCE),
        barrier("Vertices", ResourceState::UNDEFINED, ResourceState::COPY_DEST),
        "copy Staging -> Vertices 512 bytes".to_string(),
        barrier("Indices", ResourceState::UNDEFINED, ResourceState::COPY_DEST),
        "update Indices +0 64 bytes".to_string(),
        barrier("Vertices", ResourceState::COPY_DEST, ResourceState::VERTEX_BUFFER),
        "vertex buffers 0 x1".to_string(),
        barrier("Indices", ResourceState::COPY_DEST, ResourceState::INDEX_BUFFER),
        "index buffer Indices".to_string(),
    ]);
    assert_eq!(context.tracker().barrier_count(), 6);
    assert_eq!(vertices.state().get(), ResourceState::VERTEX_BUFFER);
}

#[test]
fn test_integration_untracked_resources_emit_no_barriers() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Upload").unwrap();

    let vertices = buffer("Vertices", 64, BufferBindFlags::VERTEX, ResourceState::UNKNOWN);
    context.update_buffer(&vertices, 0, &[0u8; 64], TRANSITION).unwrap();
    context.set_vertex_buffers(0, &[(vertices.clone(), 0)], TRANSITION).unwrap();

    assert!(device.barriers().is_empty());
    assert!(vertices.state().get().is_unknown());
}

#[test]
fn test_integration_rejected_commands_record_nothing() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Upload").unwrap();

    let constants = buffer("Constants", 64, BufferBindFlags::UNIFORM, ResourceState::UNDEFINED);
    assert!(matches!(
        context.set_vertex_buffers(0, &[(constants.clone(), 0)], TRANSITION),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        context.update_buffer(&constants, 60, &[0u8; 8], TRANSITION),
        Err(Error::InvalidOperation(_))
    ));

    assert!(device.commands().is_empty());
    assert_eq!(constants.state().get(), ResourceState::UNDEFINED);
}

#[test]
fn test_integration_render_targets_then_clear() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Frame").unwrap();

    let color = texture_2d("Color", ResourceState::SHADER_RESOURCE);
    context.set_render_targets(&[color.clone()], None, TRANSITION).unwrap();
    // Already a render target: no second barrier
    context.clear_render_target(&color, [0.0; 4], TRANSITION).unwrap();

    assert_eq!(device.commands(), vec![
        barrier("Color", ResourceState::SHADER_RESOURCE, ResourceState::RENDER_TARGET),
        "render targets 1 depth none".to_string(),
        "clear Color".to_string(),
    ]);
}

// ============================================================================
// EXPLICIT TRANSITIONS
// ============================================================================

#[test]
fn test_integration_explicit_transitions() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Frame").unwrap();

    let shadow = texture_2d("Shadow", ResourceState::DEPTH_WRITE);
    let lightmap = texture_2d("Lightmap", ResourceState::UNKNOWN);

    context
        .transition_resource_states(&[
            StateTransitionDesc::new(ResourceRef::Texture(shadow.clone()), ResourceState::SHADER_RESOURCE),
            // Unknown state without an old state is skipped
            StateTransitionDesc::new(ResourceRef::Texture(lightmap.clone()), ResourceState::SHADER_RESOURCE),
            StateTransitionDesc::new(ResourceRef::Texture(lightmap.clone()), ResourceState::RENDER_TARGET)
                .with_old_state(ResourceState::UNDEFINED)
                .without_state_update(),
        ])
        .unwrap();

    assert_eq!(device.barriers(), vec![
        barrier("Shadow", ResourceState::DEPTH_WRITE, ResourceState::SHADER_RESOURCE),
        barrier("Lightmap", ResourceState::UNDEFINED, ResourceState::RENDER_TARGET),
    ]);
    assert_eq!(shadow.state().get(), ResourceState::SHADER_RESOURCE);
    assert!(lightmap.state().get().is_unknown());
}

#[test]
fn test_integration_verify_mode_leaves_states_alone() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Frame").unwrap();

    let vertices = buffer("Vertices", 64, BufferBindFlags::VERTEX, ResourceState::COPY_DEST);
    context.set_vertex_buffers(0, &[(vertices.clone(), 0)], TransitionMode::Verify).unwrap();

    assert!(device.barriers().is_empty());
    assert_eq!(vertices.state().get(), ResourceState::COPY_DEST);
    // Validation is compiled out of release builds
    if cfg!(debug_assertions) {
        assert_eq!(context.tracker().verification_failures(), 1);
    }
}

// ============================================================================
// SUBMISSION
// ============================================================================

#[test]
fn test_integration_flush_signals_fence_across_threads() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Upload").unwrap();
    let fence = Arc::new(Fence::new("Upload fence"));

    let waiter = {
        let fence = fence.clone();
        thread::spawn(move || {
            fence.wait(1);
            fence.completed_value()
        })
    };

    let staging = buffer("Staging", 128, BufferBindFlags::empty(), ResourceState::UNDEFINED);
    context.update_buffer(&staging, 0, &[7u8; 128], TRANSITION).unwrap();
    context.enqueue_signal(&fence, 1).unwrap();
    assert_eq!(fence.completed_value(), 0);

    context.flush().unwrap();

    assert_eq!(waiter.join().unwrap(), 1);
    assert_eq!(context.command_count(), 0);
    assert!(context.pipeline().is_none());
}

#[test]
fn test_integration_finish_starts_new_sequence() {
    let device = TestDevice::new();
    let mut context = DeviceContext::new(device.clone(), "Upload").unwrap();

    let staging = buffer("Staging", 128, BufferBindFlags::empty(), ResourceState::UNKNOWN);
    context.update_buffer(&staging, 0, &[0u8; 16], TRANSITION).unwrap();
    context.update_buffer(&staging, 16, &[0u8; 16], TRANSITION).unwrap();
    let first = context.finish().unwrap();

    context.update_buffer(&staging, 32, &[0u8; 16], TRANSITION).unwrap();
    let second = context.finish().unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(device.commands().len(), 3);
}
