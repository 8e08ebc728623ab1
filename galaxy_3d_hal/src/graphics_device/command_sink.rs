/// CommandSink trait - native command recording
///
/// The device context decides *what* to record (state transitions, commits,
/// validation); the sink only translates each command to the backend API.

use std::sync::Arc;
use crate::binding::{ResourceCache, ResourceSignature};
use crate::context::{DrawAttribs, DrawIndexedAttribs, PipelineState};
use crate::error::Result;
use crate::state::ResourceState;
use super::{Buffer, CommandList, Fence, IndexType, ResourceRef, Texture};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierKind {
    /// Usage state change
    Transition,
    /// Execution/memory dependency between two unordered-access uses
    UnorderedAccess,
}

/// Barrier emitted by the state tracker
#[derive(Debug, Clone)]
pub struct StateBarrier {
    pub resource: ResourceRef,
    pub old_state: ResourceState,
    pub new_state: ResourceState,
    pub kind: BarrierKind,
}

/// Committed binding set of one signature
pub struct ResourceBindInfo<'a> {
    pub pipeline: &'a PipelineState,
    pub signature: &'a ResourceSignature,
    pub cache: &'a ResourceCache,
    /// Pipeline-layout index of the signature's first descriptor set
    pub first_set: u32,
}

pub trait CommandSink: Send {
    fn resource_barrier(&mut self, barrier: &StateBarrier) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &PipelineState) -> Result<()>;

    fn bind_resources(&mut self, info: &ResourceBindInfo) -> Result<()>;

    /// Bind vertex buffers starting at `first_slot`, with byte offsets
    fn set_vertex_buffers(&mut self, first_slot: u32, buffers: &[(Arc<dyn Buffer>, u64)]) -> Result<()>;

    fn set_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    /// Attachments of subsequent draws. Empty `color` and no `depth` unbinds them.
    fn set_render_targets(&mut self, color: &[Arc<dyn Texture>], depth: Option<&Arc<dyn Texture>>) -> Result<()>;

    fn clear_render_target(&mut self, texture: &Arc<dyn Texture>, color: [f32; 4]) -> Result<()>;

    fn clear_depth_stencil(&mut self, texture: &Arc<dyn Texture>, depth: f32, stencil: u32) -> Result<()>;

    fn draw(&mut self, attribs: &DrawAttribs) -> Result<()>;

    fn draw_indexed(&mut self, attribs: &DrawIndexedAttribs) -> Result<()>;

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()>;

    fn update_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, data: &[u8]) -> Result<()>;

    fn copy_buffer(
        &mut self,
        src: &Arc<dyn Buffer>,
        src_offset: u64,
        dst: &Arc<dyn Buffer>,
        dst_offset: u64,
        size: u64,
    ) -> Result<()>;

    fn copy_texture(&mut self, src: &Arc<dyn Texture>, dst: &Arc<dyn Texture>) -> Result<()>;

    /// Signal `fence` to `value` once everything recorded before has executed
    fn signal_fence(&mut self, fence: &Arc<Fence>, value: u64) -> Result<()>;

    /// Close the sequence
    fn finish(self: Box<Self>) -> Result<Box<dyn CommandList>>;
}
