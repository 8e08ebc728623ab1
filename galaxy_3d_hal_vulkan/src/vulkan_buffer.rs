/// Buffer - Vulkan implementation of the Buffer trait

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_hal::galaxy3d::device::{Buffer as HalBuffer, BufferDesc};
use galaxy_3d_hal::galaxy3d::state::StateCell;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue)
    ctx: Arc<GpuContext>,
    desc: BufferDesc,
    state: StateCell,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// Typed view, for buffers created with a texel format
    pub(crate) view: vk::BufferView,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
}

impl Buffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        desc: BufferDesc,
        state: StateCell,
        buffer: vk::Buffer,
        view: vk::BufferView,
        allocation: Allocation,
    ) -> Self {
        Self {
            ctx,
            desc,
            state,
            buffer,
            view,
            allocation: Some(allocation),
        }
    }
}

impl HalBuffer for Buffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn native_handle(&self) -> u64 {
        self.buffer.as_raw()
    }

    fn native_view(&self) -> u64 {
        self.view.as_raw()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::BufferView::null() {
                self.ctx.device.destroy_buffer_view(self.view, None);
            }

            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
