/// Texture - Vulkan implementation of the Texture trait

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_hal::galaxy3d::device::{Texture as HalTexture, TextureDesc, TextureDimension};
use galaxy_3d_hal::galaxy3d::state::StateCell;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan texture implementation
pub struct Texture {
    ctx: Arc<GpuContext>,
    desc: TextureDesc,
    state: StateCell,
    pub(crate) image: vk::Image,
    /// View over every mip level and layer
    pub(crate) view: vk::ImageView,
    pub(crate) allocation: Option<Allocation>,
}

impl Texture {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        desc: TextureDesc,
        state: StateCell,
        image: vk::Image,
        view: vk::ImageView,
        allocation: Allocation,
    ) -> Self {
        Self {
            ctx,
            desc,
            state,
            image,
            view,
            allocation: Some(allocation),
        }
    }
}

/// 3D textures have one layer; `depth_or_layers` is their depth
pub(crate) fn layer_count(desc: &TextureDesc) -> u32 {
    match desc.dimension {
        TextureDimension::Tex3D => 1,
        _ => desc.depth_or_layers.max(1),
    }
}

impl HalTexture for Texture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn state(&self) -> &StateCell {
        &self.state
    }

    fn native_handle(&self) -> u64 {
        self.image.as_raw()
    }

    fn native_view(&self) -> u64 {
        self.view.as_raw()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
