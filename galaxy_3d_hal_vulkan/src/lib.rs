/*!
# Galaxy 3D HAL - Vulkan Backend

Vulkan implementation of the `galaxy_3d_hal` device traits, built on ash for
the Vulkan bindings and gpu-allocator for memory management.

The application creates the instance and the logical device (Vulkan 1.3 with
dynamic rendering) and hands them to [`VulkanDevice::new`]:

```no_run
use galaxy_3d_hal_vulkan::{VulkanDevice, VulkanDeviceDesc};
# fn setup(instance: ash::Instance, physical_device: ash::vk::PhysicalDevice,
#          device: ash::Device, queue: ash::vk::Queue, queue_family: u32)
#          -> galaxy_3d_hal::galaxy3d::Result<()> {
let device = VulkanDevice::new(VulkanDeviceDesc::new(instance, physical_device, device, queue, queue_family))?;
# Ok(())
# }
```

Signatures become descriptor set layouts, pipeline layouts concatenate them,
and every resource commit writes fresh descriptor sets from pools owned by
the command list being recorded.
*/

mod vulkan_context;
mod vulkan_conversions;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_layout;
mod vulkan_pipeline;
mod vulkan_descriptor_set;
mod vulkan_command_list;
mod vulkan_device;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_context::GpuContext;
pub use vulkan_device::{VulkanDevice, VulkanDeviceDesc};
pub use vulkan_pipeline::{GraphicsPipelineFactory, GraphicsPipelineRequest};
pub use vulkan_buffer::Buffer;
pub use vulkan_texture::Texture;
pub use vulkan_sampler::Sampler;
pub use vulkan_command_list::{CommandList, CommandSink};
pub use vulkan_conversions::{state_access, StateAccess, DEFAULT_SHADER_STAGES};

#[cfg(feature = "vulkan-validation")]
pub use debug::{
    create_debug_messenger, destroy_debug_messenger, get_validation_stats, print_validation_stats_report,
    reset_validation_stats, ValidationStats,
};
