/// GpuContext - Vulkan objects shared by every backend object
///
/// The application owns the instance and the logical device: it creates them
/// with the extensions and features it needs and hands them to
/// `VulkanDevice::new`. The context only owns the memory allocator.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::Allocator;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// Shared GPU context, held through `Arc` by buffers, textures, samplers,
/// layouts, pipelines and command sinks.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// Vulkan instance (not destroyed by the backend)
    pub instance: ash::Instance,

    pub physical_device: vk::PhysicalDevice,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so its memory blocks are released explicitly
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Queue used for every submission (external synchronization required)
    pub queue: Mutex<vk::Queue>,

    pub queue_family: u32,

    /// Object naming, present when VK_EXT_debug_utils is enabled on the instance
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,
}

impl GpuContext {
    pub(crate) fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        queue: vk::Queue,
        queue_family: u32,
        debug_utils: Option<ash::ext::debug_utils::Device>,
    ) -> Self {
        Self {
            device,
            instance,
            physical_device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue: Mutex::new(queue),
            queue_family,
            debug_utils,
        }
    }

    /// Attach a debug name to a Vulkan object. No-op without debug utils.
    pub(crate) fn set_object_name<T: Handle>(&self, object: T, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(object)
            .object_name(&name);
        unsafe {
            // Naming is best effort
            debug_utils.set_debug_utils_object_name(&info).ok();
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // Every object holding the context is gone: free the allocator's
        // memory blocks while the device is still alive.
        // The device and instance belong to the application.
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);
        }
    }
}
