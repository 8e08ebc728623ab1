/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// The device wraps an application-created `ash::Device`. It requires Vulkan
/// 1.3 (dynamic rendering) and, for runtime-sized descriptor arrays, the
/// descriptor indexing features the application enabled.

use ash::vk;
use galaxy_3d_hal::galaxy3d::binding::DeviceLimits;
use galaxy_3d_hal::galaxy3d::device::{
    Buffer as HalBuffer, BufferDesc, CommandList as HalCommandList, CommandSink as HalCommandSink, GraphicsDevice,
    NativePipeline, NativePipelineInfo, NativePipelineLayout, NativeSignatureLayout, PipelineLayoutInfo,
    Sampler as HalSampler, SamplerDesc, SignatureLayoutInfo, Texture as HalTexture, TextureDesc, TextureDimension,
    TextureFormat,
};
use galaxy_3d_hal::galaxy3d::state::{ResourceState, StateCell};
use galaxy_3d_hal::galaxy3d::{Config, Error, Result};
use galaxy_3d_hal::{engine_bail, engine_err, engine_error, engine_info};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::{CommandList, CommandSink};
use crate::vulkan_context::GpuContext;
use crate::vulkan_conversions::{
    aspect_mask, buffer_usage, device_limits, image_type, image_view_type, sample_count, texture_format,
    DEFAULT_SHADER_STAGES,
};
use crate::vulkan_layout::{PipelineLayout, SignatureLayout};
use crate::vulkan_pipeline::{create_pipeline, GraphicsPipelineFactory};
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_texture::{layer_count, Texture};

/// Everything `VulkanDevice::new` takes over from the application
pub struct VulkanDeviceDesc {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    /// Logical device created with Vulkan 1.3 and `dynamicRendering` enabled
    pub device: ash::Device,
    /// Queue used for every submission; must support graphics and compute
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub config: Config,
    /// Pipeline stages shader reads and writes synchronize with.
    /// Add tessellation, geometry or ray tracing stages when they are enabled.
    pub shader_stages: vk::PipelineStageFlags,
    /// `samplerAnisotropy` is enabled on the device
    pub sampler_anisotropy: bool,
    /// `shaderSampledImageArrayNonUniformIndexing` and related features are enabled
    pub non_uniform_indexing: bool,
    /// Acceleration structure descriptor limit, when the extension is enabled
    pub accel_structure_limit: Option<u32>,
    /// VK_EXT_debug_utils is enabled on the instance (object names)
    pub debug_utils: bool,
}

impl VulkanDeviceDesc {
    pub fn new(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queue: vk::Queue,
        queue_family: u32,
    ) -> Self {
        Self {
            instance,
            physical_device,
            device,
            queue,
            queue_family,
            config: Config::default(),
            shader_stages: DEFAULT_SHADER_STAGES,
            sampler_anisotropy: false,
            non_uniform_indexing: false,
            accel_structure_limit: None,
            debug_utils: false,
        }
    }
}

/// Vulkan graphics device
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    config: Config,
    limits: DeviceLimits,
    shader_stages: vk::PipelineStageFlags,
    samplers: SamplerCache,
    graphics_pipeline_factory: RwLock<Option<Arc<dyn GraphicsPipelineFactory>>>,
    sink_counter: AtomicU64,
}

impl VulkanDevice {
    pub fn new(desc: VulkanDeviceDesc) -> Result<Self> {
        let properties = unsafe { desc.instance.get_physical_device_properties(desc.physical_device) };
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: desc.instance.clone(),
            device: desc.device.clone(),
            physical_device: desc.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            let message = format!("Failed to create GPU allocator: {:?}", e);
            engine_error!("galaxy3d::vulkan", "{}", message);
            Error::InitializationFailed(message)
        })?;

        let debug_utils = desc
            .debug_utils
            .then(|| ash::ext::debug_utils::Device::new(&desc.instance, &desc.device));

        let ctx = Arc::new(GpuContext::new(
            desc.instance,
            desc.physical_device,
            desc.device,
            allocator,
            desc.queue,
            desc.queue_family,
            debug_utils,
        ));

        let limits = device_limits(&properties.limits, desc.accel_structure_limit, desc.non_uniform_indexing);
        let max_anisotropy = if desc.sampler_anisotropy { properties.limits.max_sampler_anisotropy } else { 0.0 };

        engine_info!("galaxy3d::vulkan", "Vulkan device '{}' ready for '{}' ({} descriptor sets, validation {})",
            device_name, desc.config.app_name, limits.max_descriptor_sets,
            if desc.config.validation_enabled() { "on" } else { "off" });

        Ok(Self {
            samplers: SamplerCache::new(Arc::clone(&ctx), max_anisotropy),
            ctx,
            config: desc.config,
            limits,
            shader_stages: desc.shader_stages,
            graphics_pipeline_factory: RwLock::new(None),
            sink_counter: AtomicU64::new(0),
        })
    }

    /// Shared Vulkan objects
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Builder of graphics pipelines (fixed-function state is application defined)
    pub fn set_graphics_pipeline_factory(&self, factory: Arc<dyn GraphicsPipelineFactory>) {
        if let Ok(mut slot) = self.graphics_pipeline_factory.write() {
            *slot = Some(factory);
        }
    }

    /// Live cached samplers
    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx.device.device_wait_idle()
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to wait for device idle: {:?}", e))
        }
    }

    fn allocate(&self, name: &str, requirements: vk::MemoryRequirements, linear: bool) -> Result<Allocation> {
        let mut allocator = self.ctx.allocator.lock()
            .map_err(|_| engine_err!("galaxy3d::vulkan", "GPU allocator lock poisoned"))?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to allocate memory for '{}': {:?}", name, e);
                Error::OutOfMemory
            })
    }

    fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.ctx.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Create a device-local buffer. A `format` makes it a formatted buffer
    /// with a typed view, bindable as a texel buffer.
    pub fn create_buffer(
        &self,
        desc: BufferDesc,
        format: Option<TextureFormat>,
        initial_state: ResourceState,
    ) -> Result<Arc<dyn HalBuffer>> {
        if desc.size == 0 {
            engine_bail!("galaxy3d::vulkan", "Buffer '{}' has size 0", desc.name);
        }

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage(desc.bind_flags, format.is_some()))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = self.ctx.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to create buffer '{}': {:?}", desc.name, e))?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate(&desc.name, requirements, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            let bound = self.ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset());
            let view = bound.and_then(|()| match format {
                Some(format) => {
                    let view_info = vk::BufferViewCreateInfo::default()
                        .buffer(buffer)
                        .format(texture_format(format))
                        .offset(0)
                        .range(vk::WHOLE_SIZE);
                    self.ctx.device.create_buffer_view(&view_info, None)
                }
                None => Ok(vk::BufferView::null()),
            });
            let view = match view {
                Ok(view) => view,
                Err(e) => {
                    self.free(allocation);
                    self.ctx.device.destroy_buffer(buffer, None);
                    engine_bail!("galaxy3d::vulkan", "Failed to set up buffer '{}': {:?}", desc.name, e);
                }
            };

            self.ctx.set_object_name(buffer, &desc.name);
            Ok(Arc::new(Buffer::new(Arc::clone(&self.ctx), desc, StateCell::new(initial_state), buffer, view, allocation)))
        }
    }

    /// Create a device-local texture with a view over all its mips and layers.
    /// `storage` allows binding it as a storage image.
    pub fn create_texture(&self, desc: TextureDesc, storage: bool, initial_state: ResourceState) -> Result<Arc<dyn HalTexture>> {
        if desc.width == 0 || desc.height == 0 {
            engine_bail!("galaxy3d::vulkan", "Texture '{}' has a zero extent", desc.name);
        }

        let is_cube = matches!(desc.dimension, TextureDimension::Cube | TextureDimension::CubeArray);
        if is_cube && desc.depth_or_layers % 6 != 0 {
            engine_bail!("galaxy3d::vulkan",
                "Cube texture '{}' has {} layers, expected a multiple of 6", desc.name, desc.depth_or_layers);
        }

        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        usage |= if desc.format.is_depth() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT
        };
        if storage {
            usage |= vk::ImageUsageFlags::STORAGE;
        }

        let format = texture_format(desc.format);
        let depth = if desc.dimension == TextureDimension::Tex3D { desc.depth_or_layers.max(1) } else { 1 };
        let layers = layer_count(&desc);

        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .flags(if is_cube { vk::ImageCreateFlags::CUBE_COMPATIBLE } else { vk::ImageCreateFlags::empty() })
                .image_type(image_type(desc.dimension))
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth,
                })
                .mip_levels(desc.mip_levels.max(1))
                .array_layers(layers)
                .samples(sample_count(desc.sample_count))
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            let image = self.ctx.device.create_image(&create_info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to create image '{}': {:?}", desc.name, e))?;

            let requirements = self.ctx.device.get_image_memory_requirements(image);
            let allocation = match self.allocate(&desc.name, requirements, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let view = self.ctx.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .and_then(|()| {
                    let view_info = vk::ImageViewCreateInfo::default()
                        .image(image)
                        .view_type(image_view_type(desc.dimension))
                        .format(format)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: aspect_mask(desc.format),
                            base_mip_level: 0,
                            level_count: vk::REMAINING_MIP_LEVELS,
                            base_array_layer: 0,
                            layer_count: vk::REMAINING_ARRAY_LAYERS,
                        });
                    self.ctx.device.create_image_view(&view_info, None)
                });
            let view = match view {
                Ok(view) => view,
                Err(e) => {
                    self.free(allocation);
                    self.ctx.device.destroy_image(image, None);
                    engine_bail!("galaxy3d::vulkan", "Failed to set up image '{}': {:?}", desc.name, e);
                }
            };

            self.ctx.set_object_name(image, &desc.name);
            Ok(Arc::new(Texture::new(Arc::clone(&self.ctx), desc, StateCell::new(initial_state), image, view, allocation)))
        }
    }
}

impl GraphicsDevice for VulkanDevice {
    fn config(&self) -> &Config {
        &self.config
    }

    fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn HalSampler>> {
        let sampler: Arc<dyn HalSampler> = self.samplers.get(desc)?;
        Ok(sampler)
    }

    fn create_signature_layout(&self, info: &SignatureLayoutInfo) -> Result<Box<dyn NativeSignatureLayout>> {
        Ok(Box::new(SignatureLayout::new(Arc::clone(&self.ctx), info)?))
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutInfo) -> Result<Box<dyn NativePipelineLayout>> {
        Ok(Box::new(PipelineLayout::new(Arc::clone(&self.ctx), info)?))
    }

    fn create_pipeline(&self, info: &NativePipelineInfo) -> Result<Box<dyn NativePipeline>> {
        let factory = self.graphics_pipeline_factory.read()
            .map_err(|_| engine_err!("galaxy3d::vulkan", "Pipeline factory lock poisoned"))?
            .clone();
        Ok(Box::new(create_pipeline(&self.ctx, info, factory.as_deref())?))
    }

    fn create_command_sink(&self) -> Result<Box<dyn HalCommandSink>> {
        let index = self.sink_counter.fetch_add(1, Ordering::Relaxed);
        let name = format!("{} commands {}", self.config.app_name, index);
        Ok(Box::new(CommandSink::new(Arc::clone(&self.ctx), self.shader_stages, &name)?))
    }

    fn submit(&self, lists: Vec<Box<dyn HalCommandList>>) -> Result<()> {
        let mut native_lists = Vec::with_capacity(lists.len());
        for list in lists {
            match list.into_any().downcast::<CommandList>() {
                Ok(list) => native_lists.push(list),
                Err(_) => engine_bail!("galaxy3d::vulkan", "Command list was not recorded by the Vulkan device"),
            }
        }
        if native_lists.is_empty() {
            return Ok(());
        }

        let command_buffers: Vec<vk::CommandBuffer> = native_lists.iter().map(|list| list.command_buffer()).collect();
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        unsafe {
            let fence = self.ctx.device.create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to create fence: {:?}", e))?;

            let submitted = match self.ctx.queue.lock() {
                Ok(queue) => self.ctx.device.queue_submit(*queue, &[submit_info], fence),
                Err(_) => {
                    self.ctx.device.destroy_fence(fence, None);
                    engine_bail!("galaxy3d::vulkan", "Queue lock poisoned");
                }
            };
            let completed = submitted.and_then(|()| self.ctx.device.wait_for_fences(&[fence], true, u64::MAX));
            self.ctx.device.destroy_fence(fence, None);
            completed.map_err(|e| engine_err!("galaxy3d::vulkan", "Failed to execute command lists: {:?}", e))?;
        }

        // Execution is complete: signal HAL fences, then release everything the lists hold
        for list in &native_lists {
            for (fence, value) in &list.fences {
                fence.signal(*value);
            }
        }
        Ok(())
    }
}
