/// Descriptor set layouts and pipeline layouts
///
/// A signature owns one VkDescriptorSetLayout per descriptor set it uses.
/// A pipeline layout concatenates the set layouts of its signatures in
/// binding-index order, so signature `i` starts at the set index the HAL
/// pipeline layout reports for it.

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_hal::galaxy3d::binding::ResourceFlags;
use galaxy_3d_hal::galaxy3d::device::{
    LayoutBinding, NativePipelineLayout, NativeSignatureLayout, PipelineLayoutInfo, Sampler as HalSampler,
    SignatureLayoutInfo,
};
use galaxy_3d_hal::galaxy3d::Result;
use galaxy_3d_hal::{engine_bail, engine_err};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_conversions::{descriptor_type, shader_stage_flags};

// ============================================================================
// SIGNATURE LAYOUT
// ============================================================================

/// Descriptor set layouts of one signature
pub struct SignatureLayout {
    ctx: Arc<GpuContext>,
    pub(crate) set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Descriptors per type of each set, for dedicated pools
    pub(crate) set_sizes: Vec<Vec<vk::DescriptorPoolSize>>,
    /// Samplers baked into the layouts
    _immutable_samplers: Vec<Arc<dyn HalSampler>>,
}

impl SignatureLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, info: &SignatureLayoutInfo) -> Result<Self> {
        let mut layout = Self {
            ctx,
            set_layouts: Vec::with_capacity(info.sets.len()),
            set_sizes: Vec::with_capacity(info.sets.len()),
            _immutable_samplers: Vec::new(),
        };

        for (set_index, bindings) in info.sets.iter().enumerate() {
            let set_layout = layout.create_set_layout(info.name, set_index, bindings)?;
            layout.set_layouts.push(set_layout);
            layout.set_sizes.push(pool_sizes(bindings));
            for binding in bindings {
                layout._immutable_samplers.extend(binding.immutable_samplers.iter().cloned());
            }
        }
        Ok(layout)
    }

    fn create_set_layout(&self, name: &str, set_index: usize, bindings: &[LayoutBinding]) -> Result<vk::DescriptorSetLayout> {
        // One handle per array element; must outlive the create call
        let sampler_handles: Vec<Vec<vk::Sampler>> = bindings
            .iter()
            .map(|binding| match binding.immutable_samplers.first() {
                Some(sampler) => {
                    let handle = vk::Sampler::from_raw(sampler.native_handle());
                    vec![handle; binding.array_size as usize]
                }
                None => Vec::new(),
            })
            .collect();

        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .zip(&sampler_handles)
            .map(|(binding, samplers)| {
                let vk_binding = vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type(binding.kind, binding.flags))
                    .descriptor_count(binding.array_size)
                    .stage_flags(shader_stage_flags(binding.stages));
                if samplers.is_empty() {
                    vk_binding
                } else {
                    vk_binding.immutable_samplers(samplers)
                }
            })
            .collect();

        // Runtime-sized arrays may be partially populated
        let binding_flags: Vec<vk::DescriptorBindingFlags> = bindings
            .iter()
            .map(|binding| {
                if binding.flags.contains(ResourceFlags::RUNTIME_ARRAY) {
                    vk::DescriptorBindingFlags::PARTIALLY_BOUND
                } else {
                    vk::DescriptorBindingFlags::empty()
                }
            })
            .collect();
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        if binding_flags.iter().any(|flags| !flags.is_empty()) {
            create_info = create_info.push_next(&mut flags_info);
        }

        let set_layout = unsafe {
            self.ctx.device.create_descriptor_set_layout(&create_info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan",
                    "Failed to create descriptor set layout {} of signature '{}': {:?}", set_index, name, e))?
        };
        self.ctx.set_object_name(set_layout, &format!("{} set {}", name, set_index));
        Ok(set_layout)
    }
}

/// Descriptor counts per type of one set
fn pool_sizes(bindings: &[LayoutBinding]) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let ty = descriptor_type(binding.kind, binding.flags);
        match sizes.iter_mut().find(|size| size.ty == ty) {
            Some(size) => size.descriptor_count += binding.array_size,
            None => sizes.push(vk::DescriptorPoolSize { ty, descriptor_count: binding.array_size }),
        }
    }
    sizes
}

impl NativeSignatureLayout for SignatureLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for SignatureLayout {
    fn drop(&mut self) {
        unsafe {
            for &set_layout in &self.set_layouts {
                self.ctx.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }
    }
}

// ============================================================================
// PIPELINE LAYOUT
// ============================================================================

/// VkPipelineLayout of a pipeline
pub struct PipelineLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    /// Set layouts in pipeline order (owned by the signatures)
    pub(crate) set_layouts: Vec<vk::DescriptorSetLayout>,
    pub(crate) set_sizes: Vec<Vec<vk::DescriptorPoolSize>>,
}

impl PipelineLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, info: &PipelineLayoutInfo) -> Result<Self> {
        let mut set_layouts = Vec::new();
        let mut set_sizes = Vec::new();
        for signature in info.signatures {
            let Some(native) = signature.native().as_any().downcast_ref::<SignatureLayout>() else {
                engine_bail!("galaxy3d::vulkan",
                    "Pipeline layout '{}': signature '{}' was not created by the Vulkan device",
                    info.name, signature.name());
            };
            set_layouts.extend_from_slice(&native.set_layouts);
            set_sizes.extend(native.set_sizes.iter().cloned());
        }

        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = unsafe {
            ctx.device.create_pipeline_layout(&create_info, None)
                .map_err(|e| engine_err!("galaxy3d::vulkan",
                    "Failed to create pipeline layout '{}': {:?}", info.name, e))?
        };
        ctx.set_object_name(layout, info.name);

        Ok(Self {
            ctx,
            layout,
            set_layouts,
            set_sizes,
        })
    }
}

impl NativePipelineLayout for PipelineLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
