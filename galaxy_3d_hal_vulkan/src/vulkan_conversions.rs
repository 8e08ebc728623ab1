/// Conversions from HAL value types to Vulkan enums and structures
///
/// Pure functions, no device access.

use ash::vk;
use galaxy_3d_hal::galaxy3d::binding::{DeviceLimits, ResourceFlags, ResourceKind, ShaderStages};
use galaxy_3d_hal::galaxy3d::device::{
    AddressMode, BorderColor, BufferBindFlags, CompareFunction, FilterMode, IndexType, SamplerDesc,
    TextureDimension, TextureFormat,
};
use galaxy_3d_hal::galaxy3d::state::ResourceState;

/// Pipeline stages shader accesses are synchronized with when the device
/// enables no geometry or tessellation stage
pub const DEFAULT_SHADER_STAGES: vk::PipelineStageFlags = vk::PipelineStageFlags::from_raw(
    vk::PipelineStageFlags::VERTEX_SHADER.as_raw()
        | vk::PipelineStageFlags::FRAGMENT_SHADER.as_raw()
        | vk::PipelineStageFlags::COMPUTE_SHADER.as_raw(),
);

// ============================================================================
// RESOURCE STATES
// ============================================================================

/// Access, pipeline stages and image layout of a resource state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateAccess {
    pub access: vk::AccessFlags,
    pub stages: vk::PipelineStageFlags,
    pub layout: vk::ImageLayout,
}

/// Access and stages of one state bit, plus its image layout when it applies to images
fn state_bit_access(
    bit: ResourceState,
    shader_stages: vk::PipelineStageFlags,
) -> (vk::AccessFlags, vk::PipelineStageFlags, Option<vk::ImageLayout>) {
    use vk::AccessFlags as A;
    use vk::PipelineStageFlags as S;
    match bit {
        ResourceState::VERTEX_BUFFER => (A::VERTEX_ATTRIBUTE_READ, S::VERTEX_INPUT, None),
        ResourceState::CONSTANT_BUFFER => (A::UNIFORM_READ, shader_stages, None),
        ResourceState::INDEX_BUFFER => (A::INDEX_READ, S::VERTEX_INPUT, None),
        ResourceState::RENDER_TARGET => (
            A::COLOR_ATTACHMENT_READ | A::COLOR_ATTACHMENT_WRITE,
            S::COLOR_ATTACHMENT_OUTPUT,
            Some(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        ),
        ResourceState::UNORDERED_ACCESS => (
            A::SHADER_READ | A::SHADER_WRITE,
            shader_stages,
            Some(vk::ImageLayout::GENERAL),
        ),
        ResourceState::DEPTH_WRITE => (
            A::DEPTH_STENCIL_ATTACHMENT_READ | A::DEPTH_STENCIL_ATTACHMENT_WRITE,
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
            Some(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ),
        ResourceState::DEPTH_READ => (
            A::DEPTH_STENCIL_ATTACHMENT_READ,
            S::EARLY_FRAGMENT_TESTS | S::LATE_FRAGMENT_TESTS,
            Some(vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL),
        ),
        ResourceState::SHADER_RESOURCE => (
            A::SHADER_READ,
            shader_stages,
            Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ),
        ResourceState::INDIRECT_ARGUMENT => (A::INDIRECT_COMMAND_READ, S::DRAW_INDIRECT, None),
        ResourceState::COPY_DEST | ResourceState::RESOLVE_DEST => (
            A::TRANSFER_WRITE,
            S::TRANSFER,
            Some(vk::ImageLayout::TRANSFER_DST_OPTIMAL),
        ),
        ResourceState::COPY_SOURCE | ResourceState::RESOLVE_SOURCE => (
            A::TRANSFER_READ,
            S::TRANSFER,
            Some(vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
        ),
        ResourceState::INPUT_ATTACHMENT => (
            A::INPUT_ATTACHMENT_READ,
            S::FRAGMENT_SHADER,
            Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ),
        ResourceState::PRESENT => (A::empty(), S::BOTTOM_OF_PIPE, Some(vk::ImageLayout::PRESENT_SRC_KHR)),
        ResourceState::BUILD_AS_READ => (
            A::ACCELERATION_STRUCTURE_READ_KHR,
            S::ACCELERATION_STRUCTURE_BUILD_KHR,
            None,
        ),
        ResourceState::BUILD_AS_WRITE => (
            A::ACCELERATION_STRUCTURE_WRITE_KHR,
            S::ACCELERATION_STRUCTURE_BUILD_KHR,
            None,
        ),
        ResourceState::RAY_TRACING => (
            A::ACCELERATION_STRUCTURE_READ_KHR,
            S::RAY_TRACING_SHADER_KHR,
            None,
        ),
        _ => (A::empty(), S::TOP_OF_PIPE, None),
    }
}

/// Vulkan view of a (possibly composite) resource state
///
/// States whose bits need different image layouts fall back to `GENERAL`.
/// `UNDEFINED` and unknown states have no access and the `UNDEFINED` layout.
pub fn state_access(state: ResourceState, shader_stages: vk::PipelineStageFlags) -> StateAccess {
    let mut access = vk::AccessFlags::empty();
    let mut stages = vk::PipelineStageFlags::empty();
    let mut layout: Option<vk::ImageLayout> = None;
    let mut mixed = false;

    for bit in state.iter() {
        let (bit_access, bit_stages, bit_layout) = state_bit_access(bit, shader_stages);
        access |= bit_access;
        stages |= bit_stages;
        if let Some(bit_layout) = bit_layout {
            match layout {
                Some(current) if current != bit_layout => mixed = true,
                _ => layout = Some(bit_layout),
            }
        }
    }

    StateAccess {
        access,
        stages: if stages.is_empty() { vk::PipelineStageFlags::TOP_OF_PIPE } else { stages },
        layout: if mixed {
            vk::ImageLayout::GENERAL
        } else {
            layout.unwrap_or(vk::ImageLayout::UNDEFINED)
        },
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

pub fn descriptor_type(kind: ResourceKind, flags: ResourceFlags) -> vk::DescriptorType {
    let formatted = flags.contains(ResourceFlags::FORMATTED_BUFFER);
    match kind {
        ResourceKind::UniformBuffer if formatted => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        ResourceKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        ResourceKind::StorageBuffer if formatted => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        ResourceKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        ResourceKind::SampledTexture if flags.contains(ResourceFlags::COMBINED_SAMPLER) => {
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        }
        ResourceKind::SampledTexture => vk::DescriptorType::SAMPLED_IMAGE,
        ResourceKind::StorageTexture => vk::DescriptorType::STORAGE_IMAGE,
        ResourceKind::Sampler => vk::DescriptorType::SAMPLER,
        ResourceKind::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
        ResourceKind::AccelerationStructure => vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
    }
}

/// Image layout a descriptor of `kind` is written with
pub fn descriptor_image_layout(kind: ResourceKind) -> vk::ImageLayout {
    match kind {
        ResourceKind::StorageTexture => vk::ImageLayout::GENERAL,
        _ => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

pub fn shader_stage_flags(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    for stage in stages.stages() {
        flags |= match stage {
            ShaderStages::VERTEX => vk::ShaderStageFlags::VERTEX,
            ShaderStages::PIXEL => vk::ShaderStageFlags::FRAGMENT,
            ShaderStages::GEOMETRY => vk::ShaderStageFlags::GEOMETRY,
            ShaderStages::HULL => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStages::DOMAIN => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            ShaderStages::COMPUTE => vk::ShaderStageFlags::COMPUTE,
            _ => vk::ShaderStageFlags::empty(),
        };
    }
    flags
}

// ============================================================================
// BUFFERS AND TEXTURES
// ============================================================================

/// Buffers are always valid copy sources and destinations
pub fn buffer_usage(bind_flags: BufferBindFlags, formatted: bool) -> vk::BufferUsageFlags {
    let mut usage = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if bind_flags.contains(BufferBindFlags::VERTEX) {
        usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if bind_flags.contains(BufferBindFlags::INDEX) {
        usage |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if bind_flags.contains(BufferBindFlags::UNIFORM) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if bind_flags.contains(BufferBindFlags::SHADER_RESOURCE) {
        usage |= if formatted {
            vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER
        } else {
            vk::BufferUsageFlags::STORAGE_BUFFER
        };
    }
    if bind_flags.contains(BufferBindFlags::UNORDERED_ACCESS) {
        usage |= if formatted {
            vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER
        } else {
            vk::BufferUsageFlags::STORAGE_BUFFER
        };
    }
    if bind_flags.contains(BufferBindFlags::INDIRECT) {
        usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    usage
}

pub fn texture_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub fn image_type(dimension: TextureDimension) -> vk::ImageType {
    match dimension {
        TextureDimension::Tex1D | TextureDimension::Tex1DArray => vk::ImageType::TYPE_1D,
        TextureDimension::Tex3D => vk::ImageType::TYPE_3D,
        _ => vk::ImageType::TYPE_2D,
    }
}

pub fn image_view_type(dimension: TextureDimension) -> vk::ImageViewType {
    match dimension {
        TextureDimension::Tex1D => vk::ImageViewType::TYPE_1D,
        TextureDimension::Tex1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureDimension::Tex2D => vk::ImageViewType::TYPE_2D,
        TextureDimension::Tex2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureDimension::Tex3D => vk::ImageViewType::TYPE_3D,
        TextureDimension::Cube => vk::ImageViewType::CUBE,
        TextureDimension::CubeArray => vk::ImageViewType::CUBE_ARRAY,
    }
}

/// Unsupported counts fall back to single sampling
pub fn sample_count(count: u32) -> vk::SampleCountFlags {
    match count {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        32 => vk::SampleCountFlags::TYPE_32,
        64 => vk::SampleCountFlags::TYPE_64,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub fn index_type(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

// ============================================================================
// SAMPLERS
// ============================================================================

pub fn filter(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode(mode: FilterMode) -> vk::SamplerMipmapMode {
    match mode {
        FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn compare_op(function: CompareFunction) -> vk::CompareOp {
    match function {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn border_color(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

/// Sampler create info, anisotropy clamped to `max_supported_anisotropy`
/// (0 when the device feature is not enabled)
pub fn sampler_create_info(desc: &SamplerDesc, max_supported_anisotropy: f32) -> vk::SamplerCreateInfo<'static> {
    let anisotropy = (desc.max_anisotropy as f32).min(max_supported_anisotropy);
    let info = vk::SamplerCreateInfo::default()
        .min_filter(filter(desc.min_filter))
        .mag_filter(filter(desc.mag_filter))
        .mipmap_mode(mipmap_mode(desc.mip_filter))
        .address_mode_u(address_mode(desc.address_u))
        .address_mode_v(address_mode(desc.address_v))
        .address_mode_w(address_mode(desc.address_w))
        .mip_lod_bias(desc.mip_lod_bias)
        .min_lod(desc.min_lod)
        .max_lod(desc.max_lod.min(vk::LOD_CLAMP_NONE))
        .border_color(border_color(desc.border_color))
        .unnormalized_coordinates(false)
        .anisotropy_enable(anisotropy >= 1.0)
        .max_anisotropy(anisotropy.max(1.0));

    match desc.compare {
        Some(function) => info.compare_enable(true).compare_op(compare_op(function)),
        None => info.compare_enable(false).compare_op(vk::CompareOp::ALWAYS),
    }
}

// ============================================================================
// LIMITS
// ============================================================================

/// Acceleration structures per stage and per layout when the device reports none
pub const DEFAULT_ACCEL_STRUCTURE_LIMIT: u32 = 16;

/// HAL limits from the physical device limits
pub fn device_limits(
    limits: &vk::PhysicalDeviceLimits,
    accel_structure_limit: Option<u32>,
    supports_non_uniform_indexing: bool,
) -> DeviceLimits {
    let accel = accel_structure_limit.unwrap_or(DEFAULT_ACCEL_STRUCTURE_LIMIT);
    DeviceLimits {
        per_stage: [
            limits.max_per_stage_descriptor_uniform_buffers,
            limits.max_per_stage_descriptor_storage_buffers,
            limits.max_per_stage_descriptor_sampled_images,
            limits.max_per_stage_descriptor_storage_images,
            limits.max_per_stage_descriptor_samplers,
            limits.max_per_stage_descriptor_input_attachments,
            accel,
        ],
        per_layout: [
            limits.max_descriptor_set_uniform_buffers,
            limits.max_descriptor_set_storage_buffers,
            limits.max_descriptor_set_sampled_images,
            limits.max_descriptor_set_storage_images,
            limits.max_descriptor_set_samplers,
            limits.max_descriptor_set_input_attachments,
            accel,
        ],
        max_per_stage_resources: limits.max_per_stage_resources,
        max_descriptor_sets: limits.max_bound_descriptor_sets,
        supports_non_uniform_indexing,
    }
}

#[cfg(test)]
#[path = "vulkan_conversions_tests.rs"]
mod tests;
