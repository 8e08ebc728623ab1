//! Unit tests for the Vulkan conversion functions
//!
//! Pure mappings, no GPU required.

use super::*;
use galaxy_3d_hal::galaxy3d::device::SamplerType;

fn access(state: ResourceState) -> StateAccess {
    state_access(state, DEFAULT_SHADER_STAGES)
}

// ============================================================================
// RESOURCE STATE TESTS
// ============================================================================

#[test]
fn test_undefined_state_has_no_access() {
    let undefined = access(ResourceState::UNDEFINED);
    assert_eq!(undefined.access, vk::AccessFlags::empty());
    assert_eq!(undefined.stages, vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(undefined.layout, vk::ImageLayout::UNDEFINED);

    assert_eq!(access(ResourceState::UNKNOWN), undefined);
}

#[test]
fn test_attachment_states() {
    let color = access(ResourceState::RENDER_TARGET);
    assert_eq!(color.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(color.stages, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    assert!(color.access.contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE));

    let depth = access(ResourceState::DEPTH_WRITE);
    assert_eq!(depth.layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    assert!(depth.stages.contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));

    let depth_read = access(ResourceState::DEPTH_READ);
    assert_eq!(depth_read.layout, vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL);
    assert!(!depth_read.access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
}

#[test]
fn test_shader_states_use_given_stages() {
    let stages = vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::GEOMETRY_SHADER;
    let srv = state_access(ResourceState::SHADER_RESOURCE, stages);
    assert_eq!(srv.stages, stages);
    assert_eq!(srv.access, vk::AccessFlags::SHADER_READ);
    assert_eq!(srv.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

    let uav = access(ResourceState::UNORDERED_ACCESS);
    assert_eq!(uav.layout, vk::ImageLayout::GENERAL);
    assert_eq!(uav.access, vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE);
}

#[test]
fn test_copy_and_resolve_states() {
    assert_eq!(access(ResourceState::COPY_DEST).layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(access(ResourceState::RESOLVE_DEST).layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(access(ResourceState::COPY_SOURCE).layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(access(ResourceState::COPY_SOURCE).access, vk::AccessFlags::TRANSFER_READ);
    assert_eq!(access(ResourceState::COPY_DEST).stages, vk::PipelineStageFlags::TRANSFER);
}

#[test]
fn test_buffer_states_keep_undefined_layout() {
    let vertex = access(ResourceState::VERTEX_BUFFER);
    assert_eq!(vertex.access, vk::AccessFlags::VERTEX_ATTRIBUTE_READ);
    assert_eq!(vertex.stages, vk::PipelineStageFlags::VERTEX_INPUT);
    assert_eq!(vertex.layout, vk::ImageLayout::UNDEFINED);

    assert_eq!(access(ResourceState::INDIRECT_ARGUMENT).stages, vk::PipelineStageFlags::DRAW_INDIRECT);
    assert_eq!(access(ResourceState::CONSTANT_BUFFER).access, vk::AccessFlags::UNIFORM_READ);
}

#[test]
fn test_composite_states() {
    // One image layout among buffer-only bits
    let read = access(ResourceState::VERTEX_BUFFER | ResourceState::SHADER_RESOURCE);
    assert_eq!(read.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert!(read.access.contains(vk::AccessFlags::VERTEX_ATTRIBUTE_READ | vk::AccessFlags::SHADER_READ));
    assert!(read.stages.contains(vk::PipelineStageFlags::VERTEX_INPUT));

    // Conflicting image layouts
    let generic = access(ResourceState::GENERIC_READ);
    assert_eq!(generic.layout, vk::ImageLayout::GENERAL);
    assert!(generic.access.contains(vk::AccessFlags::TRANSFER_READ));
}

#[test]
fn test_present_state() {
    let present = access(ResourceState::PRESENT);
    assert_eq!(present.layout, vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(present.stages, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
}

// ============================================================================
// DESCRIPTOR TESTS
// ============================================================================

#[test]
fn test_descriptor_types() {
    let none = ResourceFlags::empty();
    assert_eq!(descriptor_type(ResourceKind::UniformBuffer, none), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        descriptor_type(ResourceKind::UniformBuffer, ResourceFlags::FORMATTED_BUFFER),
        vk::DescriptorType::UNIFORM_TEXEL_BUFFER
    );
    assert_eq!(descriptor_type(ResourceKind::StorageBuffer, none), vk::DescriptorType::STORAGE_BUFFER);
    assert_eq!(
        descriptor_type(ResourceKind::StorageBuffer, ResourceFlags::READ_ONLY),
        vk::DescriptorType::STORAGE_BUFFER
    );
    assert_eq!(
        descriptor_type(ResourceKind::StorageBuffer, ResourceFlags::FORMATTED_BUFFER),
        vk::DescriptorType::STORAGE_TEXEL_BUFFER
    );
    assert_eq!(descriptor_type(ResourceKind::SampledTexture, none), vk::DescriptorType::SAMPLED_IMAGE);
    assert_eq!(
        descriptor_type(ResourceKind::SampledTexture, ResourceFlags::COMBINED_SAMPLER),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
    assert_eq!(descriptor_type(ResourceKind::StorageTexture, none), vk::DescriptorType::STORAGE_IMAGE);
    assert_eq!(descriptor_type(ResourceKind::Sampler, none), vk::DescriptorType::SAMPLER);
    assert_eq!(descriptor_type(ResourceKind::InputAttachment, none), vk::DescriptorType::INPUT_ATTACHMENT);
    assert_eq!(
        descriptor_type(ResourceKind::AccelerationStructure, none),
        vk::DescriptorType::ACCELERATION_STRUCTURE_KHR
    );
}

#[test]
fn test_descriptor_image_layouts() {
    assert_eq!(descriptor_image_layout(ResourceKind::StorageTexture), vk::ImageLayout::GENERAL);
    assert_eq!(
        descriptor_image_layout(ResourceKind::SampledTexture),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
}

#[test]
fn test_shader_stage_flags() {
    assert_eq!(shader_stage_flags(ShaderStages::PIXEL), vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(
        shader_stage_flags(ShaderStages::VERTEX | ShaderStages::PIXEL),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(
        shader_stage_flags(ShaderStages::HULL | ShaderStages::DOMAIN),
        vk::ShaderStageFlags::TESSELLATION_CONTROL | vk::ShaderStageFlags::TESSELLATION_EVALUATION
    );
    assert_eq!(shader_stage_flags(ShaderStages::ALL_GRAPHICS), vk::ShaderStageFlags::ALL_GRAPHICS);
    assert_eq!(shader_stage_flags(ShaderStages::empty()), vk::ShaderStageFlags::empty());
}

// ============================================================================
// BUFFER AND TEXTURE TESTS
// ============================================================================

#[test]
fn test_buffer_usage() {
    let vertex = buffer_usage(BufferBindFlags::VERTEX, false);
    assert!(vertex.contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST));
    assert!(!vertex.contains(vk::BufferUsageFlags::INDEX_BUFFER));

    let structured = buffer_usage(BufferBindFlags::SHADER_RESOURCE | BufferBindFlags::UNORDERED_ACCESS, false);
    assert!(structured.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    assert!(!structured.contains(vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER));

    let formatted = buffer_usage(BufferBindFlags::SHADER_RESOURCE | BufferBindFlags::UNORDERED_ACCESS, true);
    assert!(formatted.contains(vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER | vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER));

    assert!(buffer_usage(BufferBindFlags::INDIRECT, false).contains(vk::BufferUsageFlags::INDIRECT_BUFFER));
}

#[test]
fn test_texture_formats() {
    assert_eq!(texture_format(TextureFormat::R8G8B8A8_SRGB), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(texture_format(TextureFormat::B8G8R8A8_UNORM), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(texture_format(TextureFormat::R16G16B16A16_SFLOAT), vk::Format::R16G16B16A16_SFLOAT);
    assert_eq!(texture_format(TextureFormat::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(texture_format(TextureFormat::D24_UNORM_S8_UINT), vk::Format::D24_UNORM_S8_UINT);
}

#[test]
fn test_aspect_masks() {
    assert_eq!(aspect_mask(TextureFormat::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(TextureFormat::D16_UNORM), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(TextureFormat::D24_UNORM_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
}

#[test]
fn test_texture_dimensions() {
    assert_eq!(image_type(TextureDimension::Tex1DArray), vk::ImageType::TYPE_1D);
    assert_eq!(image_type(TextureDimension::Cube), vk::ImageType::TYPE_2D);
    assert_eq!(image_type(TextureDimension::Tex3D), vk::ImageType::TYPE_3D);

    assert_eq!(image_view_type(TextureDimension::Tex2DArray), vk::ImageViewType::TYPE_2D_ARRAY);
    assert_eq!(image_view_type(TextureDimension::Cube), vk::ImageViewType::CUBE);
    assert_eq!(image_view_type(TextureDimension::CubeArray), vk::ImageViewType::CUBE_ARRAY);
}

#[test]
fn test_sample_counts() {
    assert_eq!(sample_count(1), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count(4), vk::SampleCountFlags::TYPE_4);
    assert_eq!(sample_count(3), vk::SampleCountFlags::TYPE_1);
}

#[test]
fn test_index_types() {
    assert_eq!(index_type(IndexType::U16), vk::IndexType::UINT16);
    assert_eq!(index_type(IndexType::U32), vk::IndexType::UINT32);
}

// ============================================================================
// SAMPLER TESTS
// ============================================================================

#[test]
fn test_sampler_create_info_linear_clamp() {
    let info = sampler_create_info(&SamplerDesc::from(SamplerType::LinearClamp), 16.0);
    assert_eq!(info.min_filter, vk::Filter::LINEAR);
    assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
    assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    assert_eq!(info.anisotropy_enable, vk::FALSE);
    assert_eq!(info.compare_enable, vk::FALSE);
    assert_eq!(info.max_lod, vk::LOD_CLAMP_NONE);
}

#[test]
fn test_sampler_create_info_shadow() {
    let info = sampler_create_info(&SamplerDesc::from(SamplerType::Shadow), 16.0);
    assert_eq!(info.compare_enable, vk::TRUE);
    assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(info.border_color, vk::BorderColor::FLOAT_OPAQUE_WHITE);
    assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::NEAREST);
}

#[test]
fn test_sampler_anisotropy_is_clamped() {
    let desc = SamplerDesc::from(SamplerType::Anisotropic);
    let info = sampler_create_info(&desc, 8.0);
    assert_eq!(info.anisotropy_enable, vk::TRUE);
    assert_eq!(info.max_anisotropy, 8.0);

    // Feature disabled on the device
    let info = sampler_create_info(&desc, 0.0);
    assert_eq!(info.anisotropy_enable, vk::FALSE);
    assert_eq!(info.max_anisotropy, 1.0);
}

// ============================================================================
// LIMIT TESTS
// ============================================================================

#[test]
fn test_device_limits_from_physical_limits() {
    let physical = vk::PhysicalDeviceLimits {
        max_per_stage_descriptor_uniform_buffers: 15,
        max_per_stage_descriptor_storage_buffers: 30,
        max_per_stage_descriptor_sampled_images: 200,
        max_per_stage_descriptor_storage_images: 8,
        max_per_stage_descriptor_samplers: 64,
        max_per_stage_descriptor_input_attachments: 8,
        max_descriptor_set_uniform_buffers: 90,
        max_descriptor_set_storage_buffers: 180,
        max_descriptor_set_sampled_images: 1200,
        max_descriptor_set_storage_images: 48,
        max_descriptor_set_samplers: 384,
        max_descriptor_set_input_attachments: 8,
        max_per_stage_resources: 512,
        max_bound_descriptor_sets: 8,
        ..Default::default()
    };

    let limits = device_limits(&physical, None, true);
    assert_eq!(limits.per_stage, [15, 30, 200, 8, 64, 8, DEFAULT_ACCEL_STRUCTURE_LIMIT]);
    assert_eq!(limits.per_layout, [90, 180, 1200, 48, 384, 8, DEFAULT_ACCEL_STRUCTURE_LIMIT]);
    assert_eq!(limits.max_per_stage_resources, 512);
    assert_eq!(limits.max_descriptor_sets, 8);
    assert!(limits.supports_non_uniform_indexing);

    assert_eq!(device_limits(&physical, Some(4), false).per_stage[6], 4);
}
