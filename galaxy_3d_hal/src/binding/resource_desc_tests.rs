use super::*;

// ============================================================================
// SHADER STAGES
// ============================================================================

#[test]
fn test_stages_iterates_single_bits() {
    let mask = ShaderStages::VERTEX | ShaderStages::COMPUTE;
    let stages: Vec<_> = mask.stages().collect();
    assert_eq!(stages, vec![ShaderStages::VERTEX, ShaderStages::COMPUTE]);
}

#[test]
fn test_stage_index() {
    assert_eq!(ShaderStages::VERTEX.stage_index(), Some(0));
    assert_eq!(ShaderStages::COMPUTE.stage_index(), Some(5));
    assert_eq!((ShaderStages::VERTEX | ShaderStages::PIXEL).stage_index(), None);
    assert_eq!(ShaderStages::empty().stage_index(), None);
}

// ============================================================================
// BINDING RANGES
// ============================================================================

#[test]
fn test_plain_buffers_map_to_buffer_ranges() {
    assert_eq!(
        BindingRange::for_resource(ResourceKind::UniformBuffer, ResourceFlags::empty()),
        Some(BindingRange::UniformBuffer)
    );
    assert_eq!(
        BindingRange::for_resource(ResourceKind::StorageBuffer, ResourceFlags::empty()),
        Some(BindingRange::StorageBuffer)
    );
    assert_eq!(
        BindingRange::for_resource(ResourceKind::StorageBuffer, ResourceFlags::READ_ONLY),
        Some(BindingRange::StorageBuffer)
    );
}

#[test]
fn test_formatted_buffers_map_to_texture_and_image_ranges() {
    assert_eq!(
        BindingRange::for_resource(ResourceKind::UniformBuffer, ResourceFlags::FORMATTED_BUFFER),
        Some(BindingRange::Texture)
    );
    assert_eq!(
        BindingRange::for_resource(ResourceKind::StorageBuffer, ResourceFlags::FORMATTED_BUFFER),
        Some(BindingRange::Image)
    );
}

#[test]
fn test_textures_and_samplers() {
    assert_eq!(
        BindingRange::for_resource(ResourceKind::SampledTexture, ResourceFlags::COMBINED_SAMPLER),
        Some(BindingRange::Texture)
    );
    assert_eq!(
        BindingRange::for_resource(ResourceKind::InputAttachment, ResourceFlags::empty()),
        Some(BindingRange::Texture)
    );
    assert_eq!(
        BindingRange::for_resource(ResourceKind::StorageTexture, ResourceFlags::empty()),
        Some(BindingRange::Image)
    );
    assert_eq!(BindingRange::for_resource(ResourceKind::Sampler, ResourceFlags::empty()), None);
}

// ============================================================================
// DESCRIPTIONS
// ============================================================================

#[test]
fn test_variable_type_order_is_static_first() {
    assert!(VariableType::Static < VariableType::Mutable);
    assert!(VariableType::Mutable < VariableType::Dynamic);
}

#[test]
fn test_signature_desc_builder() {
    let desc = SignatureDesc::new("Sig")
        .with_resource(ResourceDesc::new(
            "g_Constants",
            ShaderStages::VERTEX,
            1,
            ResourceKind::UniformBuffer,
            VariableType::Static,
        ))
        .with_binding_index(2)
        .with_combined_samplers("_s");

    assert_eq!(desc.resources.len(), 1);
    assert_eq!(desc.binding_index, 2);
    assert_eq!(desc.combined_suffix(), Some("_s"));
    assert_eq!(SignatureDesc::new("Other").combined_suffix(), None);
}

#[test]
fn test_name_matches_with_suffix() {
    assert!(name_matches("g_Tex", "g_Tex", None));
    assert!(name_matches("g_Tex_sampler", "g_Tex", Some("_sampler")));
    assert!(!name_matches("g_Tex_sampler", "g_Tex", None));
    assert!(!name_matches("g_Tex2_sampler", "g_Tex", Some("_sampler")));
    assert!(!name_matches("g_Tex", "g_Tex_sampler", Some("_sampler")));
}
