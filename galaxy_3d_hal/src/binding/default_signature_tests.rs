use super::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::SamplerDesc;

fn shader(name: &str, stage: ShaderStages, resources: Vec<ShaderResourceAttribs>) -> ShaderResources {
    ShaderResources::new(name, stage, resources)
}

fn texture(name: &str, array_size: u32) -> ShaderResourceAttribs {
    ShaderResourceAttribs::new(name, ResourceKind::SampledTexture, array_size).with_dimension(ResourceDimension::Tex2D)
}

fn uniform(name: &str) -> ShaderResourceAttribs {
    ShaderResourceAttribs::new(name, ResourceKind::UniformBuffer, 1).with_dimension(ResourceDimension::Buffer)
}

fn expect_conflict(stages: &[ShaderResources]) -> String {
    let device = MockGraphicsDevice::new();
    match create_default_signature(&device, "PSO", &ImplicitLayoutDesc::default(), stages) {
        Err(Error::ResourceMergeConflict { property, .. }) => property,
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("expected ResourceMergeConflict"),
    }
}

// ============================================================================
// MERGING
// ============================================================================

#[test]
fn test_shared_resource_merges_stages() {
    let device = MockGraphicsDevice::new();
    let stages = [
        shader("VS", ShaderStages::VERTEX, vec![uniform("g_Camera")]),
        shader("PS", ShaderStages::PIXEL, vec![uniform("g_Camera"), texture("g_Tex", 1)]),
    ];

    let signature = create_default_signature(&device, "PSO", &ImplicitLayoutDesc::default(), &stages)
        .unwrap()
        .unwrap();

    assert_eq!(signature.name(), implicit_signature_name("PSO"));
    assert_eq!(signature.resource_count(), 2);
    let camera = signature.resource(signature.find_resource(ShaderStages::VERTEX, "g_Camera").unwrap());
    assert_eq!(camera.stages, ShaderStages::VERTEX | ShaderStages::PIXEL);
    assert_eq!(camera.var_type, VariableType::Static);
    let tex = signature.resource(signature.find_resource(ShaderStages::PIXEL, "g_Tex").unwrap());
    assert_eq!(tex.stages, ShaderStages::PIXEL);
}

#[test]
fn test_array_size_conflict() {
    let property = expect_conflict(&[
        shader("VS", ShaderStages::VERTEX, vec![texture("g_Tex", 1)]),
        shader("PS", ShaderStages::PIXEL, vec![texture("g_Tex", 2)]),
    ]);
    assert_eq!(property, "array size");
}

#[test]
fn test_type_conflict() {
    let property = expect_conflict(&[
        shader("VS", ShaderStages::VERTEX, vec![uniform("g_Data")]),
        shader("PS", ShaderStages::PIXEL, vec![
            ShaderResourceAttribs::new("g_Data", ResourceKind::StorageBuffer, 1).with_dimension(ResourceDimension::Buffer),
        ]),
    ]);
    assert_eq!(property, "type");
}

#[test]
fn test_dimension_conflict() {
    let property = expect_conflict(&[
        shader("VS", ShaderStages::VERTEX, vec![texture("g_Tex", 1)]),
        shader("PS", ShaderStages::PIXEL, vec![
            ShaderResourceAttribs::new("g_Tex", ResourceKind::SampledTexture, 1).with_dimension(ResourceDimension::TexCube),
        ]),
    ]);
    assert_eq!(property, "resource dimension");
}

#[test]
fn test_per_stage_override_splits_resource() {
    let device = MockGraphicsDevice::new();
    let layout = ImplicitLayoutDesc::default().with_variable(ShaderStages::PIXEL, "g_Tex", VariableType::Mutable);
    let stages = [
        shader("VS", ShaderStages::VERTEX, vec![texture("g_Tex", 1)]),
        shader("PS", ShaderStages::PIXEL, vec![texture("g_Tex", 1)]),
    ];

    let signature = create_default_signature(&device, "PSO", &layout, &stages).unwrap().unwrap();

    assert_eq!(signature.resource_count(), 2);
    let vs_tex = signature.resource(signature.find_resource(ShaderStages::VERTEX, "g_Tex").unwrap());
    assert_eq!((vs_tex.stages, vs_tex.var_type), (ShaderStages::VERTEX, VariableType::Static));
    let ps_tex = signature.resource(signature.find_resource(ShaderStages::PIXEL, "g_Tex").unwrap());
    assert_eq!((ps_tex.stages, ps_tex.var_type), (ShaderStages::PIXEL, VariableType::Mutable));
}

#[test]
fn test_override_stages_become_resource_stages() {
    let device = MockGraphicsDevice::new();
    let layout = ImplicitLayoutDesc::default()
        .with_variable(ShaderStages::VERTEX | ShaderStages::PIXEL, "g_Tex", VariableType::Mutable);
    let stages = [
        shader("VS", ShaderStages::VERTEX, vec![texture("g_Tex", 1)]),
        shader("PS", ShaderStages::PIXEL, vec![texture("g_Tex", 1)]),
    ];

    let signature = create_default_signature(&device, "PSO", &layout, &stages).unwrap().unwrap();

    assert_eq!(signature.resource_count(), 1);
    let tex = signature.resource(0);
    assert_eq!(tex.stages, ShaderStages::VERTEX | ShaderStages::PIXEL);
    assert_eq!(tex.var_type, VariableType::Mutable);
}

#[test]
fn test_flags_conflict_reported_as_type() {
    let property = expect_conflict(&[
        shader("VS", ShaderStages::VERTEX, vec![
            ShaderResourceAttribs::new("g_Data", ResourceKind::StorageBuffer, 1),
        ]),
        shader("PS", ShaderStages::PIXEL, vec![
            ShaderResourceAttribs::new("g_Data", ResourceKind::StorageBuffer, 1).with_flags(ResourceFlags::FORMATTED_BUFFER),
        ]),
    ]);
    assert_eq!(property, "type");
}

// ============================================================================
// LAYOUT OPTIONS
// ============================================================================

#[test]
fn test_no_resources_gives_none() {
    let device = MockGraphicsDevice::new();
    let stages = [shader("VS", ShaderStages::VERTEX, Vec::new())];
    let signature = create_default_signature(&device, "PSO", &ImplicitLayoutDesc::default(), &stages).unwrap();
    assert!(signature.is_none());
}

#[test]
fn test_immutable_sampler_alone_creates_signature() {
    let device = MockGraphicsDevice::new();
    let mut layout = ImplicitLayoutDesc::default();
    layout.immutable_samplers.push(ImmutableSamplerDesc {
        sampler_or_texture_name: "g_Linear".to_string(),
        stages: ShaderStages::PIXEL,
        desc: SamplerDesc::default(),
    });
    let stages = [shader("PS", ShaderStages::PIXEL, Vec::new())];

    let signature = create_default_signature(&device, "PSO", &layout, &stages).unwrap().unwrap();
    assert_eq!(signature.immutable_samplers().len(), 1);
}

#[test]
fn test_variables_override_and_sorting() {
    let device = MockGraphicsDevice::new();
    let layout = ImplicitLayoutDesc::default()
        .with_variable(ShaderStages::PIXEL, "g_Object", VariableType::Dynamic)
        .with_variable(ShaderStages::PIXEL, "g_Tex", VariableType::Mutable);
    let stages = [shader("PS", ShaderStages::PIXEL, vec![
        uniform("g_Object"),
        texture("g_Tex", 1),
        uniform("g_Frame"),
    ])];

    let signature = create_default_signature(&device, "PSO", &layout, &stages).unwrap().unwrap();

    let order: Vec<(&str, VariableType)> = signature
        .resources()
        .map(|(res, _)| (res.name.as_str(), res.var_type))
        .collect();
    assert_eq!(order, vec![
        ("g_Frame", VariableType::Static),
        ("g_Tex", VariableType::Mutable),
        ("g_Object", VariableType::Dynamic),
    ]);
}

#[test]
fn test_paired_sampler_follows_texture_type() {
    let device = MockGraphicsDevice::new();
    let layout = ImplicitLayoutDesc::default().with_variable(ShaderStages::PIXEL, "g_Tex", VariableType::Mutable);
    let stages = [shader("PS", ShaderStages::PIXEL, vec![
        texture("g_Tex", 1),
        ShaderResourceAttribs::new("g_Tex_sampler", ResourceKind::Sampler, 1),
    ])
    .with_combined_sampler_suffix("_sampler")];

    let signature = create_default_signature(&device, "PSO", &layout, &stages).unwrap().unwrap();

    assert_eq!(signature.combined_sampler_suffix(), Some("_sampler"));
    let sampler = signature.resource(signature.find_resource(ShaderStages::PIXEL, "g_Tex_sampler").unwrap());
    assert_eq!(sampler.var_type, VariableType::Mutable);
}

#[test]
fn test_allocation_granularity_is_forwarded() {
    let device = MockGraphicsDevice::new();
    let layout = ImplicitLayoutDesc {
        allocation_granularity: Some(16),
        ..ImplicitLayoutDesc::default()
    };
    let stages = [shader("PS", ShaderStages::PIXEL, vec![uniform("g_Frame")])];

    let signature = create_default_signature(&device, "PSO", &layout, &stages).unwrap().unwrap();
    assert_eq!(signature.desc().allocation_granularity, Some(16));
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_runtime_array_rejected() {
    let device = MockGraphicsDevice::new();
    let stages = [shader("PS", ShaderStages::PIXEL, vec![texture("g_Bindless", 0)])];
    assert!(matches!(
        create_default_signature(&device, "PSO", &ImplicitLayoutDesc::default(), &stages),
        Err(Error::InvalidLayout(_))
    ));
}

#[test]
fn test_differing_sampler_suffixes_rejected() {
    let device = MockGraphicsDevice::new();
    let stages = [
        shader("VS", ShaderStages::VERTEX, vec![texture("g_A", 1)]).with_combined_sampler_suffix("_sampler"),
        shader("PS", ShaderStages::PIXEL, vec![texture("g_B", 1)]).with_combined_sampler_suffix("_smp"),
    ];
    assert!(matches!(
        create_default_signature(&device, "PSO", &ImplicitLayoutDesc::default(), &stages),
        Err(Error::InvalidLayout(_))
    ));
}
