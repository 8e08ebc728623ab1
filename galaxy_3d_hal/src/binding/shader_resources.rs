/// Shader reflection adapter
///
/// Turns compiled SPIR-V into the backend-agnostic list of resources a shader
/// stage references. spirq provides kinds, access, names, array sizes and
/// image properties; the decoration scanner provides the word offsets the
/// pipeline layout builder patches.

use spirq::ty::{AccessType, DescriptorType, Dim, Type};
use spirq::var::Variable;
use crate::engine_err;
use crate::error::Result;
use super::resource_desc::{ResourceFlags, ResourceKind, ShaderStages};
use super::spirv::SpirvModule;

/// Dimensionality of a reflected resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Undefined,
    Buffer,
    Tex1D,
    Tex1DArray,
    Tex2D,
    Tex2DArray,
    Tex3D,
    TexCube,
    TexCubeArray,
    SubpassInput,
}

impl ResourceDimension {
    fn from_image(dim: Dim, arrayed: bool) -> Self {
        match (dim, arrayed) {
            (Dim::Dim1D, false) => ResourceDimension::Tex1D,
            (Dim::Dim1D, true) => ResourceDimension::Tex1DArray,
            (Dim::Dim2D | Dim::DimRect, false) => ResourceDimension::Tex2D,
            (Dim::Dim2D | Dim::DimRect, true) => ResourceDimension::Tex2DArray,
            (Dim::Dim3D, _) => ResourceDimension::Tex3D,
            (Dim::DimCube, false) => ResourceDimension::TexCube,
            (Dim::DimCube, true) => ResourceDimension::TexCubeArray,
            (Dim::DimBuffer, _) => ResourceDimension::Buffer,
            (Dim::DimSubpassData, _) => ResourceDimension::SubpassInput,
            _ => ResourceDimension::Undefined,
        }
    }

    /// Dimension and multisample state of a descriptor's element type
    fn of_type(ty: &Type) -> (Self, bool) {
        match ty {
            Type::CombinedImageSampler(t) => {
                let image = &t.sampled_image_ty;
                (Self::from_image(image.dim, image.is_array), image.is_multisampled)
            }
            Type::SampledImage(t) => (Self::from_image(t.dim, t.is_array), t.is_multisampled),
            Type::StorageImage(t) => (Self::from_image(t.dim, t.is_array), t.is_multisampled),
            Type::Image(t) => (Self::from_image(t.dim, t.is_array), t.is_multisampled),
            Type::SubpassData(t) => (ResourceDimension::SubpassInput, t.is_multisampled),
            Type::Sampler(_) => (ResourceDimension::Undefined, false),
            _ => (ResourceDimension::Buffer, false),
        }
    }
}

/// One resource referenced by a shader stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResourceAttribs {
    pub name: String,
    pub kind: ResourceKind,
    /// FORMATTED_BUFFER / COMBINED_SAMPLER / MULTISAMPLE / READ_ONLY as declared by the shader
    pub flags: ResourceFlags,
    /// 0 for runtime-sized arrays
    pub array_size: u32,
    pub dimension: ResourceDimension,
    /// Set and binding the shader was compiled with
    pub declared_set: u32,
    pub declared_binding: u32,
    /// Word offsets of the decoration literals in the stage byte code
    pub binding_decoration_offset: Option<usize>,
    pub set_decoration_offset: Option<usize>,
}

impl ShaderResourceAttribs {
    pub fn new(name: impl Into<String>, kind: ResourceKind, array_size: u32) -> Self {
        let dimension = match kind {
            ResourceKind::SampledTexture | ResourceKind::StorageTexture => ResourceDimension::Tex2D,
            ResourceKind::InputAttachment => ResourceDimension::SubpassInput,
            _ => ResourceDimension::Buffer,
        };
        Self {
            name: name.into(),
            kind,
            flags: ResourceFlags::empty(),
            array_size,
            dimension,
            declared_set: 0,
            declared_binding: 0,
            binding_decoration_offset: None,
            set_decoration_offset: None,
        }
    }

    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_dimension(mut self, dimension: ResourceDimension) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn is_multisample(&self) -> bool {
        self.flags.contains(ResourceFlags::MULTISAMPLE)
    }
}

/// Resources of one shader stage
#[derive(Debug, Clone)]
pub struct ShaderResources {
    pub shader_name: String,
    pub stage: ShaderStages,
    pub resources: Vec<ShaderResourceAttribs>,
    /// Suffix pairing textures with separate samplers, when the shader uses that convention
    pub combined_sampler_suffix: Option<String>,
}

impl ShaderResources {
    pub fn new(shader_name: impl Into<String>, stage: ShaderStages, resources: Vec<ShaderResourceAttribs>) -> Self {
        Self {
            shader_name: shader_name.into(),
            stage,
            resources,
            combined_sampler_suffix: None,
        }
    }

    /// Reflect a SPIR-V module
    ///
    /// # Errors
    ///
    /// Fails if the module is malformed or declares a descriptor type the HAL
    /// does not support.
    pub fn from_spirv(shader_name: &str, stage: ShaderStages, code: &[u32]) -> Result<Self> {
        let module = SpirvModule::parse(code)?;

        let entry_points = spirq::ReflectConfig::new()
            .spv(code)
            .ref_all_rscs(true)
            .reflect()
            .map_err(|e| engine_err!("galaxy3d::Reflection",
                "SPIR-V reflection of shader '{}' failed: {:?}", shader_name, e))?;

        let mut resources: Vec<ShaderResourceAttribs> = Vec::new();
        for entry_point in &entry_points {
            for var in entry_point.vars.iter() {
                let Variable::Descriptor { name, desc_bind, desc_ty, ty, nbind } = var else {
                    continue;
                };
                let (set, binding) = (desc_bind.set(), desc_bind.bind());
                if resources
                    .iter()
                    .any(|r| r.declared_set == set && r.declared_binding == binding)
                {
                    continue;
                }

                let (kind, mut flags) = descriptor_kind(shader_name, desc_ty)?;
                let (dimension, multisampled) = ResourceDimension::of_type(ty);
                if multisampled {
                    flags |= ResourceFlags::MULTISAMPLE;
                }

                // Unnamed block instances go by their block type name
                let name = name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .or_else(|| match ty {
                        Type::Struct(block) => block.name.clone(),
                        _ => None,
                    })
                    .unwrap_or_default();

                let decorated = module.find_by_binding(set, binding);
                resources.push(ShaderResourceAttribs {
                    name,
                    kind,
                    flags,
                    array_size: *nbind,
                    dimension,
                    declared_set: set,
                    declared_binding: binding,
                    binding_decoration_offset: decorated.and_then(|v| v.binding.map(|b| b.offset)),
                    set_decoration_offset: decorated.and_then(|v| v.descriptor_set.map(|s| s.offset)),
                });
            }
        }

        crate::engine_trace!("galaxy3d::Reflection",
            "Shader '{}' references {} resources", shader_name, resources.len());

        Ok(Self {
            shader_name: shader_name.to_string(),
            stage,
            resources,
            combined_sampler_suffix: None,
        })
    }

    pub fn with_combined_sampler_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.combined_sampler_suffix = Some(suffix.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderResourceAttribs> {
        self.resources.iter()
    }

    pub fn find(&self, name: &str) -> Option<&ShaderResourceAttribs> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn uses_combined_samplers(&self) -> bool {
        self.combined_sampler_suffix.is_some()
    }
}

/// Map a spirq descriptor type to (kind, flags)
fn descriptor_kind(shader_name: &str, desc_ty: &DescriptorType) -> Result<(ResourceKind, ResourceFlags)> {
    let mapped = match desc_ty {
        DescriptorType::UniformBuffer() => (ResourceKind::UniformBuffer, ResourceFlags::empty()),
        DescriptorType::StorageBuffer(AccessType::ReadOnly) => (ResourceKind::StorageBuffer, ResourceFlags::READ_ONLY),
        DescriptorType::StorageBuffer(_) => (ResourceKind::StorageBuffer, ResourceFlags::empty()),
        DescriptorType::UniformTexelBuffer() => (ResourceKind::UniformBuffer, ResourceFlags::FORMATTED_BUFFER),
        DescriptorType::StorageTexelBuffer(_) => (ResourceKind::StorageBuffer, ResourceFlags::FORMATTED_BUFFER),
        DescriptorType::StorageImage(_) => (ResourceKind::StorageTexture, ResourceFlags::empty()),
        DescriptorType::CombinedImageSampler() => (ResourceKind::SampledTexture, ResourceFlags::COMBINED_SAMPLER),
        DescriptorType::SampledImage() => (ResourceKind::SampledTexture, ResourceFlags::empty()),
        DescriptorType::Sampler() => (ResourceKind::Sampler, ResourceFlags::empty()),
        DescriptorType::InputAttachment(_) => (ResourceKind::InputAttachment, ResourceFlags::empty()),
        DescriptorType::AccelStruct() => (ResourceKind::AccelerationStructure, ResourceFlags::empty()),
        #[allow(unreachable_patterns)]
        other => {
            crate::engine_bail!("galaxy3d::Reflection",
                "Shader '{}' uses unsupported descriptor type {:?}", shader_name, other);
        }
    };
    Ok(mapped)
}

#[cfg(test)]
#[path = "shader_resources_tests.rs"]
mod tests;
