/// Signature derived from shader reflection
///
/// Pipelines created without explicit signatures get one built from the
/// resources their stages reference. Resources are keyed by name and variable
/// type: a resource used by several stages with the same variable type must
/// be declared identically in each of them, and its stage mask is the union.
/// A per-stage variable override splits it into separate resources.

use std::sync::Arc;
use crate::engine_fail;
use crate::error::{Error, Result};
use crate::graphics_device::GraphicsDevice;
use super::resource_desc::{
    name_matches, ImmutableSamplerDesc, ResourceDesc, ResourceFlags, ResourceKind, ShaderStages, SignatureDesc,
    VariableType,
};
use super::shader_resources::{ResourceDimension, ShaderResourceAttribs, ShaderResources};
use super::signature::ResourceSignature;

/// Variable type override for one shader variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitVariableDesc {
    pub stages: ShaderStages,
    pub name: String,
    pub var_type: VariableType,
}

/// Options of the derived signature
#[derive(Debug, Clone)]
pub struct ImplicitLayoutDesc {
    /// Variable type of resources not listed in `variables`
    pub default_variable_type: VariableType,
    pub variables: Vec<ImplicitVariableDesc>,
    pub immutable_samplers: Vec<ImmutableSamplerDesc>,
    pub allocation_granularity: Option<u32>,
}

impl Default for ImplicitLayoutDesc {
    fn default() -> Self {
        Self {
            default_variable_type: VariableType::Static,
            variables: Vec::new(),
            immutable_samplers: Vec::new(),
            allocation_granularity: None,
        }
    }
}

impl ImplicitLayoutDesc {
    pub fn with_variable(mut self, stages: ShaderStages, name: impl Into<String>, var_type: VariableType) -> Self {
        self.variables.push(ImplicitVariableDesc {
            stages,
            name: name.into(),
            var_type,
        });
        self
    }

    /// Variable type and stage mask of `res` as seen from `stage`
    fn resolve(&self, stage: ShaderStages, res: &ShaderResourceAttribs, suffix: Option<&str>) -> (VariableType, ShaderStages) {
        // Samplers paired with a texture follow the texture's type
        let suffix = if res.kind == ResourceKind::Sampler { suffix } else { None };
        self.variables
            .iter()
            .find(|var| var.stages.intersects(stage) && name_matches(&res.name, &var.name, suffix))
            .map(|var| (var.var_type, var.stages))
            .unwrap_or((self.default_variable_type, stage))
    }
}

struct MergedResource {
    desc: ResourceDesc,
    dimension: ResourceDimension,
}

/// Name of the signature derived for pipeline `pipeline_name`
pub fn implicit_signature_name(pipeline_name: &str) -> String {
    format!("Implicit signature of PSO '{}'", pipeline_name)
}

/// Derive and create the signature of pipeline `pipeline_name`
///
/// Returns None when the stages reference no resource and no immutable
/// sampler is declared.
///
/// # Errors
///
/// - `ResourceMergeConflict` when a shared resource differs between stages
/// - `InvalidLayout` for runtime-sized arrays or differing combined-sampler suffixes
pub fn create_default_signature(
    device: &dyn GraphicsDevice,
    pipeline_name: &str,
    layout: &ImplicitLayoutDesc,
    stages: &[ShaderResources],
) -> Result<Option<Arc<ResourceSignature>>> {
    let mut suffix: Option<&str> = None;
    for shader in stages {
        let Some(stage_suffix) = shader.combined_sampler_suffix.as_deref() else {
            continue;
        };
        match suffix {
            None => suffix = Some(stage_suffix),
            Some(existing) if existing != stage_suffix => {
                engine_fail!("galaxy3d::Signature", Error::InvalidLayout(format!(
                    "Pipeline '{}': shader '{}' uses combined sampler suffix '{}', but another stage uses '{}'",
                    pipeline_name, shader.shader_name, stage_suffix, existing
                )));
            }
            Some(_) => {}
        }
    }

    let mut merged: Vec<MergedResource> = Vec::new();
    for shader in stages {
        for res in shader.iter() {
            if res.array_size == 0 {
                engine_fail!("galaxy3d::Signature", Error::InvalidLayout(format!(
                    "Resource '{}' in shader '{}' is a runtime-sized array; runtime arrays require an explicit resource signature",
                    res.name, shader.shader_name
                )));
            }

            let (var_type, stages) = layout.resolve(shader.stage, res, suffix);

            match merged.iter_mut().find(|m| m.desc.name == res.name && m.desc.var_type == var_type) {
                Some(existing) => {
                    let property = if existing.desc.kind != res.kind
                        || existing.desc.flags - ResourceFlags::MULTISAMPLE != res.flags - ResourceFlags::MULTISAMPLE
                    {
                        Some("type")
                    } else if existing.dimension != res.dimension {
                        Some("resource dimension")
                    } else if existing.desc.array_size != res.array_size {
                        Some("array size")
                    } else if existing.desc.flags.contains(ResourceFlags::MULTISAMPLE) != res.is_multisample() {
                        Some("multisample state")
                    } else {
                        None
                    };
                    if let Some(property) = property {
                        engine_fail!("galaxy3d::Signature", Error::ResourceMergeConflict {
                            pipeline: pipeline_name.to_string(),
                            resource: res.name.clone(),
                            property: property.to_string(),
                        });
                    }
                    existing.desc.stages |= stages;
                }
                None => merged.push(MergedResource {
                    desc: ResourceDesc::new(res.name.clone(), stages, res.array_size, res.kind, var_type)
                        .with_flags(res.flags),
                    dimension: res.dimension,
                }),
            }
        }
    }

    if merged.is_empty() && layout.immutable_samplers.is_empty() {
        return Ok(None);
    }

    let mut resources: Vec<ResourceDesc> = merged.into_iter().map(|m| m.desc).collect();
    resources.sort_by_key(|res| res.var_type);

    let mut desc = SignatureDesc::new(implicit_signature_name(pipeline_name));
    desc.resources = resources;
    desc.immutable_samplers = layout.immutable_samplers.clone();
    desc.allocation_granularity = layout.allocation_granularity;
    if let Some(suffix) = suffix {
        desc = desc.with_combined_samplers(suffix);
    }

    ResourceSignature::new(device, desc).map(Some)
}

#[cfg(test)]
#[path = "default_signature_tests.rs"]
mod tests;
