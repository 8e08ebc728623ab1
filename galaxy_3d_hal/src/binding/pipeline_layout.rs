/// Pipeline layout builder
///
/// Merges the signatures used by a pipeline into one layout, resolves every
/// resource the shader stages reference to the signature that declares it, and
/// rewrites the `Binding` / `DescriptorSet` decorations of the stage byte code
/// to the assigned slots.
///
/// Resolution is all-or-nothing: byte code is only patched once every resource
/// of every stage has been resolved and validated.

use std::sync::Arc;
use crate::engine_fail;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, NativePipelineLayout, PipelineLayoutInfo};
use super::resource_desc::{BindingRange, ResourceFlags, ResourceKind};
use super::shader_resources::{ShaderResourceAttribs, ShaderResources};
use super::signature::{ResourceSignature, MAX_RESOURCE_SIGNATURES};
use super::spirv::patch_word;

/// Reflected resources and byte code of one stage
#[derive(Debug, Clone)]
pub struct ShaderStageInfo {
    pub resources: ShaderResources,
    /// SPIR-V words, patched in place
    pub code: Vec<u32>,
}

/// What a reflected resource resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Index of a resource in the signature
    Resource(usize),
    /// Index of an immutable sampler in the signature
    ImmutableSampler(usize),
}

/// Attribution of one reflected resource
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// Index of the stage in the pipeline
    pub stage_index: usize,
    /// Index of the resource in the stage's reflection
    pub resource_index: usize,
    pub binding_index: u8,
    pub target: ResolvedTarget,
    /// Final descriptor set and binding
    pub descriptor_set: u32,
    pub binding: u32,
}

pub struct PipelineLayout {
    name: String,
    /// Indexed by binding index
    signatures: Vec<Option<Arc<ResourceSignature>>>,
    first_descriptor_set: Vec<u32>,
    first_binding: Vec<[u32; BindingRange::COUNT]>,
    descriptor_set_count: u32,
    resolved: Vec<ResolvedResource>,
    native: Box<dyn NativePipelineLayout>,
}

impl PipelineLayout {
    /// Build a layout and patch the stages' byte code
    ///
    /// # Errors
    ///
    /// - `InvalidLayout` if two signatures share a binding index
    /// - `BindingNotFound` if a shader resource is declared by no signature
    /// - `IncompatibleResourceDeclaration` if a shader declares a resource
    ///   differently from its signature
    pub fn build(
        device: &dyn GraphicsDevice,
        name: &str,
        signatures: &[Arc<ResourceSignature>],
        stages: &mut [ShaderStageInfo],
    ) -> Result<Self> {
        let mut slots: Vec<Option<Arc<ResourceSignature>>> = Vec::new();
        for signature in signatures {
            let index = signature.binding_index() as usize;
            if index >= MAX_RESOURCE_SIGNATURES {
                engine_fail!("galaxy3d::PipelineLayout", Error::InvalidLayout(format!(
                    "Signature '{}' uses binding index {}, the maximum is {}",
                    signature.name(), index, MAX_RESOURCE_SIGNATURES - 1
                )));
            }
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            if let Some(existing) = &slots[index] {
                engine_fail!("galaxy3d::PipelineLayout", Error::InvalidLayout(format!(
                    "Pipeline '{}': signatures '{}' and '{}' share binding index {}",
                    name, existing.name(), signature.name(), index
                )));
            }
            slots[index] = Some(signature.clone());
        }

        let mut first_descriptor_set = Vec::with_capacity(slots.len());
        let mut first_binding = Vec::with_capacity(slots.len());
        let mut set_count = 0u32;
        let mut range_bindings = [0u32; BindingRange::COUNT];
        for slot in &slots {
            first_descriptor_set.push(set_count);
            first_binding.push(range_bindings);
            if let Some(signature) = slot {
                set_count += signature.descriptor_set_count();
                for range in BindingRange::ALL {
                    range_bindings[range.index()] += signature.cache_layout().range_count(range);
                }
            }
        }

        let mut resolved = Vec::new();
        for (stage_index, stage) in stages.iter().enumerate() {
            for (resource_index, res) in stage.resources.iter().enumerate() {
                let entry = resolve(&slots, &first_descriptor_set, &stage.resources, res)?;
                resolved.push(ResolvedResource {
                    stage_index,
                    resource_index,
                    ..entry
                });
            }
        }

        // Everything resolved: patch
        for entry in &resolved {
            let stage = &mut stages[entry.stage_index];
            let res = &stage.resources.resources[entry.resource_index];
            if let Some(offset) = res.binding_decoration_offset {
                patch_word(&mut stage.code, offset, entry.binding)?;
            }
            if let Some(offset) = res.set_decoration_offset {
                patch_word(&mut stage.code, offset, entry.descriptor_set)?;
            }
        }

        let ordered: Vec<Arc<ResourceSignature>> = slots.iter().flatten().cloned().collect();
        if device.config().validation_enabled() && set_count > device.limits().max_descriptor_sets {
            crate::engine_warn!("galaxy3d::PipelineLayout",
                "Pipeline '{}' uses {} descriptor sets, but the device supports at most {}",
                name, set_count, device.limits().max_descriptor_sets);
        }

        let native = device.create_pipeline_layout(&PipelineLayoutInfo {
            name,
            signatures: &ordered,
        })?;

        crate::engine_debug!("galaxy3d::PipelineLayout",
            "Built layout of '{}': {} signatures, {} descriptor sets, {} resolved resources",
            name, ordered.len(), set_count, resolved.len());

        Ok(Self {
            name: name.to_string(),
            signatures: slots,
            first_descriptor_set,
            first_binding,
            descriptor_set_count: set_count,
            resolved,
            native,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signature at `binding_index`
    pub fn signature(&self, binding_index: u8) -> Option<&Arc<ResourceSignature>> {
        self.signatures.get(binding_index as usize).and_then(|s| s.as_ref())
    }

    /// Signatures in binding-index order
    pub fn signatures(&self) -> impl Iterator<Item = &Arc<ResourceSignature>> {
        self.signatures.iter().flatten()
    }

    /// One past the highest binding index in use
    pub fn binding_slot_count(&self) -> usize {
        self.signatures.len()
    }

    /// Pipeline-layout index of the first descriptor set of signature `binding_index`
    pub fn first_descriptor_set(&self, binding_index: u8) -> u32 {
        self.first_descriptor_set.get(binding_index as usize).copied().unwrap_or(0)
    }

    /// First flat binding of `range` for signature `binding_index`, for
    /// backends without descriptor sets
    pub fn first_binding(&self, binding_index: u8, range: BindingRange) -> u32 {
        self.first_binding
            .get(binding_index as usize)
            .map(|bindings| bindings[range.index()])
            .unwrap_or(0)
    }

    pub fn descriptor_set_count(&self) -> u32 {
        self.descriptor_set_count
    }

    /// Attribution of every reflected resource
    pub fn resolved_resources(&self) -> &[ResolvedResource] {
        &self.resolved
    }

    pub fn native(&self) -> &dyn NativePipelineLayout {
        self.native.as_ref()
    }
}

/// Resolve one reflected resource: first signature that declares it wins
fn resolve(
    slots: &[Option<Arc<ResourceSignature>>],
    first_descriptor_set: &[u32],
    shader: &ShaderResources,
    res: &ShaderResourceAttribs,
) -> Result<ResolvedResource> {
    for (binding_index, signature) in slots.iter().enumerate() {
        let Some(signature) = signature else {
            continue;
        };
        let first_set = first_descriptor_set[binding_index];

        if let Some(index) = signature.find_resource(shader.stage, &res.name) {
            check_compatible(shader, res, signature, index)?;
            let attr = signature.attribs(index);
            return Ok(ResolvedResource {
                stage_index: 0,
                resource_index: 0,
                binding_index: binding_index as u8,
                target: ResolvedTarget::Resource(index),
                descriptor_set: first_set + attr.descriptor_set,
                binding: attr.binding,
            });
        }

        if let Some(index) = signature.find_immutable_sampler(shader.stage, &res.name) {
            if res.kind != ResourceKind::Sampler {
                engine_fail!("galaxy3d::PipelineLayout", Error::IncompatibleResourceDeclaration {
                    shader: shader.shader_name.clone(),
                    resource: res.name.clone(),
                    signature: signature.name().to_string(),
                    reason: format!("it is a {} in the shader but an immutable sampler in the signature", res.kind.name()),
                });
            }
            let imtbl = &signature.immutable_samplers()[index];
            return Ok(ResolvedResource {
                stage_index: 0,
                resource_index: 0,
                binding_index: binding_index as u8,
                target: ResolvedTarget::ImmutableSampler(index),
                descriptor_set: first_set + imtbl.descriptor_set,
                binding: imtbl.binding,
            });
        }
    }

    engine_fail!("galaxy3d::PipelineLayout", Error::BindingNotFound {
        shader: shader.shader_name.clone(),
        resource: res.name.clone(),
    });
}

/// Validate a reflected resource against its signature declaration
fn check_compatible(
    shader: &ShaderResources,
    res: &ShaderResourceAttribs,
    signature: &ResourceSignature,
    index: usize,
) -> Result<()> {
    let decl = signature.resource(index);

    let reason = if res.kind != decl.kind {
        Some(format!(
            "it is a {} in the shader but a {} in the signature",
            res.kind.name(), decl.kind.name()
        ))
    } else if res.flags.contains(ResourceFlags::FORMATTED_BUFFER) != decl.flags.contains(ResourceFlags::FORMATTED_BUFFER) {
        Some("formatted buffer flag does not match".to_string())
    } else if res.flags.contains(ResourceFlags::COMBINED_SAMPLER) != decl.flags.contains(ResourceFlags::COMBINED_SAMPLER) {
        Some("combined sampler flag does not match".to_string())
    } else if decl.flags.contains(ResourceFlags::READ_ONLY) && !res.flags.contains(ResourceFlags::READ_ONLY) {
        Some("the signature declares READ_ONLY but the shader writes the buffer".to_string())
    } else if res.array_size == 0 && !decl.flags.contains(ResourceFlags::RUNTIME_ARRAY) {
        Some("the shader declares a runtime-sized array but the signature lacks RUNTIME_ARRAY".to_string())
    } else if res.array_size > decl.array_size {
        Some(format!(
            "array size {} in the shader exceeds {} in the signature",
            res.array_size, decl.array_size
        ))
    } else if res.is_multisample() != decl.flags.contains(ResourceFlags::MULTISAMPLE) {
        Some(if res.is_multisample() {
            "the shader expects a multisample texture but the signature does not declare MULTISAMPLE".to_string()
        } else {
            "the signature declares MULTISAMPLE but the shader expects a single-sample texture".to_string()
        })
    } else {
        None
    };

    match reason {
        Some(reason) => {
            engine_fail!("galaxy3d::PipelineLayout", Error::IncompatibleResourceDeclaration {
                shader: shader.shader_name.clone(),
                resource: res.name.clone(),
                signature: signature.name().to_string(),
                reason,
            });
        }
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "pipeline_layout_tests.rs"]
mod tests;
