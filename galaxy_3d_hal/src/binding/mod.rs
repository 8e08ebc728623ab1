/// Resource binding: descriptions, reflection, signatures, caches and layouts

pub mod resource_desc;
pub mod spirv;
pub mod shader_resources;
pub mod cache_allocator;
pub mod resource_cache;
pub mod signature;
pub mod shader_resource_binding;
pub mod pipeline_layout;
pub mod default_signature;
pub mod limits;

pub use resource_desc::{
    BindingRange, ImmutableSamplerDesc, ResourceDesc, ResourceFlags, ResourceKind, ShaderStages, SignatureDesc,
    VariableType,
};
pub use shader_resources::{ResourceDimension, ShaderResourceAttribs, ShaderResources};
pub use cache_allocator::{CacheAllocator, CacheRegion};
pub use resource_cache::{CacheLayout, CacheSlot, ResourceCache};
pub use signature::{
    ImmutableSamplerAttribs, ResourceAttribs, ResourceSignature, SamplerAssignment, MAX_RESOURCE_SIGNATURES,
};
pub use shader_resource_binding::ShaderResourceBinding;
pub use pipeline_layout::{PipelineLayout, ResolvedResource, ResolvedTarget, ShaderStageInfo};
pub use default_signature::{create_default_signature, implicit_signature_name, ImplicitLayoutDesc, ImplicitVariableDesc};
pub use limits::{validate_resource_limits, DeviceLimits, LimitCategory};

// SPIR-V assembler for reflection tests
#[cfg(test)]
pub(crate) mod test_spirv;
