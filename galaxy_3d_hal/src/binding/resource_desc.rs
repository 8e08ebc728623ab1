/// Resource descriptor model: value types describing shader resources and signatures.
///
/// Everything here is plain data, authored by the application (or derived from
/// shader reflection) and consumed by `ResourceSignature::new`.

use bitflags::bitflags;
use crate::graphics_device::SamplerDesc;

bitflags! {
    /// Shader stages a resource is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ShaderStages: u32 {
        const VERTEX = 0x01;
        const PIXEL = 0x02;
        const GEOMETRY = 0x04;
        const HULL = 0x08;
        const DOMAIN = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::PIXEL.bits()
            | Self::GEOMETRY.bits()
            | Self::HULL.bits()
            | Self::DOMAIN.bits();
    }
}

impl ShaderStages {
    /// Iterate over the individual stages contained in this mask
    pub fn stages(self) -> impl Iterator<Item = ShaderStages> {
        (0..Self::STAGE_COUNT as u32)
            .map(|bit| ShaderStages::from_bits_retain(1 << bit))
            .filter(move |stage| self.contains(*stage))
    }

    /// Dense index of a single stage (0..STAGE_COUNT), None for masks with several bits
    pub fn stage_index(self) -> Option<usize> {
        if self.bits().count_ones() == 1 {
            Some(self.bits().trailing_zeros() as usize)
        } else {
            None
        }
    }

    pub const STAGE_COUNT: usize = 6;
}

bitflags! {
    /// Per-resource flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        /// Buffer accessed through a typed (texel) view
        const FORMATTED_BUFFER = 0x01;
        /// Texture sampled through a combined image sampler
        const COMBINED_SAMPLER = 0x02;
        /// Shader declares a runtime-sized array; array_size is the upper bound
        const RUNTIME_ARRAY = 0x04;
        /// Multisampled texture
        const MULTISAMPLE = 0x08;
        /// Storage buffer the shader only reads; bound in the shader-resource state
        const READ_ONLY = 0x10;
    }
}

/// Logical kind of a shader resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    UniformBuffer,
    SampledTexture,
    StorageTexture,
    StorageBuffer,
    Sampler,
    InputAttachment,
    AccelerationStructure,
}

impl ResourceKind {
    pub fn is_buffer(self) -> bool {
        matches!(self, ResourceKind::UniformBuffer | ResourceKind::StorageBuffer)
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::UniformBuffer => "uniform buffer",
            ResourceKind::SampledTexture => "sampled texture",
            ResourceKind::StorageTexture => "storage texture",
            ResourceKind::StorageBuffer => "storage buffer",
            ResourceKind::Sampler => "sampler",
            ResourceKind::InputAttachment => "input attachment",
            ResourceKind::AccelerationStructure => "acceleration structure",
        }
    }
}

/// How often a resource binding changes
///
/// Signatures require resources sorted by this order (static first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableType {
    /// Bound once per signature, shared by every binding-set instance
    Static,
    /// Bound once per binding-set instance
    Mutable,
    /// May be rebound on a binding-set instance between commits
    Dynamic,
}

/// One of the four cache-slot partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingRange {
    UniformBuffer = 0,
    Texture = 1,
    Image = 2,
    StorageBuffer = 3,
}

impl BindingRange {
    pub const COUNT: usize = 4;

    pub const ALL: [BindingRange; BindingRange::COUNT] = [
        BindingRange::UniformBuffer,
        BindingRange::Texture,
        BindingRange::Image,
        BindingRange::StorageBuffer,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Range a resource of `kind` with `flags` occupies, None for samplers
    pub fn for_resource(kind: ResourceKind, flags: ResourceFlags) -> Option<BindingRange> {
        let formatted = flags.contains(ResourceFlags::FORMATTED_BUFFER);
        match kind {
            ResourceKind::UniformBuffer if formatted => Some(BindingRange::Texture),
            ResourceKind::UniformBuffer => Some(BindingRange::UniformBuffer),
            ResourceKind::StorageBuffer if formatted => Some(BindingRange::Image),
            ResourceKind::StorageBuffer => Some(BindingRange::StorageBuffer),
            ResourceKind::SampledTexture | ResourceKind::InputAttachment => Some(BindingRange::Texture),
            ResourceKind::StorageTexture => Some(BindingRange::Image),
            ResourceKind::AccelerationStructure => Some(BindingRange::StorageBuffer),
            ResourceKind::Sampler => None,
        }
    }
}

/// One logical shader resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDesc {
    pub name: String,
    pub stages: ShaderStages,
    pub array_size: u32,
    pub kind: ResourceKind,
    pub var_type: VariableType,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    pub fn new(
        name: impl Into<String>,
        stages: ShaderStages,
        array_size: u32,
        kind: ResourceKind,
        var_type: VariableType,
    ) -> Self {
        Self {
            name: name.into(),
            stages,
            array_size,
            kind,
            var_type,
            flags: ResourceFlags::empty(),
        }
    }

    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn range(&self) -> Option<BindingRange> {
        BindingRange::for_resource(self.kind, self.flags)
    }
}

/// Sampler baked into a signature at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct ImmutableSamplerDesc {
    /// Name of the sampler variable, or of the texture it is combined with
    pub sampler_or_texture_name: String,
    pub stages: ShaderStages,
    pub desc: SamplerDesc,
}

/// Description of a resource signature
#[derive(Debug, Clone)]
pub struct SignatureDesc {
    pub name: String,
    /// Resources, sorted by `var_type`
    pub resources: Vec<ResourceDesc>,
    pub immutable_samplers: Vec<ImmutableSamplerDesc>,
    /// Position of the signature in the pipeline layout
    pub binding_index: u8,
    /// Overrides `Config::allocation_granularity` for this signature's caches
    pub allocation_granularity: Option<u32>,
    /// Textures are paired with the sampler `<texture name><suffix>`
    pub use_combined_texture_samplers: bool,
    pub combined_sampler_suffix: String,
}

impl SignatureDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            immutable_samplers: Vec::new(),
            binding_index: 0,
            allocation_granularity: None,
            use_combined_texture_samplers: false,
            combined_sampler_suffix: String::from("_sampler"),
        }
    }

    pub fn with_resource(mut self, resource: ResourceDesc) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_immutable_sampler(
        mut self,
        name: impl Into<String>,
        stages: ShaderStages,
        desc: SamplerDesc,
    ) -> Self {
        self.immutable_samplers.push(ImmutableSamplerDesc {
            sampler_or_texture_name: name.into(),
            stages,
            desc,
        });
        self
    }

    pub fn with_binding_index(mut self, binding_index: u8) -> Self {
        self.binding_index = binding_index;
        self
    }

    pub fn with_combined_samplers(mut self, suffix: impl Into<String>) -> Self {
        self.use_combined_texture_samplers = true;
        self.combined_sampler_suffix = suffix.into();
        self
    }

    /// Suffix used to pair textures with samplers, if combined samplers are enabled
    pub fn combined_suffix(&self) -> Option<&str> {
        if self.use_combined_texture_samplers {
            Some(self.combined_sampler_suffix.as_str())
        } else {
            None
        }
    }
}

/// `name == base` or `name == base + suffix`
pub(crate) fn name_matches(name: &str, base: &str, suffix: Option<&str>) -> bool {
    if name == base {
        return true;
    }
    match suffix {
        Some(suffix) if !suffix.is_empty() => name
            .strip_prefix(base)
            .is_some_and(|rest| rest == suffix),
        _ => false,
    }
}

#[cfg(test)]
#[path = "resource_desc_tests.rs"]
mod tests;
