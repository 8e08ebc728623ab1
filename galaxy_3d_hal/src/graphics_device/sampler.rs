/// Sampler trait, sampler descriptor and common presets

use std::hash::{Hash, Hasher};

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Texture coordinate addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Comparison function for shadow samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Common sampler configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    /// Linear filtering, repeat wrapping (standard textures)
    LinearRepeat,
    /// Linear filtering, clamp to edge (post-process, UI)
    LinearClamp,
    /// Nearest filtering, repeat wrapping (pixel art)
    NearestRepeat,
    /// Nearest filtering, clamp to edge (lookup tables)
    NearestClamp,
    /// Depth comparison sampler (shadow maps)
    Shadow,
    /// Anisotropic filtering, repeat wrapping
    Anisotropic,
}

/// Full sampler configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    /// 0 disables anisotropic filtering
    pub max_anisotropy: u32,
    pub compare: Option<CompareFunction>,
    pub border_color: BorderColor,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerDesc {
    /// Feed every field into `state` (floats by bit pattern)
    pub fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.min_filter.hash(state);
        self.mag_filter.hash(state);
        self.mip_filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.mip_lod_bias.to_bits().hash(state);
        self.max_anisotropy.hash(state);
        self.compare.hash(state);
        self.border_color.hash(state);
        self.min_lod.to_bits().hash(state);
        self.max_lod.to_bits().hash(state);
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        SamplerDesc::from(SamplerType::LinearClamp)
    }
}

impl From<SamplerType> for SamplerDesc {
    fn from(sampler_type: SamplerType) -> Self {
        let (filter, address, max_anisotropy, compare, border_color) = match sampler_type {
            SamplerType::LinearRepeat => (FilterMode::Linear, AddressMode::Repeat, 0, None, BorderColor::OpaqueBlack),
            SamplerType::LinearClamp => (FilterMode::Linear, AddressMode::ClampToEdge, 0, None, BorderColor::OpaqueBlack),
            SamplerType::NearestRepeat => (FilterMode::Nearest, AddressMode::Repeat, 0, None, BorderColor::OpaqueBlack),
            SamplerType::NearestClamp => (FilterMode::Nearest, AddressMode::ClampToEdge, 0, None, BorderColor::OpaqueBlack),
            SamplerType::Shadow => (
                FilterMode::Linear,
                AddressMode::ClampToBorder,
                0,
                Some(CompareFunction::LessEqual),
                BorderColor::OpaqueWhite,
            ),
            SamplerType::Anisotropic => (FilterMode::Linear, AddressMode::Repeat, 16, None, BorderColor::OpaqueBlack),
        };
        let mip_filter = if sampler_type == SamplerType::Shadow {
            FilterMode::Nearest
        } else {
            filter
        };
        Self {
            min_filter: filter,
            mag_filter: filter,
            mip_filter,
            address_u: address,
            address_v: address,
            address_w: address,
            mip_lod_bias: 0.0,
            max_anisotropy,
            compare,
            border_color,
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

/// Backend sampler object
pub trait Sampler: Send + Sync {
    fn desc(&self) -> &SamplerDesc;

    /// Backend handle (e.g. `VkSampler` as u64)
    fn native_handle(&self) -> u64;
}
