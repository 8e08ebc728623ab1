/// Texture trait, texture descriptor and formats

use crate::state::StateCell;

/// Texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM | TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::D24_UNORM_S8_UINT)
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    Tex1D,
    Tex1DArray,
    Tex2D,
    Tex2DArray,
    Tex3D,
    Cube,
    CubeArray,
}

/// Descriptor of a created texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, layer count otherwise
    pub depth_or_layers: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub format: TextureFormat,
    pub dimension: TextureDimension,
}

impl TextureDesc {
    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }
}

/// GPU texture
pub trait Texture: Send + Sync {
    fn desc(&self) -> &TextureDesc;

    fn state(&self) -> &StateCell;

    /// Backend handle (e.g. `VkImage` as u64)
    fn native_handle(&self) -> u64;

    /// Backend view handle used for descriptors (e.g. `VkImageView` as u64)
    fn native_view(&self) -> u64;
}
