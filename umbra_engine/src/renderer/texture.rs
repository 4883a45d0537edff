/// Texture trait, texture descriptor, and texture info

use bitflags::bitflags;

/// Texture and attachment format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    // Color formats
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,

    // Depth / stencil formats
    D16_UNORM,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT,
    D32_SFLOAT_S8_UINT,
}

impl TextureFormat {
    /// True for formats with a depth aspect
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM
                | TextureFormat::D16_UNORM_S8_UINT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_SFLOAT
                | TextureFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// True for formats with a stencil aspect
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM_S8_UINT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM => 4,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::R32G32B32A32_SFLOAT => 16,
            TextureFormat::D16_UNORM => 2,
            TextureFormat::D16_UNORM_S8_UINT => 3,
            TextureFormat::D24_UNORM_S8_UINT | TextureFormat::D32_SFLOAT => 4,
            TextureFormat::D32_SFLOAT_S8_UINT => 5,
        }
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be sampled in shaders
        const SAMPLED = 1 << 0;
        /// Texture can be used as a color attachment
        const COLOR_ATTACHMENT = 1 << 1;
        /// Texture can be used as a depth/stencil attachment
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        /// Texture can receive uploads
        const TRANSFER_DST = 1 << 3;
    }
}

/// Pixel data uploaded at creation time
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Target layer index (0-based)
    pub layer: u32,
    /// Raw pixel bytes for this layer
    pub bytes: Vec<u8>,
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
    /// Number of array layers (1 = simple 2D texture, >1 = texture array)
    pub array_layers: u32,
    /// Samples per pixel (1 = no MSAA)
    pub samples: u32,
    /// Optional per-layer data uploaded at creation time
    pub data: Vec<TextureData>,
}

impl TextureDesc {
    /// Single-layer, single-sample attachment with no initial data
    pub fn attachment(label: &str, width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            format,
            usage,
            array_layers: 1,
            samples: 1,
            data: Vec::new(),
        }
    }
}

/// Read-only properties of a created texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
    /// Number of array layers
    pub array_layers: u32,
    /// Samples per pixel
    pub samples: u32,
}

impl TextureInfo {
    /// Returns true if this texture is a texture array (array_layers > 1)
    pub fn is_array(&self) -> bool {
        self.array_layers > 1
    }
}

impl From<&TextureDesc> for TextureInfo {
    fn from(desc: &TextureDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            array_layers: desc.array_layers,
            samples: desc.samples,
        }
    }
}

/// Texture resource trait
///
/// A texture owns its image, memory and view. Implemented by backend-specific
/// texture types; destroyed when dropped.
pub trait Texture: Send + Sync {
    /// Get the read-only properties of this texture
    fn info(&self) -> &TextureInfo;
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
