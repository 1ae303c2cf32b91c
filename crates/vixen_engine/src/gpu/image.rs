//! Image-data provider contract
//!
//! Texture files are decoded by the host; the engine consumes raw texel
//! data plus a format tag.

use ash::vk;
use thiserror::Error;

/// Image decode failure reported by the provider
#[derive(Error, Debug, Clone)]
#[error("image '{path}' failed to load: {message}")]
pub struct ImageProviderError {
    /// Source path that failed
    pub path: String,
    /// Provider-specific diagnostic
    pub message: String,
}

/// Decoded image data
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Number of mip levels present in `bytes`
    pub mip_count: u32,
    /// Texel format of `bytes`
    pub format: vk::Format,
    /// Raw texel data, tightly packed, mip-major
    pub bytes: Vec<u8>,
}

/// Image-data provider implemented by the host
pub trait ImageDataProvider: Send + Sync {
    /// Load and decode the image at `path`
    fn load(&self, path: &str) -> Result<ImageData, ImageProviderError>;
}
