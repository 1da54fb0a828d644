//! Texture resources
//!
//! Image files are decoded with the `image` crate into RGBA8 and handed to
//! the factory, which assigns the id backends key their GPU copies by.

use crate::core::{EngineError, EngineResult};
use crate::resources::{Resource, ResourceKind, ResourceManager};

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGBA, normalized
    Rgba8Unorm,
    /// 32-bit float depth
    Depth32Float,
    /// 24-bit depth + 8-bit stencil
    Depth24Stencil8,
}

impl PixelFormat {
    /// Bytes per texel
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// 2D texture
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    id: u64,
    name: String,
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Texture {
    /// Create a texture, validating the data size
    pub(crate) fn new(
        id: u64,
        name: impl Into<String>,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> EngineResult<Self> {
        let name = name.into();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_params(format!("texture '{name}' has zero size")));
        }
        if !data.is_empty() && data.len() != expected {
            return Err(EngineError::invalid_params(format!(
                "texture '{name}' expects {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { id, name, format, width, height, data })
    }

    /// 1x1 texture of a single color
    pub(crate) fn solid(id: u64, name: impl Into<String>, color: [u8; 4]) -> Self {
        Self {
            id,
            name: name.into(),
            format: PixelFormat::Rgba8Unorm,
            width: 1,
            height: 1,
            data: color.to_vec(),
        }
    }

    /// Factory-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Texture name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texel format
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Width in texels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel data; empty for render targets
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Resource for Texture {
    const KIND: ResourceKind = ResourceKind::Texture;

    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self> {
        let mut stream = manager.file_system().open_stream(name, group)?;
        let bytes = stream.read_to_end()?;
        let image = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        log::debug!("Decoded texture '{}' {}x{}", name, width, height);
        let id = manager.factory().next_id();
        Texture::new(id, name, PixelFormat::Rgba8Unorm, width, height, image.into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_is_validated() {
        assert!(Texture::new(1, "ok", PixelFormat::Rgba8Unorm, 2, 2, vec![0; 16]).is_ok());
        let error = Texture::new(2, "short", PixelFormat::Rgba8Unorm, 2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::InvalidParams);
        assert!(Texture::new(3, "empty", PixelFormat::Rgba8Unorm, 0, 4, Vec::new()).is_err());
    }
}
