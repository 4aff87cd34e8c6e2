//! Texture and pipeline handle types.

/// Opaque handle to a backend-owned texture.
///
/// Handles are assigned sequentially by the backend and never reused within
/// a session. A handle is only meaningful to the backend that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

/// Opaque handle to a compiled render pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u64);

impl PipelineHandle {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

/// Pixel format of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA. Surface and image-upload format.
    Rgba8Unorm,
    /// 16-bit float RGBA. Default for intermediate effect chains.
    Rgba16Float,
    /// BC1 block compression (HAP video).
    Bc1,
    /// BC3 block compression (HAP Alpha video).
    Bc3,
}

impl TextureFormat {
    /// Bytes per pixel for uncompressed formats, `None` for block-compressed.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            TextureFormat::Rgba8Unorm => Some(4),
            TextureFormat::Rgba16Float => Some(8),
            TextureFormat::Bc1 | TextureFormat::Bc3 => None,
        }
    }

    /// Returns `true` for block-compressed formats.
    pub fn is_compressed(self) -> bool {
        matches!(self, TextureFormat::Bc1 | TextureFormat::Bc3)
    }
}

/// Description of a texture at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: TextureFormat,
}

impl TextureDesc {
    /// Convenience constructor with the effects default format.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: crate::EFFECTS_FORMAT,
        }
    }
}

/// Row layout for [`GpuBackend::queue_write_texture`](crate::GpuBackend::queue_write_texture).
#[derive(Clone, Copy, Debug)]
pub struct WriteLayout {
    /// Bytes between the start of consecutive rows in the source data.
    pub bytes_per_row: u32,
    /// Rows in the source data.
    pub rows_per_image: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sizes() {
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_pixel(), Some(4));
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_pixel(), Some(8));
        assert_eq!(TextureFormat::Bc1.bytes_per_pixel(), None);
        assert!(TextureFormat::Bc3.is_compressed());
        assert!(!TextureFormat::Rgba16Float.is_compressed());
    }
}
