bitflags::bitflags! {
    pub struct ResourceUsage: u16 {
        /// CPU-writable transfer point between host memory and the device.
        const AS_STAGING = 0x0001;
        /// Writable by device-side draws/dispatches (conversion target).
        const AS_RENDER_TARGET = 0x0002;
        /// Eligible for registration with a hardware encoder.
        const AS_ENCODE_INPUT = 0x0004;
    }
}

/// Pixel layouts understood by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Packed 8-bit BGRA, 4 bytes per pixel.
    B8G8R8A8_UNORM,
    /// Packed 8-bit RGBA, 4 bytes per pixel.
    R8G8B8A8_UNORM,
    /// Planar: full-resolution luma plane followed by an interleaved
    /// half-resolution chroma plane.
    NV12,
}

impl Format {
    pub fn is_planar(self) -> bool {
        matches!(self, Self::NV12)
    }

    /// Byte size of one tightly-packed frame in this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        match self {
            Self::B8G8R8A8_UNORM | Self::R8G8B8A8_UNORM => w * h * 4,
            Self::NV12 => w * h + (w * h) / 2,
        }
    }

    /// Byte size of one row of the packed plane (luma row for NV12).
    pub fn row_pitch(self, width: u32) -> u32 {
        match self {
            Self::B8G8R8A8_UNORM | Self::R8G8B8A8_UNORM => width * 4,
            Self::NV12 => width,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extents2D {
    pub width: u32,
    pub height: u32,
}

impl Extents2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Immutable description a texture is created from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureDef {
    pub extents: Extents2D,
    pub format: Format,
    pub usage: ResourceUsage,
}

impl TextureDef {
    pub fn size_in_bytes(&self) -> usize {
        self.format
            .frame_size(self.extents.width, self.extents.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_sizes() {
        assert_eq!(Format::B8G8R8A8_UNORM.frame_size(352, 288), 352 * 288 * 4);
        assert_eq!(Format::NV12.frame_size(352, 288), 352 * 288 * 3 / 2);
    }

    #[test]
    fn nv12_is_planar() {
        assert!(Format::NV12.is_planar());
        assert!(!Format::R8G8B8A8_UNORM.is_planar());
    }
}
