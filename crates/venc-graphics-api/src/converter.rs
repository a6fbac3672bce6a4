use crate::device_context::DeviceContext;
use crate::error::{GfxError, GfxResult};
use crate::texture::Texture;

/// Device-side transform from a packed staging texture to the planar
/// layout the hardware encoder consumes.
///
/// Called once per frame, strictly after the staging texture has been
/// written and unmapped. When source and destination formats already
/// match, the transform degenerates to a plain resource copy.
pub struct ColorConverter {
    device: DeviceContext,
}

impl ColorConverter {
    pub fn new(device: &DeviceContext) -> Self {
        Self {
            device: device.clone(),
        }
    }

    pub fn convert(&self, src: &Texture, dst: &Texture) -> GfxResult<()> {
        if src.extents() != dst.extents() {
            return Err(GfxError::new(
                format!(
                    "conversion does not resize: {}x{} -> {}x{}",
                    src.extents().width,
                    src.extents().height,
                    dst.extents().width,
                    dst.extents().height
                ),
                0,
            ));
        }
        if src.format() == dst.format() {
            return self
                .device
                .backend()
                .copy_resource(src.global_id(), dst.global_id());
        }
        self.device
            .backend()
            .convert(src.global_id(), dst.global_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extents2D, Format, ResourceUsage, TextureDef};

    fn textures(device: &DeviceContext) -> (Texture, Texture) {
        let staging = device
            .create_texture(&TextureDef {
                extents: Extents2D::new(2, 2),
                format: Format::R8G8B8A8_UNORM,
                usage: ResourceUsage::AS_STAGING,
            })
            .unwrap();
        let converted = device
            .create_texture(&TextureDef {
                extents: Extents2D::new(2, 2),
                format: Format::NV12,
                usage: ResourceUsage::AS_RENDER_TARGET | ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        (staging, converted)
    }

    #[test]
    fn convert_after_unmap_produces_planar_output() {
        let device = DeviceContext::open_software().unwrap();
        let (staging, converted) = textures(&device);

        let mut region = staging.map().unwrap();
        region.write(&[255u8; 16]).unwrap();
        staging.unmap().unwrap();

        let converter = ColorConverter::new(&device);
        converter.convert(&staging, &converted).unwrap();

        let nv12 = converted.read_back().unwrap();
        assert_eq!(nv12.len(), 6);
        assert_eq!(&nv12[..4], &[235, 235, 235, 235]);
    }

    #[test]
    fn convert_while_source_mapped_fails() {
        let device = DeviceContext::open_software().unwrap();
        let (staging, converted) = textures(&device);

        let _region = staging.map().unwrap();
        let converter = ColorConverter::new(&device);
        assert!(converter.convert(&staging, &converted).is_err());
    }

    #[test]
    fn matching_formats_pass_through() {
        let device = DeviceContext::open_software().unwrap();
        let src = device
            .create_texture(&TextureDef {
                extents: Extents2D::new(2, 2),
                format: Format::NV12,
                usage: ResourceUsage::AS_STAGING,
            })
            .unwrap();
        let dst = device
            .create_texture(&TextureDef {
                extents: Extents2D::new(2, 2),
                format: Format::NV12,
                usage: ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();

        let mut region = src.map().unwrap();
        region.write(&[7u8; 6]).unwrap();
        src.unmap().unwrap();

        ColorConverter::new(&device).convert(&src, &dst).unwrap();
        assert_eq!(dst.read_back().unwrap(), vec![7u8; 6]);
    }
}
