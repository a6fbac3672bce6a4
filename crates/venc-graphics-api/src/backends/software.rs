use std::collections::HashMap;
use std::sync::Mutex;

use crate::backends::{DeviceBackend, MappedRegion, TextureId};
use crate::error::{GfxError, GfxResult};
use crate::types::{Format, ResourceUsage, TextureDef};

const STATUS_INVALID_ARG: i32 = -1;
const STATUS_BAD_STATE: i32 = -2;
const STATUS_NOT_FOUND: i32 = -3;

struct TextureSlot {
    def: TextureDef,
    data: Box<[u8]>,
    mapped: bool,
}

#[derive(Default)]
struct SoftwareBackendInner {
    textures: HashMap<TextureId, TextureSlot>,
    next_id: TextureId,
}

/// Host-memory device used on machines without a GPU API and by the
/// test suite. Textures are plain byte buffers; the converter runs the
/// BT.601 matrix on the CPU. Mapped-state tracking mirrors the real
/// device contract so ordering violations surface as errors instead of
/// corruption.
#[derive(Default)]
pub struct SoftwareBackend {
    inner: Mutex<SoftwareBackendInner>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slot<T>(
        &self,
        id: TextureId,
        f: impl FnOnce(&mut TextureSlot) -> GfxResult<T>,
    ) -> GfxResult<T> {
        let inner = &mut *self.inner.lock().unwrap();
        let slot = inner
            .textures
            .get_mut(&id)
            .ok_or_else(|| GfxError::new(format!("unknown texture {id}"), STATUS_NOT_FOUND))?;
        f(slot)
    }
}

impl DeviceBackend for SoftwareBackend {
    fn adapter_name(&self) -> &str {
        "software rasterizer"
    }

    fn create_texture(&self, def: &TextureDef) -> GfxResult<TextureId> {
        if def.extents.width == 0 || def.extents.height == 0 {
            return Err(GfxError::new(
                "texture extents must be non-zero",
                STATUS_INVALID_ARG,
            ));
        }
        if def.format.is_planar() && (def.extents.width % 2 != 0 || def.extents.height % 2 != 0) {
            return Err(GfxError::new(
                "planar formats require even extents",
                STATUS_INVALID_ARG,
            ));
        }
        let inner = &mut *self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.textures.insert(
            id,
            TextureSlot {
                def: *def,
                data: vec![0u8; def.size_in_bytes()].into_boxed_slice(),
                mapped: false,
            },
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) {
        let inner = &mut *self.inner.lock().unwrap();
        inner.textures.remove(&id);
    }

    fn map(&self, id: TextureId) -> GfxResult<MappedRegion> {
        self.with_slot(id, |slot| {
            if !slot.def.usage.contains(ResourceUsage::AS_STAGING) {
                return Err(GfxError::new(
                    "texture was not created with staging usage",
                    STATUS_INVALID_ARG,
                ));
            }
            if slot.mapped {
                return Err(GfxError::new(
                    format!("texture {id} is already mapped"),
                    STATUS_BAD_STATE,
                ));
            }
            slot.mapped = true;
            Ok(MappedRegion {
                ptr: slot.data.as_mut_ptr(),
                size_in_bytes: slot.data.len(),
                row_pitch: slot.def.format.row_pitch(slot.def.extents.width),
            })
        })
    }

    fn unmap(&self, id: TextureId) -> GfxResult<()> {
        self.with_slot(id, |slot| {
            if !slot.mapped {
                return Err(GfxError::new(
                    format!("texture {id} is not mapped"),
                    STATUS_BAD_STATE,
                ));
            }
            slot.mapped = false;
            Ok(())
        })
    }

    fn convert(&self, src: TextureId, dst: TextureId) -> GfxResult<()> {
        let inner = &mut *self.inner.lock().unwrap();
        if !inner.textures.contains_key(&src) || !inner.textures.contains_key(&dst) {
            return Err(GfxError::new("unknown texture", STATUS_NOT_FOUND));
        }

        let src_slot = &inner.textures[&src];
        let dst_slot = &inner.textures[&dst];
        if src_slot.mapped {
            return Err(GfxError::new(
                "conversion source is still mapped",
                STATUS_BAD_STATE,
            ));
        }
        if src_slot.def.extents != dst_slot.def.extents {
            return Err(GfxError::new(
                "conversion does not resize",
                STATUS_INVALID_ARG,
            ));
        }
        if dst_slot.def.format != Format::NV12 {
            return Err(GfxError::new(
                "conversion target must be NV12",
                STATUS_INVALID_ARG,
            ));
        }

        let def = src_slot.def;
        let converted = match def.format {
            Format::NV12 => src_slot.data.to_vec(),
            packed => rgba_to_nv12(
                &src_slot.data,
                def.extents.width as usize,
                def.extents.height as usize,
                packed,
            ),
        };

        let dst_slot = inner
            .textures
            .get_mut(&dst)
            .ok_or_else(|| GfxError::new("unknown texture", STATUS_NOT_FOUND))?;
        dst_slot.data.copy_from_slice(&converted);
        Ok(())
    }

    fn copy_resource(&self, src: TextureId, dst: TextureId) -> GfxResult<()> {
        let inner = &mut *self.inner.lock().unwrap();
        let src_slot = inner
            .textures
            .get(&src)
            .ok_or_else(|| GfxError::new("unknown source texture", STATUS_NOT_FOUND))?;
        if src_slot.mapped {
            return Err(GfxError::new(
                "copy source is still mapped",
                STATUS_BAD_STATE,
            ));
        }
        let bytes = src_slot.data.to_vec();
        let fmt = src_slot.def.format;
        let dst_slot = inner
            .textures
            .get_mut(&dst)
            .ok_or_else(|| GfxError::new("unknown destination texture", STATUS_NOT_FOUND))?;
        if dst_slot.def.format != fmt || dst_slot.data.len() != bytes.len() {
            return Err(GfxError::new(
                "copy requires identical texture definitions",
                STATUS_INVALID_ARG,
            ));
        }
        dst_slot.data.copy_from_slice(&bytes);
        Ok(())
    }

    fn native_handle(&self, id: TextureId) -> GfxResult<*mut std::ffi::c_void> {
        self.with_slot(id, |slot| Ok(slot.data.as_mut_ptr().cast()))
    }

    fn native_device(&self) -> GfxResult<*mut std::ffi::c_void> {
        Err(GfxError::new(
            "software device has no native device object",
            STATUS_INVALID_ARG,
        ))
    }

    fn read_back(&self, id: TextureId) -> GfxResult<Vec<u8>> {
        self.with_slot(id, |slot| Ok(slot.data.to_vec()))
    }
}

/// Integer BT.601 limited-range conversion, 2x2 chroma averaging.
fn rgba_to_nv12(src: &[u8], width: usize, height: usize, format: Format) -> Vec<u8> {
    let (r_off, b_off) = match format {
        Format::R8G8B8A8_UNORM => (0, 2),
        Format::B8G8R8A8_UNORM => (2, 0),
        Format::NV12 => unreachable!("already planar"),
    };

    let mut out = vec![0u8; width * height * 3 / 2];
    let (luma, chroma) = out.split_at_mut(width * height);

    for y in 0..height {
        for x in 0..width {
            let p = (y * width + x) * 4;
            let r = i32::from(src[p + r_off]);
            let g = i32::from(src[p + 1]);
            let b = i32::from(src[p + b_off]);
            luma[y * width + x] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as u8;
        }
    }

    for cy in 0..height / 2 {
        for cx in 0..width / 2 {
            let mut r = 0i32;
            let mut g = 0i32;
            let mut b = 0i32;
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let p = ((cy * 2 + dy) * width + cx * 2 + dx) * 4;
                r += i32::from(src[p + r_off]);
                g += i32::from(src[p + 1]);
                b += i32::from(src[p + b_off]);
            }
            r /= 4;
            g /= 4;
            b /= 4;
            let u = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128) as u8;
            let v = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128) as u8;
            chroma[(cy * (width / 2) + cx) * 2] = u;
            chroma[(cy * (width / 2) + cx) * 2 + 1] = v;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Extents2D;

    fn staging_def() -> TextureDef {
        TextureDef {
            extents: Extents2D::new(4, 4),
            format: Format::R8G8B8A8_UNORM,
            usage: ResourceUsage::AS_STAGING,
        }
    }

    #[test]
    fn map_twice_is_rejected() {
        let backend = SoftwareBackend::new();
        let id = backend.create_texture(&staging_def()).unwrap();
        let _region = backend.map(id).unwrap();
        assert!(backend.map(id).is_err());
        backend.unmap(id).unwrap();
    }

    #[test]
    fn unmap_without_map_is_rejected() {
        let backend = SoftwareBackend::new();
        let id = backend.create_texture(&staging_def()).unwrap();
        assert!(backend.unmap(id).is_err());
    }

    #[test]
    fn convert_rejects_mapped_source() {
        let backend = SoftwareBackend::new();
        let src = backend.create_texture(&staging_def()).unwrap();
        let dst = backend
            .create_texture(&TextureDef {
                extents: Extents2D::new(4, 4),
                format: Format::NV12,
                usage: ResourceUsage::AS_RENDER_TARGET | ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        let _region = backend.map(src).unwrap();
        assert!(backend.convert(src, dst).is_err());
        backend.unmap(src).unwrap();
        backend.convert(src, dst).unwrap();
    }

    #[test]
    fn white_converts_to_peak_luma() {
        // BT.601 limited range: white maps to Y=235, U=V=128.
        let converted = rgba_to_nv12(&[255u8; 2 * 2 * 4], 2, 2, Format::R8G8B8A8_UNORM);
        assert_eq!(&converted[..4], &[235, 235, 235, 235]);
        assert_eq!(&converted[4..], &[128, 128]);
    }

    #[test]
    fn black_converts_to_floor_luma() {
        let mut src = vec![0u8; 2 * 2 * 4];
        for p in src.chunks_exact_mut(4) {
            p[3] = 255;
        }
        let converted = rgba_to_nv12(&src, 2, 2, Format::B8G8R8A8_UNORM);
        assert_eq!(&converted[..4], &[16, 16, 16, 16]);
        assert_eq!(&converted[4..], &[128, 128]);
    }

    #[test]
    fn planar_texture_requires_even_extents() {
        let backend = SoftwareBackend::new();
        let err = backend
            .create_texture(&TextureDef {
                extents: Extents2D::new(3, 3),
                format: Format::NV12,
                usage: ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap_err();
        assert_eq!(err.status, STATUS_INVALID_ARG);
    }
}
