use crate::error::GfxResult;
use crate::types::TextureDef;

/// Software device backend.
pub mod software;

pub use software::SoftwareBackend;

/// Identifies one texture inside a backend.
pub type TextureId = u64;

/// Pointer into a mapped texture, valid until the matching `unmap`.
#[derive(Debug)]
pub struct MappedRegion {
    pub ptr: *mut u8,
    pub size_in_bytes: usize,
    pub row_pitch: u32,
}

impl MappedRegion {
    /// Copy `data` to the start of the mapped region.
    ///
    /// Fails if `data` does not fit; partial writes are not performed.
    pub fn write(&mut self, data: &[u8]) -> GfxResult<()> {
        if data.len() > self.size_in_bytes {
            return Err(crate::GfxError::new(
                format!(
                    "mapped write of {} bytes exceeds region of {} bytes",
                    data.len(),
                    self.size_in_bytes
                ),
                0,
            ));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr, data.len());
        }
        Ok(())
    }
}

/// One graphics device plus its immediate execution context.
///
/// Every call is blocking from the caller's point of view; a failure
/// carries the backend's native status code and is fatal.
pub trait DeviceBackend: Send + Sync {
    /// Human-readable adapter description, reported once at open.
    fn adapter_name(&self) -> &str;

    fn create_texture(&self, def: &TextureDef) -> GfxResult<TextureId>;

    fn destroy_texture(&self, id: TextureId);

    /// Map a staging texture for CPU write.
    fn map(&self, id: TextureId) -> GfxResult<MappedRegion>;

    fn unmap(&self, id: TextureId) -> GfxResult<()>;

    /// Device-executed packed-to-planar conversion, same extents.
    ///
    /// The source must be unmapped; converting out of a texture that is
    /// still mapped is rejected.
    fn convert(&self, src: TextureId, dst: TextureId) -> GfxResult<()>;

    /// Plain resource copy between textures of identical definition
    /// (the conversion bypass path).
    fn copy_resource(&self, src: TextureId, dst: TextureId) -> GfxResult<()>;

    /// Backend-native object for `src`, suitable for registration with
    /// an external consumer such as a hardware encoder.
    fn native_handle(&self, id: TextureId) -> GfxResult<*mut std::ffi::c_void>;

    /// Backend-native device object, used when opening an encode
    /// session against this device.
    fn native_device(&self) -> GfxResult<*mut std::ffi::c_void>;

    /// Read a texture back into host memory. Intended for conversion
    /// validation, not the per-frame path.
    fn read_back(&self, id: TextureId) -> GfxResult<Vec<u8>>;
}
