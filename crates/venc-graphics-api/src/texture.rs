use std::sync::Arc;

use crate::backends::{MappedRegion, TextureId};
use crate::device_context::DeviceContext;
use crate::error::GfxResult;
use crate::types::{Extents2D, Format, TextureDef};

struct TextureInner {
    device: DeviceContext,
    id: TextureId,
    def: TextureDef,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        self.device.backend().destroy_texture(self.id);
    }
}

/// A device texture. Clones share the same underlying resource; the
/// backend object is destroyed when the last clone drops.
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    pub(crate) fn new(device: &DeviceContext, id: TextureId, def: TextureDef) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                device: device.clone(),
                id,
                def,
            }),
        }
    }

    /// Stable identity of the underlying resource, used to enforce
    /// register-once semantics downstream.
    pub fn global_id(&self) -> TextureId {
        self.inner.id
    }

    pub fn definition(&self) -> &TextureDef {
        &self.inner.def
    }

    pub fn extents(&self) -> Extents2D {
        self.inner.def.extents
    }

    pub fn format(&self) -> Format {
        self.inner.def.format
    }

    /// Map for CPU write. The region stays valid until [`Self::unmap`].
    pub fn map(&self) -> GfxResult<MappedRegion> {
        self.inner.device.backend().map(self.inner.id)
    }

    pub fn unmap(&self) -> GfxResult<()> {
        self.inner.device.backend().unmap(self.inner.id)
    }

    /// Backend-native object handle for external registration.
    pub fn native_handle(&self) -> GfxResult<*mut std::ffi::c_void> {
        self.inner.device.backend().native_handle(self.inner.id)
    }

    /// Host-side copy of the current contents (validation path).
    pub fn read_back(&self) -> GfxResult<Vec<u8>> {
        self.inner.device.backend().read_back(self.inner.id)
    }
}
