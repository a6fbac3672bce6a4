use std::sync::Arc;

use log::info;

use crate::backends::{DeviceBackend, SoftwareBackend};
use crate::error::GfxResult;
use crate::texture::Texture;
use crate::types::TextureDef;

pub(crate) struct DeviceContextInner {
    pub(crate) backend: Box<dyn DeviceBackend>,
}

/// Owns the graphics device and its immediate execution context.
///
/// Cloning is cheap and shares the same device; the device is released
/// when the last clone drops, after every texture created from it.
#[derive(Clone)]
pub struct DeviceContext {
    inner: Arc<DeviceContextInner>,
}

impl DeviceContext {
    /// Select an adapter and create the device on it.
    pub fn open(backend: Box<dyn DeviceBackend>) -> GfxResult<Self> {
        info!("GPU in use: {}", backend.adapter_name());
        Ok(Self {
            inner: Arc::new(DeviceContextInner { backend }),
        })
    }

    /// Open a device backed by host memory (no GPU API required).
    pub fn open_software() -> GfxResult<Self> {
        Self::open(Box::new(SoftwareBackend::new()))
    }

    pub fn adapter_name(&self) -> &str {
        self.inner.backend.adapter_name()
    }

    pub fn create_texture(&self, def: &TextureDef) -> GfxResult<Texture> {
        let id = self.inner.backend.create_texture(def)?;
        Ok(Texture::new(self, id, *def))
    }

    /// Backend-native device object for external consumers.
    pub fn native_device(&self) -> GfxResult<*mut std::ffi::c_void> {
        self.inner.backend.native_device()
    }

    pub(crate) fn backend(&self) -> &dyn DeviceBackend {
        self.inner.backend.as_ref()
    }
}
