use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use venc_graphics_api::backends::TextureId;
use venc_graphics_api::Texture;

use crate::backends::{EncodeApi, MappedHandle, RegisteredHandle, SessionHandle};
use crate::error::{BinderError, Error, Result};

/// Whether a registered texture stays mapped across frames or is
/// remapped around every encode call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MapPolicy {
    /// Map once after registration and reuse the mapping for every
    /// frame. The input texture contents still update per frame.
    #[default]
    Persistent,
    /// Map before each encode and unmap right after it.
    PerFrame,
}

struct Binding {
    registered: RegisteredHandle,
    mapped: Option<MappedHandle>,
}

/// Tracks which textures are registered with the encoder and which of
/// them hold an outstanding input mapping.
///
/// Registration is keyed by texture identity: registering the same
/// texture twice is an error, as is unregistering while a mapping is
/// outstanding. On drop, anything still bound is unwound in order,
/// unmap first.
pub struct ResourceBinder {
    api: Arc<dyn EncodeApi>,
    session: SessionHandle,
    bindings: HashMap<TextureId, Binding>,
}

impl ResourceBinder {
    pub fn new(api: Arc<dyn EncodeApi>, session: SessionHandle) -> Self {
        Self {
            api,
            session,
            bindings: HashMap::new(),
        }
    }

    pub fn is_registered(&self, texture: &Texture) -> bool {
        self.bindings.contains_key(&texture.global_id())
    }

    /// Make `texture` visible to the encoder.
    pub fn register(&mut self, texture: &Texture) -> Result<RegisteredHandle> {
        let id = texture.global_id();
        if self.bindings.contains_key(&id) {
            return Err(Error::Binder(BinderError::AlreadyRegistered(id)));
        }
        let registered = self.api.register_resource(self.session, texture)?;
        self.bindings.insert(
            id,
            Binding {
                registered,
                mapped: None,
            },
        );
        Ok(registered)
    }

    /// Map a registered texture as encode input. At most one mapping
    /// per texture may be outstanding.
    pub fn map(&mut self, texture: &Texture) -> Result<MappedHandle> {
        let id = texture.global_id();
        let binding = self
            .bindings
            .get_mut(&id)
            .ok_or(Error::Binder(BinderError::NotRegistered(id)))?;
        if binding.mapped.is_some() {
            return Err(Error::Binder(BinderError::AlreadyMapped(id)));
        }
        let mapped = self.api.map_resource(self.session, binding.registered)?;
        binding.mapped = Some(mapped);
        Ok(mapped)
    }

    pub fn unmap(&mut self, texture: &Texture) -> Result<()> {
        let id = texture.global_id();
        let binding = self
            .bindings
            .get_mut(&id)
            .ok_or(Error::Binder(BinderError::NotRegistered(id)))?;
        let mapped = binding
            .mapped
            .take()
            .ok_or(Error::Binder(BinderError::NotMapped(id)))?;
        self.api.unmap_resource(self.session, mapped)
    }

    /// Remove `texture` from the encoder. Rejected while the texture
    /// holds an outstanding mapping.
    pub fn unregister(&mut self, texture: &Texture) -> Result<()> {
        let id = texture.global_id();
        let binding = self
            .bindings
            .get(&id)
            .ok_or(Error::Binder(BinderError::NotRegistered(id)))?;
        if binding.mapped.is_some() {
            return Err(Error::Binder(BinderError::StillMapped(id)));
        }
        let registered = binding.registered;
        self.api.unregister_resource(self.session, registered)?;
        self.bindings.remove(&id);
        Ok(())
    }

    /// Unmap and unregister everything still bound, in that order.
    pub fn release_all(&mut self) -> Result<()> {
        for (id, binding) in self.bindings.drain() {
            if let Some(mapped) = binding.mapped {
                if let Err(err) = self.api.unmap_resource(self.session, mapped) {
                    warn!("failed to unmap texture {id}: {err}");
                }
            }
            self.api.unregister_resource(self.session, binding.registered)?;
        }
        Ok(())
    }
}

impl Drop for ResourceBinder {
    fn drop(&mut self) {
        if let Err(err) = self.release_all() {
            warn!("failed to release encoder bindings: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::NullEncodeApi;
    use venc_graphics_api::types::{Extents2D, Format, ResourceUsage, TextureDef};
    use venc_graphics_api::DeviceContext;

    fn setup() -> (Arc<NullEncodeApi>, ResourceBinder, Texture) {
        let api = Arc::new(NullEncodeApi::new());
        let device = DeviceContext::open_software().unwrap();
        let session = api.open_session(&device).unwrap();
        let texture = device
            .create_texture(&TextureDef {
                extents: Extents2D::new(4, 4),
                format: Format::NV12,
                usage: ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        let binder = ResourceBinder::new(api.clone(), session);
        (api, binder, texture)
    }

    #[test]
    fn double_registration_is_rejected() {
        let (_api, mut binder, texture) = setup();
        binder.register(&texture).unwrap();
        assert!(matches!(
            binder.register(&texture),
            Err(Error::Binder(BinderError::AlreadyRegistered(_)))
        ));
    }

    #[test]
    fn unregister_while_mapped_is_rejected() {
        let (_api, mut binder, texture) = setup();
        binder.register(&texture).unwrap();
        binder.map(&texture).unwrap();
        assert!(matches!(
            binder.unregister(&texture),
            Err(Error::Binder(BinderError::StillMapped(_)))
        ));
        binder.unmap(&texture).unwrap();
        binder.unregister(&texture).unwrap();
    }

    #[test]
    fn second_mapping_is_rejected() {
        let (_api, mut binder, texture) = setup();
        binder.register(&texture).unwrap();
        binder.map(&texture).unwrap();
        assert!(matches!(
            binder.map(&texture),
            Err(Error::Binder(BinderError::AlreadyMapped(_)))
        ));
    }

    #[test]
    fn map_requires_registration() {
        let (_api, mut binder, texture) = setup();
        assert!(matches!(
            binder.map(&texture),
            Err(Error::Binder(BinderError::NotRegistered(_)))
        ));
    }

    #[test]
    fn release_all_unwinds_outstanding_mappings() {
        let (_api, mut binder, texture) = setup();
        binder.register(&texture).unwrap();
        binder.map(&texture).unwrap();
        binder.release_all().unwrap();
        assert!(!binder.is_registered(&texture));
    }
}
