#![allow(unsafe_code)]

use std::ops::Deref;

use libloading::Library;
use log::warn;

use super::sys::{
    NvEncodeApiCreateInstanceFn, NvEncodeApiGetMaxSupportedVersionFn, NVENC_DLL_NAME,
    NV_ENCODE_API_CREATE_INSTANCE_FN_NAME, NV_ENCODE_API_GET_MAX_SUPPORTED_VERSION_FN_NAME,
};

/// Entry points of the encoder driver library, resolved at runtime so
/// the crate builds and runs on machines without the driver installed.
pub struct NvEncLibrary {
    pub get_max_supported_version: NvEncodeApiGetMaxSupportedVersionFn,
    pub create_instance: NvEncodeApiCreateInstanceFn,

    _dll: Library,
}

impl NvEncLibrary {
    pub fn load() -> Option<Self> {
        match unsafe { Library::new(NVENC_DLL_NAME) } {
            Ok(dll) => {
                fn load_symbol<T: Copy>(dll: &Library, symbol: &[u8]) -> T {
                    unsafe {
                        *dll.get::<T>(symbol)
                            .expect("failed to load encoder entry point")
                            .deref()
                    }
                }
                let get_max_supported_version =
                    load_symbol::<NvEncodeApiGetMaxSupportedVersionFn>(
                        &dll,
                        NV_ENCODE_API_GET_MAX_SUPPORTED_VERSION_FN_NAME,
                    );
                let create_instance = load_symbol::<NvEncodeApiCreateInstanceFn>(
                    &dll,
                    NV_ENCODE_API_CREATE_INSTANCE_FN_NAME,
                );

                Some(Self {
                    get_max_supported_version,
                    create_instance,
                    _dll: dll,
                })
            }
            Err(err) => {
                warn!("encoder library {NVENC_DLL_NAME} not available: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore]
    fn load_driver_library() {
        assert!(NvEncLibrary::load().is_some());
    }
}
