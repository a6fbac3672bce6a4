use thiserror::Error;

use venc_graphics_api::GfxError;

/// Session lifecycle failures. All fatal to the session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no capable encode device available")]
    NoDevice,
    #[error("encoder interface version {required:#x} required, driver supports {supported:#x}")]
    VersionMismatch { required: u32, supported: u32 },
    #[error("device cannot encode the requested configuration: {0}")]
    NoCapability(String),
    #[error("session is not initialized")]
    NotInitialized,
    #[error("session is already initialized")]
    AlreadyInitialized,
    #[error("session is closed")]
    Closed,
    #[error("encoder call {call} failed with status {status}")]
    Native { call: &'static str, status: i32 },
}

/// Resource registration failures.
#[derive(Error, Debug)]
pub enum BinderError {
    #[error("texture {0} is already registered")]
    AlreadyRegistered(u64),
    #[error("texture {0} is already mapped as encode input")]
    AlreadyMapped(u64),
    #[error("cannot unregister texture {0} while a mapping is outstanding")]
    StillMapped(u64),
    #[error("texture {0} is not registered")]
    NotRegistered(u64),
    #[error("texture {0} holds no outstanding mapping")]
    NotMapped(u64),
}

/// Compressed output retrieval failures.
#[derive(Error, Debug)]
pub enum BitstreamError {
    #[error("no encoded packet is ready")]
    NotReady,
    #[error("no output buffer exists")]
    NoBuffer,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("device error: {0}")]
    Device(#[from] GfxError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("binder error: {0}")]
    Binder(#[from] BinderError),
    #[error("bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
