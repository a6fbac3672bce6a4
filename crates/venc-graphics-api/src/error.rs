use thiserror::Error;

/// Native status code reported alongside a device failure. Zero means
/// the backend had no native code for the condition.
pub type NativeStatus = i32;

/// Device or resource creation failure.
///
/// Device errors are non-transient (missing driver, no adapter,
/// resource exhaustion) and are never retried.
#[derive(Error, Debug)]
#[error("{message} (native status {status})")]
pub struct GfxError {
    pub message: String,
    pub status: NativeStatus,
}

impl GfxError {
    pub fn new(message: impl Into<String>, status: NativeStatus) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

pub type GfxResult<T> = Result<T, GfxError>;
