//! Graphics device abstraction for the hardware encode pipeline.
//!
//! A [`DeviceContext`] is the only holder of GPU-object creation
//! authority: it owns the device plus its immediate execution context
//! and hands out [`Texture`] objects. The [`ColorConverter`] runs the
//! packed-RGBA to planar-NV12 transform on the device, between the
//! staging texture write and the encoder submission.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]
// format names follow the native API spelling:
#![allow(non_camel_case_types)]

pub mod backends;
pub mod error;
pub mod types;

mod converter;
pub use converter::*;

mod device_context;
pub use device_context::*;

mod texture;
pub use texture::*;

pub use error::{GfxError, GfxResult};
