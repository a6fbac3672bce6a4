//! Hardware video encoder sessions and the synchronous frame pipeline.
//!
//! The crate is built around one seam: every encoder interaction goes
//! through an [`EncodeApi`](backends::EncodeApi) object. The
//! [`NvEncodeApi`](backends::NvEncodeApi) backend drives the NVIDIA
//! driver library; the [`NullEncodeApi`](backends::NullEncodeApi)
//! backend implements the same state machine in process and backs the
//! test suite.
//!
//! A typical pipeline is an [`EncoderSession`] plus a
//! [`ResourceBinder`] and a [`BitstreamSink`], assembled and driven by
//! [`FrameLoop`].

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

pub mod backends;
pub mod config;
pub mod error;

mod binder;
pub use binder::*;

mod bitstream;
pub use bitstream::*;

mod frame_loop;
pub use frame_loop::*;

mod session;
pub use session::*;

pub use config::EncoderConfig;
pub use error::{BinderError, BitstreamError, Error, Result, SessionError};
