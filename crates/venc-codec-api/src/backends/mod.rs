use venc_graphics_api::{DeviceContext, Texture};

use crate::config::{ChromaFormat, Codec, EncoderConfig, Preset, RateControlMode, Tuning};
use crate::error::Result;

/// In-process test encoder.
pub mod null;
/// NVIDIA hardware encoder.
pub mod nvenc;

pub use null::NullEncodeApi;
pub use nvenc::NvEncodeApi;

/// Opaque handle to one open encode session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Opaque handle to a graphics resource registered with the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegisteredHandle(pub u64);

/// Opaque handle to a registered resource mapped as encode input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MappedHandle(pub u64);

/// Opaque handle to one compressed output buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputHandle(pub u64);

/// The per-preset parameter block fetched from the encoder, mutated by
/// the session before initialization.
///
/// The flow is fetch, then override, then initialize: the backend fills
/// this from its preset tables and the session replaces only the fields
/// the configuration pins down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeParams {
    pub rate_control: RateControlMode,
    pub average_bitrate: u32,
    pub gop_length: u32,
    pub chroma_format: ChromaFormat,
}

/// View into a locked output buffer. Valid until the matching unlock.
#[derive(Debug)]
pub struct BitstreamLock {
    pub ptr: *const u8,
    pub size_in_bytes: u32,
}

/// One hardware (or simulated) encoder API.
///
/// This is the capability boundary of the crate: sessions, binders and
/// sinks talk to the encoder only through a shared `dyn EncodeApi`, so
/// the whole pipeline runs unchanged against [`NullEncodeApi`] in tests.
///
/// Calls are synchronous; completion of `encode_picture` means the
/// output buffer can be locked without waiting.
pub trait EncodeApi: Send + Sync {
    fn name(&self) -> &str;

    /// Interface version this crate was built against.
    fn required_version(&self) -> u32;

    /// Highest interface version the installed driver supports.
    fn max_supported_version(&self) -> Result<u32>;

    fn open_session(&self, device: &DeviceContext) -> Result<SessionHandle>;

    /// Codecs the device can encode.
    fn encode_codecs(&self, session: SessionHandle) -> Result<Vec<Codec>>;

    /// Presets the device supports for `codec`.
    fn encode_presets(&self, session: SessionHandle, codec: Codec) -> Result<Vec<Preset>>;

    /// Fetch the encoder's own defaults for a preset. The caller
    /// overrides fields on the returned copy before initializing.
    fn preset_defaults(
        &self,
        session: SessionHandle,
        codec: Codec,
        preset: Preset,
        tuning: Tuning,
    ) -> Result<EncodeParams>;

    fn initialize_session(
        &self,
        session: SessionHandle,
        config: &EncoderConfig,
        params: &EncodeParams,
    ) -> Result<()>;

    fn create_bitstream_buffer(&self, session: SessionHandle) -> Result<OutputHandle>;

    fn destroy_bitstream_buffer(&self, session: SessionHandle, output: OutputHandle) -> Result<()>;

    /// Make a graphics texture visible to the encoder.
    fn register_resource(
        &self,
        session: SessionHandle,
        texture: &Texture,
    ) -> Result<RegisteredHandle>;

    fn unregister_resource(&self, session: SessionHandle, registered: RegisteredHandle)
        -> Result<()>;

    fn map_resource(
        &self,
        session: SessionHandle,
        registered: RegisteredHandle,
    ) -> Result<MappedHandle>;

    fn unmap_resource(&self, session: SessionHandle, mapped: MappedHandle) -> Result<()>;

    /// Submit one frame and block until the encoder accepts it.
    fn encode_picture(
        &self,
        session: SessionHandle,
        mapped: MappedHandle,
        output: OutputHandle,
    ) -> Result<()>;

    /// Lock the output buffer for CPU read.
    ///
    /// With `blocking` false the call fails fast when no packet is
    /// pending instead of waiting for one.
    fn lock_bitstream(
        &self,
        session: SessionHandle,
        output: OutputHandle,
        blocking: bool,
    ) -> Result<BitstreamLock>;

    fn unlock_bitstream(&self, session: SessionHandle, output: OutputHandle) -> Result<()>;

    fn destroy_session(&self, session: SessionHandle) -> Result<()>;
}
