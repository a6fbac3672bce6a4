use std::collections::HashMap;
use std::sync::Mutex;

use venc_graphics_api::{DeviceContext, Texture};

use crate::backends::{
    BitstreamLock, EncodeApi, EncodeParams, MappedHandle, OutputHandle, RegisteredHandle,
    SessionHandle,
};
use crate::config::{ChromaFormat, Codec, EncoderConfig, Preset, RateControlMode, Tuning};
use crate::error::{BitstreamError, Error, Result, SessionError};

/// Interface version the crate targets, `(major << 4) | minor`.
pub(crate) const REQUIRED_VERSION: u32 = (12 << 4) | 2;

const STATUS_BAD_HANDLE: i32 = 8;
const STATUS_BAD_ORDER: i32 = 21;

struct NullSession {
    initialized: Option<(EncoderConfig, EncodeParams)>,
    registered: HashMap<u64, u64>,
    mapped: HashMap<u64, u64>,
    outputs: HashMap<u64, Option<Box<[u8]>>>,
    locked: Option<u64>,
    frames_encoded: u64,
}

#[derive(Default)]
struct NullState {
    next_handle: u64,
    sessions: HashMap<u64, NullSession>,
    sessions_opened: u64,
    version_queries: u64,
    teardown_calls: Vec<&'static str>,
}

/// Deterministic in-process encoder.
///
/// Implements the full session/registration/encode state machine with
/// no device behind it. Every encoded frame yields one fixed-size
/// packet carrying a start code and the frame index, so tests can check
/// ordering and the one-packet-per-frame property byte for byte.
pub struct NullEncodeApi {
    max_version: u32,
    packet_size: usize,
    codecs: Vec<Codec>,
    presets: Vec<Preset>,
    state: Mutex<NullState>,
}

impl Default for NullEncodeApi {
    fn default() -> Self {
        Self {
            max_version: REQUIRED_VERSION,
            packet_size: 100,
            codecs: vec![Codec::H264, Codec::Hevc],
            presets: vec![Preset::P3, Preset::P4, Preset::P7],
            state: Mutex::default(),
        }
    }
}

impl NullEncodeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the installed driver tops out at `version`.
    pub fn with_max_version(version: u32) -> Self {
        Self {
            max_version: version,
            ..Self::default()
        }
    }

    /// Emit packets of `size` bytes instead of the default 100.
    pub fn with_packet_size(size: usize) -> Self {
        Self {
            packet_size: size,
            ..Self::default()
        }
    }

    /// Advertise no codecs at all.
    pub fn without_codecs() -> Self {
        Self {
            codecs: Vec::new(),
            ..Self::default()
        }
    }

    /// Advertise codecs but no presets for any of them.
    pub fn without_presets() -> Self {
        Self {
            presets: Vec::new(),
            ..Self::default()
        }
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Number of sessions opened so far.
    pub fn sessions_opened(&self) -> u64 {
        self.state.lock().unwrap().sessions_opened
    }

    /// Number of times the driver version was queried.
    pub fn version_queries(&self) -> u64 {
        self.state.lock().unwrap().version_queries
    }

    /// Teardown calls seen so far, in call order. Lets tests assert
    /// that resources are released before the session that owns them.
    pub fn teardown_calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().teardown_calls.clone()
    }

    /// The configuration and parameter block the session was
    /// initialized with, if it was.
    pub fn recorded_initialization(
        &self,
        session: SessionHandle,
    ) -> Option<(EncoderConfig, EncodeParams)> {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .get(&session.0)
            .and_then(|s| s.initialized.clone())
    }

    pub fn frames_encoded(&self, session: SessionHandle) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .get(&session.0)
            .map_or(0, |s| s.frames_encoded)
    }

    fn bad_order(call: &'static str) -> Error {
        Error::Session(SessionError::Native {
            call,
            status: STATUS_BAD_ORDER,
        })
    }

    fn bad_handle(call: &'static str) -> Error {
        Error::Session(SessionError::Native {
            call,
            status: STATUS_BAD_HANDLE,
        })
    }

    fn with_session<T>(
        &self,
        call: &'static str,
        session: SessionHandle,
        f: impl FnOnce(&mut NullSession, &mut u64) -> Result<T>,
    ) -> Result<T> {
        let state = &mut *self.state.lock().unwrap();
        let NullState {
            next_handle,
            sessions,
            ..
        } = state;
        let s = sessions
            .get_mut(&session.0)
            .ok_or_else(|| Self::bad_handle(call))?;
        f(s, next_handle)
    }
}

impl EncodeApi for NullEncodeApi {
    fn name(&self) -> &str {
        "null"
    }

    fn required_version(&self) -> u32 {
        REQUIRED_VERSION
    }

    fn max_supported_version(&self) -> Result<u32> {
        self.state.lock().unwrap().version_queries += 1;
        Ok(self.max_version)
    }

    fn open_session(&self, _device: &DeviceContext) -> Result<SessionHandle> {
        let state = &mut *self.state.lock().unwrap();
        state.next_handle += 1;
        state.sessions_opened += 1;
        state.sessions.insert(
            state.next_handle,
            NullSession {
                initialized: None,
                registered: HashMap::new(),
                mapped: HashMap::new(),
                outputs: HashMap::new(),
                locked: None,
                frames_encoded: 0,
            },
        );
        Ok(SessionHandle(state.next_handle))
    }

    fn encode_codecs(&self, session: SessionHandle) -> Result<Vec<Codec>> {
        self.with_session("encode_codecs", session, |_, _| Ok(self.codecs.clone()))
    }

    fn encode_presets(&self, session: SessionHandle, _codec: Codec) -> Result<Vec<Preset>> {
        self.with_session("encode_presets", session, |_, _| Ok(self.presets.clone()))
    }

    fn preset_defaults(
        &self,
        session: SessionHandle,
        _codec: Codec,
        _preset: Preset,
        _tuning: Tuning,
    ) -> Result<EncodeParams> {
        // Streaming-unfriendly defaults, as real preset tables have:
        // the session is expected to override them.
        self.with_session("preset_defaults", session, |_, _| {
            Ok(EncodeParams {
                rate_control: RateControlMode::Vbr,
                average_bitrate: 5_000_000,
                gop_length: 250,
                chroma_format: ChromaFormat::Yuv420,
            })
        })
    }

    fn initialize_session(
        &self,
        session: SessionHandle,
        config: &EncoderConfig,
        params: &EncodeParams,
    ) -> Result<()> {
        self.with_session("initialize_session", session, |s, _| {
            s.initialized = Some((config.clone(), *params));
            Ok(())
        })
    }

    fn create_bitstream_buffer(&self, session: SessionHandle) -> Result<OutputHandle> {
        self.with_session("create_bitstream_buffer", session, |s, next_handle| {
            *next_handle += 1;
            s.outputs.insert(*next_handle, None);
            Ok(OutputHandle(*next_handle))
        })
    }

    fn destroy_bitstream_buffer(&self, session: SessionHandle, output: OutputHandle) -> Result<()> {
        self.with_session("destroy_bitstream_buffer", session, |s, _| {
            s.outputs
                .remove(&output.0)
                .map(|_| ())
                .ok_or_else(|| Self::bad_handle("destroy_bitstream_buffer"))
        })?;
        self.state
            .lock()
            .unwrap()
            .teardown_calls
            .push("destroy_bitstream_buffer");
        Ok(())
    }

    fn register_resource(
        &self,
        session: SessionHandle,
        texture: &Texture,
    ) -> Result<RegisteredHandle> {
        let texture_id = texture.global_id();
        self.with_session("register_resource", session, |s, next_handle| {
            *next_handle += 1;
            s.registered.insert(*next_handle, texture_id);
            Ok(RegisteredHandle(*next_handle))
        })
    }

    fn unregister_resource(
        &self,
        session: SessionHandle,
        registered: RegisteredHandle,
    ) -> Result<()> {
        self.with_session("unregister_resource", session, |s, _| {
            if s.mapped.values().any(|r| *r == registered.0) {
                return Err(Self::bad_order("unregister_resource"));
            }
            s.registered
                .remove(&registered.0)
                .map(|_| ())
                .ok_or_else(|| Self::bad_handle("unregister_resource"))
        })?;
        self.state
            .lock()
            .unwrap()
            .teardown_calls
            .push("unregister_resource");
        Ok(())
    }

    fn map_resource(
        &self,
        session: SessionHandle,
        registered: RegisteredHandle,
    ) -> Result<MappedHandle> {
        self.with_session("map_resource", session, |s, next_handle| {
            if !s.registered.contains_key(&registered.0) {
                return Err(Self::bad_handle("map_resource"));
            }
            *next_handle += 1;
            s.mapped.insert(*next_handle, registered.0);
            Ok(MappedHandle(*next_handle))
        })
    }

    fn unmap_resource(&self, session: SessionHandle, mapped: MappedHandle) -> Result<()> {
        self.with_session("unmap_resource", session, |s, _| {
            s.mapped
                .remove(&mapped.0)
                .map(|_| ())
                .ok_or_else(|| Self::bad_handle("unmap_resource"))
        })?;
        self.state
            .lock()
            .unwrap()
            .teardown_calls
            .push("unmap_resource");
        Ok(())
    }

    fn encode_picture(
        &self,
        session: SessionHandle,
        mapped: MappedHandle,
        output: OutputHandle,
    ) -> Result<()> {
        let packet_size = self.packet_size;
        self.with_session("encode_picture", session, |s, _| {
            if s.initialized.is_none() {
                return Err(Error::Session(SessionError::NotInitialized));
            }
            if !s.mapped.contains_key(&mapped.0) {
                return Err(Self::bad_handle("encode_picture"));
            }
            let slot = s
                .outputs
                .get_mut(&output.0)
                .ok_or_else(|| Self::bad_handle("encode_picture"))?;

            let mut packet = vec![0u8; packet_size];
            let header_len = packet.len().min(4);
            packet[..header_len].copy_from_slice(&[0, 0, 0, 1][..header_len]);
            if packet.len() >= 12 {
                packet[4..12].copy_from_slice(&s.frames_encoded.to_be_bytes());
            }
            *slot = Some(packet.into_boxed_slice());
            s.frames_encoded += 1;
            Ok(())
        })
    }

    fn lock_bitstream(
        &self,
        session: SessionHandle,
        output: OutputHandle,
        _blocking: bool,
    ) -> Result<BitstreamLock> {
        self.with_session("lock_bitstream", session, |s, _| {
            let slot = s
                .outputs
                .get(&output.0)
                .ok_or_else(|| Self::bad_handle("lock_bitstream"))?;
            match slot {
                Some(packet) => {
                    s.locked = Some(output.0);
                    Ok(BitstreamLock {
                        ptr: packet.as_ptr(),
                        size_in_bytes: packet.len() as u32,
                    })
                }
                None => Err(Error::Bitstream(BitstreamError::NotReady)),
            }
        })
    }

    fn unlock_bitstream(&self, session: SessionHandle, output: OutputHandle) -> Result<()> {
        self.with_session("unlock_bitstream", session, |s, _| {
            if s.locked != Some(output.0) {
                return Err(Self::bad_order("unlock_bitstream"));
            }
            s.locked = None;
            if let Some(slot) = s.outputs.get_mut(&output.0) {
                *slot = None;
            }
            Ok(())
        })
    }

    fn destroy_session(&self, session: SessionHandle) -> Result<()> {
        let state = &mut *self.state.lock().unwrap();
        state
            .sessions
            .remove(&session.0)
            .map(|_| ())
            .ok_or_else(|| Self::bad_handle("destroy_session"))?;
        state.teardown_calls.push("destroy_session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (NullEncodeApi, DeviceContext, SessionHandle) {
        let api = NullEncodeApi::new();
        let device = DeviceContext::open_software().unwrap();
        let session = api.open_session(&device).unwrap();
        (api, device, session)
    }

    #[test]
    fn encode_before_initialize_is_rejected() {
        let (api, device, session) = open();
        let texture = device
            .create_texture(&venc_graphics_api::types::TextureDef {
                extents: venc_graphics_api::types::Extents2D::new(4, 4),
                format: venc_graphics_api::types::Format::NV12,
                usage: venc_graphics_api::types::ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        let registered = api.register_resource(session, &texture).unwrap();
        let mapped = api.map_resource(session, registered).unwrap();
        let output = api.create_bitstream_buffer(session).unwrap();
        assert!(matches!(
            api.encode_picture(session, mapped, output),
            Err(Error::Session(SessionError::NotInitialized))
        ));
    }

    #[test]
    fn lock_before_encode_reports_not_ready() {
        let (api, _device, session) = open();
        let output = api.create_bitstream_buffer(session).unwrap();
        assert!(matches!(
            api.lock_bitstream(session, output, false),
            Err(Error::Bitstream(BitstreamError::NotReady))
        ));
    }

    #[test]
    fn packets_carry_start_code_and_frame_index() {
        let (api, device, session) = open();
        api.initialize_session(
            session,
            &EncoderConfig::default(),
            &EncodeParams {
                rate_control: RateControlMode::Cbr,
                average_bitrate: 25_000,
                gop_length: 10,
                chroma_format: ChromaFormat::Yuv420,
            },
        )
        .unwrap();
        let texture = device
            .create_texture(&venc_graphics_api::types::TextureDef {
                extents: venc_graphics_api::types::Extents2D::new(4, 4),
                format: venc_graphics_api::types::Format::NV12,
                usage: venc_graphics_api::types::ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        let registered = api.register_resource(session, &texture).unwrap();
        let mapped = api.map_resource(session, registered).unwrap();
        let output = api.create_bitstream_buffer(session).unwrap();

        for frame in 0u64..3 {
            api.encode_picture(session, mapped, output).unwrap();
            let lock = api.lock_bitstream(session, output, true).unwrap();
            let bytes =
                unsafe { std::slice::from_raw_parts(lock.ptr, lock.size_in_bytes as usize) };
            assert_eq!(bytes.len(), 100);
            assert_eq!(&bytes[..4], &[0, 0, 0, 1]);
            assert_eq!(&bytes[4..12], &frame.to_be_bytes());
            api.unlock_bitstream(session, output).unwrap();
        }
        assert_eq!(api.frames_encoded(session), 3);
    }

    #[test]
    fn unregister_with_outstanding_mapping_is_rejected() {
        let (api, device, session) = open();
        let texture = device
            .create_texture(&venc_graphics_api::types::TextureDef {
                extents: venc_graphics_api::types::Extents2D::new(4, 4),
                format: venc_graphics_api::types::Format::NV12,
                usage: venc_graphics_api::types::ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        let registered = api.register_resource(session, &texture).unwrap();
        let mapped = api.map_resource(session, registered).unwrap();
        assert!(api.unregister_resource(session, registered).is_err());
        api.unmap_resource(session, mapped).unwrap();
        api.unregister_resource(session, registered).unwrap();
    }
}
