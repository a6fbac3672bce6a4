//! Hardware encoder backend over the NVENC driver library.
//!
//! All driver calls go through the function table returned by
//! `NvEncodeAPICreateInstance`. Session, resource and output handles
//! exposed through [`EncodeApi`] wrap the native pointers the driver
//! hands back.

#![allow(unsafe_code)]

mod loader;
pub(crate) mod sys;

use std::collections::HashMap;
use std::os::raw::c_void;
use std::sync::Mutex;

use log::error;

use venc_graphics_api::types::Format;
use venc_graphics_api::{DeviceContext, Texture};

use crate::backends::{
    BitstreamLock, EncodeApi, EncodeParams, MappedHandle, OutputHandle, RegisteredHandle,
    SessionHandle,
};
use crate::config::{ChromaFormat, Codec, EncoderConfig, Preset, RateControlMode, Tuning};
use crate::error::{BitstreamError, Error, Result, SessionError};

use loader::NvEncLibrary;
use sys::{nvenc_status_name, GUID, NVENCSTATUS, NV_ENC_BUFFER_FORMAT, NV_ENC_TUNING_INFO};

struct SessionInfo {
    width: u32,
    height: u32,
    buffer_format: NV_ENC_BUFFER_FORMAT,
}

/// NVENC-backed [`EncodeApi`].
///
/// [`load`](Self::load) returns `None` when the driver library is not
/// installed, so callers can fall back to another backend.
pub struct NvEncodeApi {
    entry: NvEncLibrary,
    functions: Box<sys::NV_ENCODE_API_FUNCTION_LIST>,
    sessions: Mutex<HashMap<u64, SessionInfo>>,
}

// The function table is written once by `NvEncodeAPICreateInstance`
// and read-only afterwards; sessions are externally serialized by the
// single-threaded pipeline.
unsafe impl Send for NvEncodeApi {}
unsafe impl Sync for NvEncodeApi {}

impl NvEncodeApi {
    pub fn load() -> Option<Self> {
        let entry = NvEncLibrary::load()?;
        let mut functions: Box<sys::NV_ENCODE_API_FUNCTION_LIST> =
            unsafe { Box::new(std::mem::zeroed()) };
        functions.version = sys::NV_ENCODE_API_FUNCTION_LIST_VER;
        let status = unsafe { (entry.create_instance)(functions.as_mut()) };
        if status != sys::NV_ENC_SUCCESS {
            error!(
                "NvEncodeAPICreateInstance failed: {} ({status})",
                nvenc_status_name(status)
            );
            return None;
        }
        Some(Self {
            entry,
            functions,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn check(status: NVENCSTATUS, call: &'static str) -> Result<()> {
        match status {
            sys::NV_ENC_SUCCESS => Ok(()),
            sys::NV_ENC_ERR_NO_ENCODE_DEVICE | sys::NV_ENC_ERR_UNSUPPORTED_DEVICE => {
                Err(Error::Session(SessionError::NoDevice))
            }
            status => {
                error!("{call} failed: {} ({status})", nvenc_status_name(status));
                Err(Error::Session(SessionError::Native { call, status }))
            }
        }
    }

    fn missing(call: &'static str) -> Error {
        error!("driver function table does not expose {call}");
        Error::Session(SessionError::Native {
            call,
            status: sys::NV_ENC_ERR_GENERIC,
        })
    }

    fn session_info(&self, session: SessionHandle) -> Result<(u32, u32, NV_ENC_BUFFER_FORMAT)> {
        let sessions = self.sessions.lock().unwrap();
        let info = sessions
            .get(&session.0)
            .ok_or(Error::Session(SessionError::NotInitialized))?;
        if info.width == 0 {
            return Err(Error::Session(SessionError::NotInitialized));
        }
        Ok((info.width, info.height, info.buffer_format))
    }

    fn fetch_preset_config(
        &self,
        session: SessionHandle,
        codec: Codec,
        preset: Preset,
        tuning: Tuning,
    ) -> Result<Box<sys::NV_ENC_PRESET_CONFIG>> {
        let get = self
            .functions
            .nvEncGetEncodePresetConfigEx
            .ok_or_else(|| Self::missing("nvEncGetEncodePresetConfigEx"))?;
        let mut preset_config: Box<sys::NV_ENC_PRESET_CONFIG> =
            unsafe { Box::new(std::mem::zeroed()) };
        preset_config.version = sys::NV_ENC_PRESET_CONFIG_VER;
        preset_config.presetCfg.version = sys::NV_ENC_CONFIG_VER;
        Self::check(
            unsafe {
                get(
                    session.0 as *mut c_void,
                    codec_guid(codec),
                    preset_guid(preset),
                    tuning_info(tuning),
                    preset_config.as_mut(),
                )
            },
            "nvEncGetEncodePresetConfigEx",
        )?;
        Ok(preset_config)
    }
}

impl EncodeApi for NvEncodeApi {
    fn name(&self) -> &str {
        "nvenc"
    }

    fn required_version(&self) -> u32 {
        sys::NVENC_CLIENT_VERSION
    }

    fn max_supported_version(&self) -> Result<u32> {
        let mut version = 0u32;
        Self::check(
            unsafe { (self.entry.get_max_supported_version)(&mut version) },
            "NvEncodeAPIGetMaxSupportedVersion",
        )?;
        Ok(version)
    }

    fn open_session(&self, device: &DeviceContext) -> Result<SessionHandle> {
        let open = self
            .functions
            .nvEncOpenEncodeSessionEx
            .ok_or_else(|| Self::missing("nvEncOpenEncodeSessionEx"))?;
        let mut params: sys::NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS =
            unsafe { std::mem::zeroed() };
        params.version = sys::NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS_VER;
        params.deviceType = sys::NV_ENC_DEVICE_TYPE::DIRECTX;
        params.device = device.native_device()?;
        params.apiVersion = sys::NVENCAPI_VERSION;

        let mut encoder: *mut c_void = std::ptr::null_mut();
        Self::check(
            unsafe { open(&mut params, &mut encoder) },
            "nvEncOpenEncodeSessionEx",
        )?;
        self.sessions.lock().unwrap().insert(
            encoder as u64,
            SessionInfo {
                width: 0,
                height: 0,
                buffer_format: NV_ENC_BUFFER_FORMAT::NV12,
            },
        );
        Ok(SessionHandle(encoder as u64))
    }

    fn encode_codecs(&self, session: SessionHandle) -> Result<Vec<Codec>> {
        let get_count = self
            .functions
            .nvEncGetEncodeGUIDCount
            .ok_or_else(|| Self::missing("nvEncGetEncodeGUIDCount"))?;
        let get_guids = self
            .functions
            .nvEncGetEncodeGUIDs
            .ok_or_else(|| Self::missing("nvEncGetEncodeGUIDs"))?;

        let encoder = session.0 as *mut c_void;
        let mut count = 0u32;
        Self::check(
            unsafe { get_count(encoder, &mut count) },
            "nvEncGetEncodeGUIDCount",
        )?;
        let mut guids = vec![sys::NV_ENC_CODEC_H264_GUID; count as usize];
        let mut returned = 0u32;
        Self::check(
            unsafe { get_guids(encoder, guids.as_mut_ptr(), count, &mut returned) },
            "nvEncGetEncodeGUIDs",
        )?;
        guids.truncate(returned as usize);
        Ok(guids.into_iter().filter_map(codec_from_guid).collect())
    }

    fn encode_presets(&self, session: SessionHandle, codec: Codec) -> Result<Vec<Preset>> {
        let get_count = self
            .functions
            .nvEncGetEncodePresetCount
            .ok_or_else(|| Self::missing("nvEncGetEncodePresetCount"))?;
        let get_guids = self
            .functions
            .nvEncGetEncodePresetGUIDs
            .ok_or_else(|| Self::missing("nvEncGetEncodePresetGUIDs"))?;

        let encoder = session.0 as *mut c_void;
        let mut count = 0u32;
        Self::check(
            unsafe { get_count(encoder, codec_guid(codec), &mut count) },
            "nvEncGetEncodePresetCount",
        )?;
        let mut guids = vec![sys::NV_ENC_PRESET_P3_GUID; count as usize];
        let mut returned = 0u32;
        Self::check(
            unsafe {
                get_guids(
                    encoder,
                    codec_guid(codec),
                    guids.as_mut_ptr(),
                    count,
                    &mut returned,
                )
            },
            "nvEncGetEncodePresetGUIDs",
        )?;
        guids.truncate(returned as usize);
        Ok(guids.into_iter().filter_map(preset_from_guid).collect())
    }

    fn preset_defaults(
        &self,
        session: SessionHandle,
        codec: Codec,
        preset: Preset,
        tuning: Tuning,
    ) -> Result<EncodeParams> {
        let preset_config = self.fetch_preset_config(session, codec, preset, tuning)?;
        let rc = &preset_config.presetCfg.rcParams;
        Ok(EncodeParams {
            rate_control: rc_mode_from_native(rc.rateControlMode),
            average_bitrate: rc.averageBitRate,
            gop_length: preset_config.presetCfg.gopLength,
            chroma_format: ChromaFormat::Yuv420,
        })
    }

    fn initialize_session(
        &self,
        session: SessionHandle,
        config: &EncoderConfig,
        params: &EncodeParams,
    ) -> Result<()> {
        let initialize = self
            .functions
            .nvEncInitializeEncoder
            .ok_or_else(|| Self::missing("nvEncInitializeEncoder"))?;

        let mut preset_config =
            self.fetch_preset_config(session, config.codec, config.preset, config.tuning)?;
        preset_config.presetCfg.rcParams.rateControlMode = rc_mode_to_native(params.rate_control);
        preset_config.presetCfg.rcParams.averageBitRate = params.average_bitrate;
        preset_config.presetCfg.gopLength = params.gop_length;

        let mut init: sys::NV_ENC_INITIALIZE_PARAMS = unsafe { std::mem::zeroed() };
        init.version = sys::NV_ENC_INITIALIZE_PARAMS_VER;
        init.encodeGUID = codec_guid(config.codec);
        init.presetGUID = preset_guid(config.preset);
        init.encodeWidth = config.width;
        init.encodeHeight = config.height;
        init.darWidth = config.width;
        init.darHeight = config.height;
        init.frameRateNum = config.frame_rate_num;
        init.frameRateDen = config.frame_rate_den;
        // Synchronous mode: encode completion is implied by the call
        // returning, no completion events are used.
        init.enableEncodeAsync = 0;
        init.enablePTD = 1;
        init.tuningInfo = tuning_info(config.tuning);
        init.encodeConfig = &mut preset_config.presetCfg;

        Self::check(
            unsafe { initialize(session.0 as *mut c_void, &mut init) },
            "nvEncInitializeEncoder",
        )?;

        let mut sessions = self.sessions.lock().unwrap();
        if let Some(info) = sessions.get_mut(&session.0) {
            info.width = config.width;
            info.height = config.height;
            info.buffer_format = NV_ENC_BUFFER_FORMAT::NV12;
        }
        Ok(())
    }

    fn create_bitstream_buffer(&self, session: SessionHandle) -> Result<OutputHandle> {
        let create = self
            .functions
            .nvEncCreateBitstreamBuffer
            .ok_or_else(|| Self::missing("nvEncCreateBitstreamBuffer"))?;
        let mut params: sys::NV_ENC_CREATE_BITSTREAM_BUFFER = unsafe { std::mem::zeroed() };
        params.version = sys::NV_ENC_CREATE_BITSTREAM_BUFFER_VER;
        Self::check(
            unsafe { create(session.0 as *mut c_void, &mut params) },
            "nvEncCreateBitstreamBuffer",
        )?;
        Ok(OutputHandle(params.bitstreamBuffer as u64))
    }

    fn destroy_bitstream_buffer(&self, session: SessionHandle, output: OutputHandle) -> Result<()> {
        let destroy = self
            .functions
            .nvEncDestroyBitstreamBuffer
            .ok_or_else(|| Self::missing("nvEncDestroyBitstreamBuffer"))?;
        Self::check(
            unsafe { destroy(session.0 as *mut c_void, output.0 as *mut c_void) },
            "nvEncDestroyBitstreamBuffer",
        )
    }

    fn register_resource(
        &self,
        session: SessionHandle,
        texture: &Texture,
    ) -> Result<RegisteredHandle> {
        let register = self
            .functions
            .nvEncRegisterResource
            .ok_or_else(|| Self::missing("nvEncRegisterResource"))?;
        let mut params: sys::NV_ENC_REGISTER_RESOURCE = unsafe { std::mem::zeroed() };
        params.version = sys::NV_ENC_REGISTER_RESOURCE_VER;
        params.resourceType = sys::NV_ENC_INPUT_RESOURCE_TYPE::DIRECTX;
        params.width = texture.extents().width;
        params.height = texture.extents().height;
        params.resourceToRegister = texture.native_handle()?;
        params.bufferFormat = buffer_format(texture.format());

        Self::check(
            unsafe { register(session.0 as *mut c_void, &mut params) },
            "nvEncRegisterResource",
        )?;
        Ok(RegisteredHandle(params.registeredResource as u64))
    }

    fn unregister_resource(
        &self,
        session: SessionHandle,
        registered: RegisteredHandle,
    ) -> Result<()> {
        let unregister = self
            .functions
            .nvEncUnregisterResource
            .ok_or_else(|| Self::missing("nvEncUnregisterResource"))?;
        Self::check(
            unsafe { unregister(session.0 as *mut c_void, registered.0 as *mut c_void) },
            "nvEncUnregisterResource",
        )
    }

    fn map_resource(
        &self,
        session: SessionHandle,
        registered: RegisteredHandle,
    ) -> Result<MappedHandle> {
        let map = self
            .functions
            .nvEncMapInputResource
            .ok_or_else(|| Self::missing("nvEncMapInputResource"))?;
        let mut params: sys::NV_ENC_MAP_INPUT_RESOURCE = unsafe { std::mem::zeroed() };
        params.version = sys::NV_ENC_MAP_INPUT_RESOURCE_VER;
        params.registeredResource = registered.0 as *mut c_void;
        Self::check(
            unsafe { map(session.0 as *mut c_void, &mut params) },
            "nvEncMapInputResource",
        )?;
        Ok(MappedHandle(params.mappedResource as u64))
    }

    fn unmap_resource(&self, session: SessionHandle, mapped: MappedHandle) -> Result<()> {
        let unmap = self
            .functions
            .nvEncUnmapInputResource
            .ok_or_else(|| Self::missing("nvEncUnmapInputResource"))?;
        Self::check(
            unsafe { unmap(session.0 as *mut c_void, mapped.0 as *mut c_void) },
            "nvEncUnmapInputResource",
        )
    }

    fn encode_picture(
        &self,
        session: SessionHandle,
        mapped: MappedHandle,
        output: OutputHandle,
    ) -> Result<()> {
        let encode = self
            .functions
            .nvEncEncodePicture
            .ok_or_else(|| Self::missing("nvEncEncodePicture"))?;
        let (width, height, buffer_format) = self.session_info(session)?;
        let mut pic: sys::NV_ENC_PIC_PARAMS = unsafe { std::mem::zeroed() };
        pic.version = sys::NV_ENC_PIC_PARAMS_VER;
        pic.inputWidth = width;
        pic.inputHeight = height;
        pic.inputBuffer = mapped.0 as *mut c_void;
        pic.outputBitstream = output.0 as *mut c_void;
        pic.bufferFmt = buffer_format;
        pic.pictureStruct = sys::NV_ENC_PIC_STRUCT::FRAME;
        Self::check(
            unsafe { encode(session.0 as *mut c_void, &mut pic) },
            "nvEncEncodePicture",
        )
    }

    fn lock_bitstream(
        &self,
        session: SessionHandle,
        output: OutputHandle,
        blocking: bool,
    ) -> Result<BitstreamLock> {
        let lock = self
            .functions
            .nvEncLockBitstream
            .ok_or_else(|| Self::missing("nvEncLockBitstream"))?;
        let mut params: sys::NV_ENC_LOCK_BITSTREAM = unsafe { std::mem::zeroed() };
        params.version = sys::NV_ENC_LOCK_BITSTREAM_VER;
        params.doNotWait = u32::from(!blocking);
        params.outputBitstream = output.0 as *mut c_void;
        params.pictureStruct = sys::NV_ENC_PIC_STRUCT::FRAME;

        let status = unsafe { lock(session.0 as *mut c_void, &mut params) };
        if status == sys::NV_ENC_ERR_LOCK_BUSY {
            return Err(Error::Bitstream(BitstreamError::NotReady));
        }
        Self::check(status, "nvEncLockBitstream")?;
        Ok(BitstreamLock {
            ptr: params.bitstreamBufferPtr as *const u8,
            size_in_bytes: params.bitstreamSizeInBytes,
        })
    }

    fn unlock_bitstream(&self, session: SessionHandle, output: OutputHandle) -> Result<()> {
        let unlock = self
            .functions
            .nvEncUnlockBitstream
            .ok_or_else(|| Self::missing("nvEncUnlockBitstream"))?;
        Self::check(
            unsafe { unlock(session.0 as *mut c_void, output.0 as *mut c_void) },
            "nvEncUnlockBitstream",
        )
    }

    fn destroy_session(&self, session: SessionHandle) -> Result<()> {
        let destroy = self
            .functions
            .nvEncDestroyEncoder
            .ok_or_else(|| Self::missing("nvEncDestroyEncoder"))?;
        Self::check(
            unsafe { destroy(session.0 as *mut c_void) },
            "nvEncDestroyEncoder",
        )?;
        self.sessions.lock().unwrap().remove(&session.0);
        Ok(())
    }
}

fn codec_guid(codec: Codec) -> GUID {
    match codec {
        Codec::H264 => sys::NV_ENC_CODEC_H264_GUID,
        Codec::Hevc => sys::NV_ENC_CODEC_HEVC_GUID,
    }
}

fn codec_from_guid(guid: GUID) -> Option<Codec> {
    if guid == sys::NV_ENC_CODEC_H264_GUID {
        Some(Codec::H264)
    } else if guid == sys::NV_ENC_CODEC_HEVC_GUID {
        Some(Codec::Hevc)
    } else {
        None
    }
}

fn preset_guid(preset: Preset) -> GUID {
    match preset {
        Preset::P3 => sys::NV_ENC_PRESET_P3_GUID,
        Preset::P4 => sys::NV_ENC_PRESET_P4_GUID,
        Preset::P7 => sys::NV_ENC_PRESET_P7_GUID,
    }
}

fn preset_from_guid(guid: GUID) -> Option<Preset> {
    if guid == sys::NV_ENC_PRESET_P3_GUID {
        Some(Preset::P3)
    } else if guid == sys::NV_ENC_PRESET_P4_GUID {
        Some(Preset::P4)
    } else if guid == sys::NV_ENC_PRESET_P7_GUID {
        Some(Preset::P7)
    } else {
        None
    }
}

fn tuning_info(tuning: Tuning) -> NV_ENC_TUNING_INFO {
    match tuning {
        Tuning::HighQuality => NV_ENC_TUNING_INFO::HIGH_QUALITY,
        Tuning::LowLatency => NV_ENC_TUNING_INFO::LOW_LATENCY,
        Tuning::UltraLowLatency => NV_ENC_TUNING_INFO::ULTRA_LOW_LATENCY,
    }
}

fn rc_mode_to_native(mode: RateControlMode) -> u32 {
    match mode {
        RateControlMode::ConstQp => sys::NV_ENC_PARAMS_RC_CONSTQP,
        RateControlMode::Vbr => sys::NV_ENC_PARAMS_RC_VBR,
        RateControlMode::Cbr => sys::NV_ENC_PARAMS_RC_CBR,
    }
}

fn rc_mode_from_native(mode: u32) -> RateControlMode {
    match mode {
        sys::NV_ENC_PARAMS_RC_VBR => RateControlMode::Vbr,
        sys::NV_ENC_PARAMS_RC_CBR => RateControlMode::Cbr,
        _ => RateControlMode::ConstQp,
    }
}

fn buffer_format(format: Format) -> NV_ENC_BUFFER_FORMAT {
    match format {
        Format::NV12 => NV_ENC_BUFFER_FORMAT::NV12,
        Format::B8G8R8A8_UNORM => NV_ENC_BUFFER_FORMAT::ARGB,
        Format::R8G8B8A8_UNORM => NV_ENC_BUFFER_FORMAT::ABGR,
    }
}
