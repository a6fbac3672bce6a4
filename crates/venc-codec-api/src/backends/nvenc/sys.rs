//! Raw NVENC interface: statuses, GUIDs, parameter structs and the
//! driver function table. Layouts follow `nvEncodeAPI.h`; structs are
//! simplified to the fields this crate touches, with reserved padding
//! keeping the native sizes.

#![allow(unsafe_code)]
#![allow(non_camel_case_types, non_snake_case)]
#![allow(clippy::upper_case_acronyms)]

use std::os::raw::c_void;

pub type NVENCSTATUS = i32;

pub const NV_ENC_SUCCESS: NVENCSTATUS = 0;
pub const NV_ENC_ERR_NO_ENCODE_DEVICE: NVENCSTATUS = 1;
pub const NV_ENC_ERR_UNSUPPORTED_DEVICE: NVENCSTATUS = 2;
pub const NV_ENC_ERR_INVALID_ENCODERDEVICE: NVENCSTATUS = 3;
pub const NV_ENC_ERR_INVALID_DEVICE: NVENCSTATUS = 4;
pub const NV_ENC_ERR_DEVICE_NOT_EXIST: NVENCSTATUS = 5;
pub const NV_ENC_ERR_INVALID_PTR: NVENCSTATUS = 6;
pub const NV_ENC_ERR_INVALID_EVENT: NVENCSTATUS = 7;
pub const NV_ENC_ERR_INVALID_PARAM: NVENCSTATUS = 8;
pub const NV_ENC_ERR_INVALID_CALL: NVENCSTATUS = 9;
pub const NV_ENC_ERR_OUT_OF_MEMORY: NVENCSTATUS = 10;
pub const NV_ENC_ERR_ENCODER_NOT_INITIALIZED: NVENCSTATUS = 11;
pub const NV_ENC_ERR_UNSUPPORTED_PARAM: NVENCSTATUS = 12;
pub const NV_ENC_ERR_LOCK_BUSY: NVENCSTATUS = 13;
pub const NV_ENC_ERR_NOT_ENOUGH_BUFFER: NVENCSTATUS = 14;
pub const NV_ENC_ERR_INVALID_VERSION: NVENCSTATUS = 15;
pub const NV_ENC_ERR_MAP_FAILED: NVENCSTATUS = 16;
pub const NV_ENC_ERR_NEED_MORE_INPUT: NVENCSTATUS = 17;
pub const NV_ENC_ERR_ENCODER_BUSY: NVENCSTATUS = 18;
pub const NV_ENC_ERR_EVENT_NOT_REGISTERD: NVENCSTATUS = 19;
pub const NV_ENC_ERR_GENERIC: NVENCSTATUS = 20;

/// GUID type mirroring the Windows GUID layout.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GUID {
    pub Data1: u32,
    pub Data2: u16,
    pub Data3: u16,
    pub Data4: [u8; 8],
}

pub const NV_ENC_CODEC_H264_GUID: GUID = GUID {
    Data1: 0x6BC8_2762,
    Data2: 0x4E63,
    Data3: 0x4CA4,
    Data4: [0xAA, 0x85, 0x1A, 0x4F, 0x6A, 0x21, 0xF5, 0x07],
};

pub const NV_ENC_CODEC_HEVC_GUID: GUID = GUID {
    Data1: 0x790C_DC88,
    Data2: 0x4522,
    Data3: 0x4D7B,
    Data4: [0x94, 0x25, 0xBD, 0xA9, 0x97, 0x5F, 0x76, 0x03],
};

pub const NV_ENC_PRESET_P3_GUID: GUID = GUID {
    Data1: 0x3685_0110,
    Data2: 0x3A07,
    Data3: 0x441F,
    Data4: [0x94, 0xD5, 0x36, 0x70, 0x63, 0x1F, 0x91, 0xF6],
};

pub const NV_ENC_PRESET_P4_GUID: GUID = GUID {
    Data1: 0x90A7_B826,
    Data2: 0xDF06,
    Data3: 0x4862,
    Data4: [0xB9, 0xD2, 0xCD, 0x6D, 0x73, 0xA0, 0x86, 0x81],
};

pub const NV_ENC_PRESET_P7_GUID: GUID = GUID {
    Data1: 0x8484_8C12,
    Data2: 0x6F71,
    Data3: 0x4C13,
    Data4: [0x93, 0x1B, 0x53, 0xE5, 0x6F, 0x78, 0x84, 0x3B],
};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NV_ENC_DEVICE_TYPE {
    DIRECTX = 0,
    CUDA = 1,
    OPENGL = 2,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NV_ENC_INPUT_RESOURCE_TYPE {
    DIRECTX = 0,
    CUDADEVICEPTR = 1,
    CUDAARRAY = 2,
    OPENGL_TEX = 3,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NV_ENC_BUFFER_FORMAT {
    UNDEFINED = 0x0000_0000,
    NV12 = 0x0000_0001,
    YV12 = 0x0000_0010,
    IYUV = 0x0000_0100,
    YUV444 = 0x0000_1000,
    ARGB = 0x0100_0000,
    ABGR = 0x0200_0000,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NV_ENC_PIC_STRUCT {
    FRAME = 0x01,
    FIELD_TOP_BOTTOM = 0x02,
    FIELD_BOTTOM_TOP = 0x03,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NV_ENC_TUNING_INFO {
    UNDEFINED = 0,
    HIGH_QUALITY = 1,
    LOW_LATENCY = 2,
    ULTRA_LOW_LATENCY = 3,
    LOSSLESS = 4,
}

pub const NV_ENC_PARAMS_RC_CONSTQP: u32 = 0x0;
pub const NV_ENC_PARAMS_RC_VBR: u32 = 0x1;
pub const NV_ENC_PARAMS_RC_CBR: u32 = 0x2;

pub const NVENCAPI_MAJOR_VERSION: u32 = 12;
pub const NVENCAPI_MINOR_VERSION: u32 = 2;
pub const NVENCAPI_VERSION: u32 = NVENCAPI_MAJOR_VERSION | (NVENCAPI_MINOR_VERSION << 24);

/// Version value compared against `NvEncodeAPIGetMaxSupportedVersion`
/// output before any session is opened.
pub const NVENC_CLIENT_VERSION: u32 = (NVENCAPI_MAJOR_VERSION << 4) | NVENCAPI_MINOR_VERSION;

/// Matches `NVENCAPI_STRUCT_VERSION(ver)` in `nvEncodeAPI.h`.
#[inline]
pub const fn nvenc_struct_version(struct_ver: u32) -> u32 {
    NVENCAPI_VERSION | (struct_ver << 16) | (0x7 << 28)
}

pub const NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS_VER: u32 = nvenc_struct_version(1);
pub const NV_ENCODE_API_FUNCTION_LIST_VER: u32 = nvenc_struct_version(2);
pub const NV_ENC_INITIALIZE_PARAMS_VER: u32 = nvenc_struct_version(5) | (1 << 31);
pub const NV_ENC_CONFIG_VER: u32 = nvenc_struct_version(8) | (1 << 31);
pub const NV_ENC_PRESET_CONFIG_VER: u32 = nvenc_struct_version(4) | (1 << 31);
pub const NV_ENC_CREATE_BITSTREAM_BUFFER_VER: u32 = nvenc_struct_version(1);
pub const NV_ENC_REGISTER_RESOURCE_VER: u32 = nvenc_struct_version(4);
pub const NV_ENC_MAP_INPUT_RESOURCE_VER: u32 = nvenc_struct_version(4);
pub const NV_ENC_PIC_PARAMS_VER: u32 = nvenc_struct_version(6) | (1 << 31);
pub const NV_ENC_LOCK_BITSTREAM_VER: u32 = nvenc_struct_version(2);

#[repr(C)]
pub struct NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS {
    pub version: u32,
    pub deviceType: NV_ENC_DEVICE_TYPE,
    pub device: *mut c_void,
    pub reserved: *mut c_void,
    pub apiVersion: u32,
    pub reserved1: [u32; 253],
    pub reserved2: [*mut c_void; 64],
}

/// Rate control params (simplified).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct NV_ENC_RC_PARAMS {
    pub version: u32,
    pub rateControlMode: u32,
    pub constQP_interP: u32,
    pub constQP_interB: u32,
    pub constQP_intra: u32,
    pub averageBitRate: u32,
    pub maxBitRate: u32,
    pub vbvBufferSize: u32,
    pub vbvInitialDelay: u32,
    pub reserved: [u32; 247],
}

/// Codec-specific config union, kept opaque.
#[repr(C)]
#[derive(Clone, Copy)]
pub union NV_ENC_CODEC_CONFIG {
    pub reserved: [u32; 256],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct NV_ENC_CONFIG {
    pub version: u32,
    pub profileGUID: GUID,
    pub gopLength: u32,
    pub frameIntervalP: i32,
    pub monoChromeEncoding: u32,
    pub frameFieldMode: u32,
    pub mvPrecision: u32,
    pub rcParams: NV_ENC_RC_PARAMS,
    pub encodeCodecConfig: NV_ENC_CODEC_CONFIG,
    pub reserved: [u32; 278],
    pub reserved2: [*mut c_void; 64],
}

#[repr(C)]
pub struct NV_ENC_INITIALIZE_PARAMS {
    pub version: u32,
    pub encodeGUID: GUID,
    pub presetGUID: GUID,
    pub encodeWidth: u32,
    pub encodeHeight: u32,
    pub darWidth: u32,
    pub darHeight: u32,
    pub frameRateNum: u32,
    pub frameRateDen: u32,
    pub enableEncodeAsync: u32,
    pub enablePTD: u32,
    pub reportSliceOffsets: u32,
    pub enableSubFrameWrite: u32,
    pub enableExternalMEHints: u32,
    pub enableMEOnlyMode: u32,
    pub enableWeightedPrediction: u32,
    pub enableOutputInVidmem: u32,
    pub reserved1: u32,
    pub privDataSize: u32,
    pub privData: *mut c_void,
    pub encodeConfig: *mut NV_ENC_CONFIG,
    pub maxEncodeWidth: u32,
    pub maxEncodeHeight: u32,
    pub maxMEHintCountsPerBlock: [u32; 2],
    pub tuningInfo: NV_ENC_TUNING_INFO,
    pub reserved: [u32; 289],
    pub reserved2: [*mut c_void; 64],
}

#[repr(C)]
pub struct NV_ENC_REGISTER_RESOURCE {
    pub version: u32,
    pub resourceType: NV_ENC_INPUT_RESOURCE_TYPE,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub subResourceIndex: u32,
    pub resourceToRegister: *mut c_void,
    pub registeredResource: *mut c_void,
    pub bufferFormat: NV_ENC_BUFFER_FORMAT,
    pub bufferUsage: u32,
    pub pInputFencePoint: *mut c_void,
    pub pOutputFencePoint: *mut c_void,
    pub reserved: [u32; 247],
    pub reserved2: [*mut c_void; 62],
}

#[repr(C)]
pub struct NV_ENC_MAP_INPUT_RESOURCE {
    pub version: u32,
    pub subResourceIndex: u32,
    pub inputResource: *mut c_void,
    pub registeredResource: *mut c_void,
    pub mappedResource: *mut c_void,
    pub mappedBufferFmt: NV_ENC_BUFFER_FORMAT,
    pub reserved: [u32; 251],
    pub reserved2: [*mut c_void; 63],
}

#[repr(C)]
pub struct NV_ENC_CREATE_BITSTREAM_BUFFER {
    pub version: u32,
    pub bitstreamBuffer: *mut c_void,
    pub size: u32,
    pub memoryHeap: u32,
    pub reserved: [u32; 252],
    pub reserved2: [*mut c_void; 64],
}

#[repr(C)]
pub struct NV_ENC_PIC_PARAMS {
    pub version: u32,
    pub inputWidth: u32,
    pub inputHeight: u32,
    pub inputPitch: u32,
    pub encodePicFlags: u32,
    pub frameIdx: u32,
    pub inputTimeStamp: u64,
    pub inputDuration: u64,
    pub inputBuffer: *mut c_void,
    pub outputBitstream: *mut c_void,
    pub completionEvent: *mut c_void,
    pub bufferFmt: NV_ENC_BUFFER_FORMAT,
    pub pictureStruct: NV_ENC_PIC_STRUCT,
    pub pictureType: u32,
    pub codecPicParams: [u32; 256],
    pub meHintCountsPerBlock: [u32; 2],
    pub meExternalHints: *mut c_void,
    pub reserved1: [u32; 6],
    pub reserved2: [*mut c_void; 2],
    pub qpDeltaMap: *mut i8,
    pub qpDeltaMapSize: u32,
    pub reservedBitFields: u32,
    pub meHintRefPicDist: [u32; 2],
    pub alphaBuffer: *mut c_void,
    pub reserved3: [u32; 286],
    pub reserved4: [*mut c_void; 60],
}

#[repr(C)]
pub struct NV_ENC_LOCK_BITSTREAM {
    pub version: u32,
    pub doNotWait: u32,
    pub ltrFrame: u32,
    pub reservedBitFields: u32,
    pub outputBitstream: *mut c_void,
    pub sliceOffsets: *mut u32,
    pub frameIdx: u32,
    pub hwEncodeStatus: u32,
    pub numSlices: u32,
    pub bitstreamSizeInBytes: u32,
    pub outputTimeStamp: u64,
    pub outputDuration: u64,
    pub bitstreamBufferPtr: *mut c_void,
    pub pictureType: u32,
    pub pictureStruct: NV_ENC_PIC_STRUCT,
    pub frameAvgQP: u32,
    pub frameSatd: u32,
    pub ltrFrameIdx: u32,
    pub ltrFrameBitmap: u32,
    pub temporalId: u32,
    pub reserved: [u32; 13],
    pub intraMBCount: u32,
    pub interMBCount: u32,
    pub averageMVX: i32,
    pub averageMVY: i32,
    pub reserved1: [u32; 226],
    pub reserved2: [*mut c_void; 64],
}

#[repr(C)]
pub struct NV_ENC_PRESET_CONFIG {
    pub version: u32,
    pub presetCfg: NV_ENC_CONFIG,
    pub reserved: [u32; 255],
    pub reserved2: [*mut c_void; 64],
}

/// Subset of `NV_ENCODE_API_FUNCTION_LIST` that this crate calls.
/// Unused slots keep their place so call offsets match the driver.
#[repr(C)]
pub struct NV_ENCODE_API_FUNCTION_LIST {
    pub version: u32,
    pub reserved: u32,
    pub nvEncOpenEncodeSession: *const c_void,
    pub nvEncGetEncodeGUIDCount:
        Option<unsafe extern "C" fn(*mut c_void, *mut u32) -> NVENCSTATUS>,
    pub nvEncGetEncodeProfileGUIDCount: *const c_void,
    pub nvEncGetEncodeProfileGUIDs: *const c_void,
    pub nvEncGetEncodeGUIDs:
        Option<unsafe extern "C" fn(*mut c_void, *mut GUID, u32, *mut u32) -> NVENCSTATUS>,
    pub nvEncGetInputFormatCount: *const c_void,
    pub nvEncGetInputFormats: *const c_void,
    pub nvEncGetEncodeCaps: *const c_void,
    pub nvEncGetEncodePresetCount:
        Option<unsafe extern "C" fn(*mut c_void, GUID, *mut u32) -> NVENCSTATUS>,
    pub nvEncGetEncodePresetGUIDs:
        Option<unsafe extern "C" fn(*mut c_void, GUID, *mut GUID, u32, *mut u32) -> NVENCSTATUS>,
    pub nvEncGetEncodePresetConfig: *const c_void,
    pub nvEncInitializeEncoder:
        Option<unsafe extern "C" fn(*mut c_void, *mut NV_ENC_INITIALIZE_PARAMS) -> NVENCSTATUS>,
    pub nvEncCreateInputBuffer: *const c_void,
    pub nvEncDestroyInputBuffer: *const c_void,
    pub nvEncCreateBitstreamBuffer: Option<
        unsafe extern "C" fn(*mut c_void, *mut NV_ENC_CREATE_BITSTREAM_BUFFER) -> NVENCSTATUS,
    >,
    pub nvEncDestroyBitstreamBuffer:
        Option<unsafe extern "C" fn(*mut c_void, *mut c_void) -> NVENCSTATUS>,
    pub nvEncEncodePicture:
        Option<unsafe extern "C" fn(*mut c_void, *mut NV_ENC_PIC_PARAMS) -> NVENCSTATUS>,
    pub nvEncLockBitstream:
        Option<unsafe extern "C" fn(*mut c_void, *mut NV_ENC_LOCK_BITSTREAM) -> NVENCSTATUS>,
    pub nvEncUnlockBitstream:
        Option<unsafe extern "C" fn(*mut c_void, *mut c_void) -> NVENCSTATUS>,
    pub nvEncLockInputBuffer: *const c_void,
    pub nvEncUnlockInputBuffer: *const c_void,
    pub nvEncGetEncodeStats: *const c_void,
    pub nvEncGetSequenceParams: *const c_void,
    pub nvEncRegisterAsyncEvent: *const c_void,
    pub nvEncUnregisterAsyncEvent: *const c_void,
    pub nvEncMapInputResource:
        Option<unsafe extern "C" fn(*mut c_void, *mut NV_ENC_MAP_INPUT_RESOURCE) -> NVENCSTATUS>,
    pub nvEncUnmapInputResource:
        Option<unsafe extern "C" fn(*mut c_void, *mut c_void) -> NVENCSTATUS>,
    pub nvEncDestroyEncoder: Option<unsafe extern "C" fn(*mut c_void) -> NVENCSTATUS>,
    pub nvEncInvalidateRefFrames: *const c_void,
    pub nvEncOpenEncodeSessionEx: Option<
        unsafe extern "C" fn(
            *mut NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS,
            *mut *mut c_void,
        ) -> NVENCSTATUS,
    >,
    pub nvEncRegisterResource:
        Option<unsafe extern "C" fn(*mut c_void, *mut NV_ENC_REGISTER_RESOURCE) -> NVENCSTATUS>,
    pub nvEncUnregisterResource:
        Option<unsafe extern "C" fn(*mut c_void, *mut c_void) -> NVENCSTATUS>,
    pub nvEncReconfigureEncoder: *const c_void,
    pub reserved1: *const c_void,
    pub nvEncCreateMVBuffer: *const c_void,
    pub nvEncDestroyMVBuffer: *const c_void,
    pub nvEncRunMotionEstimationOnly: *const c_void,
    pub nvEncGetLastErrorString: *const c_void,
    pub nvEncSetIOCudaStreams: *const c_void,
    pub nvEncGetEncodePresetConfigEx: Option<
        unsafe extern "C" fn(
            *mut c_void,
            GUID,
            GUID,
            NV_ENC_TUNING_INFO,
            *mut NV_ENC_PRESET_CONFIG,
        ) -> NVENCSTATUS,
    >,
    pub nvEncGetSequenceParamEx: *const c_void,
    pub nvEncRestoreEncoderState: *const c_void,
    pub nvEncLookaheadPicture: *const c_void,
    pub reserved2: [*const c_void; 275],
}

#[cfg(target_os = "windows")]
pub const NVENC_DLL_NAME: &str = "nvEncodeAPI64.dll";
#[cfg(not(target_os = "windows"))]
pub const NVENC_DLL_NAME: &str = "libnvidia-encode.so.1";

pub type NvEncodeApiGetMaxSupportedVersionFn = unsafe extern "C" fn(*mut u32) -> NVENCSTATUS;
pub type NvEncodeApiCreateInstanceFn =
    unsafe extern "C" fn(*mut NV_ENCODE_API_FUNCTION_LIST) -> NVENCSTATUS;

pub const NV_ENCODE_API_GET_MAX_SUPPORTED_VERSION_FN_NAME: &[u8] =
    b"NvEncodeAPIGetMaxSupportedVersion\0";
pub const NV_ENCODE_API_CREATE_INSTANCE_FN_NAME: &[u8] = b"NvEncodeAPICreateInstance\0";

/// Human-readable status names for diagnostics.
pub const fn nvenc_status_name(status: NVENCSTATUS) -> &'static str {
    match status {
        NV_ENC_SUCCESS => "NV_ENC_SUCCESS",
        NV_ENC_ERR_NO_ENCODE_DEVICE => "NV_ENC_ERR_NO_ENCODE_DEVICE",
        NV_ENC_ERR_UNSUPPORTED_DEVICE => "NV_ENC_ERR_UNSUPPORTED_DEVICE",
        NV_ENC_ERR_INVALID_ENCODERDEVICE => "NV_ENC_ERR_INVALID_ENCODERDEVICE",
        NV_ENC_ERR_INVALID_DEVICE => "NV_ENC_ERR_INVALID_DEVICE",
        NV_ENC_ERR_DEVICE_NOT_EXIST => "NV_ENC_ERR_DEVICE_NOT_EXIST",
        NV_ENC_ERR_INVALID_PTR => "NV_ENC_ERR_INVALID_PTR",
        NV_ENC_ERR_INVALID_EVENT => "NV_ENC_ERR_INVALID_EVENT",
        NV_ENC_ERR_INVALID_PARAM => "NV_ENC_ERR_INVALID_PARAM",
        NV_ENC_ERR_INVALID_CALL => "NV_ENC_ERR_INVALID_CALL",
        NV_ENC_ERR_OUT_OF_MEMORY => "NV_ENC_ERR_OUT_OF_MEMORY",
        NV_ENC_ERR_ENCODER_NOT_INITIALIZED => "NV_ENC_ERR_ENCODER_NOT_INITIALIZED",
        NV_ENC_ERR_UNSUPPORTED_PARAM => "NV_ENC_ERR_UNSUPPORTED_PARAM",
        NV_ENC_ERR_LOCK_BUSY => "NV_ENC_ERR_LOCK_BUSY",
        NV_ENC_ERR_NOT_ENOUGH_BUFFER => "NV_ENC_ERR_NOT_ENOUGH_BUFFER",
        NV_ENC_ERR_INVALID_VERSION => "NV_ENC_ERR_INVALID_VERSION",
        NV_ENC_ERR_MAP_FAILED => "NV_ENC_ERR_MAP_FAILED",
        NV_ENC_ERR_NEED_MORE_INPUT => "NV_ENC_ERR_NEED_MORE_INPUT",
        NV_ENC_ERR_ENCODER_BUSY => "NV_ENC_ERR_ENCODER_BUSY",
        NV_ENC_ERR_EVENT_NOT_REGISTERD => "NV_ENC_ERR_EVENT_NOT_REGISTERD",
        NV_ENC_ERR_GENERIC => "NV_ENC_ERR_GENERIC",
        _ => "NV_ENC_ERR_UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_version_packing() {
        assert_eq!(
            NV_ENC_OPEN_ENCODE_SESSION_EX_PARAMS_VER,
            NVENCAPI_VERSION | (1 << 16) | (0x7 << 28)
        );
    }

    #[test]
    fn client_version_packs_major_minor() {
        assert_eq!(
            NVENC_CLIENT_VERSION,
            (NVENCAPI_MAJOR_VERSION << 4) | NVENCAPI_MINOR_VERSION
        );
    }
}
