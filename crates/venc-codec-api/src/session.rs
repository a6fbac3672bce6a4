use std::sync::Arc;

use log::{debug, error, info};

use venc_graphics_api::DeviceContext;

use crate::backends::{EncodeApi, EncodeParams, MappedHandle, OutputHandle, SessionHandle};
use crate::config::{Codec, EncoderConfig, Preset};
use crate::error::{Error, Result, SessionError};

/// Codecs and per-codec presets the device advertises.
#[derive(Clone, Debug)]
pub struct EncoderCapabilities {
    pub codecs: Vec<Codec>,
    pub presets: Vec<(Codec, Vec<Preset>)>,
}

impl EncoderCapabilities {
    pub fn supports(&self, codec: Codec, preset: Preset) -> bool {
        self.presets
            .iter()
            .any(|(c, presets)| *c == codec && presets.contains(&preset))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Opened,
    Initialized,
    Closed,
}

/// One encode session on one device.
///
/// [`open`](Self::open) checks the driver interface version before
/// anything else touches the encoder, then [`initialize`](Self::initialize)
/// fetches the preset defaults and overrides only the fields pinned by
/// the configuration. Frames are accepted only in the initialized
/// state.
pub struct EncoderSession {
    api: Arc<dyn EncodeApi>,
    device: DeviceContext,
    handle: SessionHandle,
    state: SessionState,
}

impl EncoderSession {
    pub fn open(api: Arc<dyn EncodeApi>, device: &DeviceContext) -> Result<Self> {
        let required = api.required_version();
        let supported = api.max_supported_version()?;
        if required > supported {
            error!(
                "encoder interface too old: need {required:#x}, driver reports {supported:#x}"
            );
            return Err(Error::Session(SessionError::VersionMismatch {
                required,
                supported,
            }));
        }
        debug!(
            "encoder interface {supported:#x} accepted (requires {required:#x})"
        );

        let handle = api.open_session(device)?;
        info!("encode session opened on backend {}", api.name());
        Ok(Self {
            api,
            device: device.clone(),
            handle,
            state: SessionState::Opened,
        })
    }

    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    pub fn api(&self) -> &Arc<dyn EncodeApi> {
        &self.api
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// Enumerate codecs and presets. Fails with
    /// [`SessionError::NoCapability`] when the device can encode
    /// nothing at all.
    pub fn query_capabilities(&self) -> Result<EncoderCapabilities> {
        let codecs = self.api.encode_codecs(self.handle)?;
        if codecs.is_empty() {
            return Err(Error::Session(SessionError::NoCapability(
                "device advertises no encode codecs".into(),
            )));
        }
        let mut presets = Vec::with_capacity(codecs.len());
        for codec in &codecs {
            let codec_presets = self.api.encode_presets(self.handle, *codec)?;
            if codec_presets.is_empty() {
                return Err(Error::Session(SessionError::NoCapability(format!(
                    "device advertises no presets for {codec:?}"
                ))));
            }
            presets.push((*codec, codec_presets));
        }
        Ok(EncoderCapabilities { codecs, presets })
    }

    /// Initialize the encoder for `config`.
    ///
    /// The preset's own defaults are fetched first; rate control,
    /// bitrate, GOP length and chroma format are then overridden on
    /// that copy before it is handed back to the encoder. Parameters
    /// are locked for the session lifetime: a second call is rejected.
    pub fn initialize(&mut self, config: &EncoderConfig) -> Result<()> {
        match self.state {
            SessionState::Opened => {}
            SessionState::Initialized => {
                return Err(Error::Session(SessionError::AlreadyInitialized));
            }
            SessionState::Closed => return Err(Error::Session(SessionError::Closed)),
        }
        if config.width == 0 || config.height == 0 {
            return Err(Error::Session(SessionError::NoCapability(format!(
                "invalid encode extents {}x{}",
                config.width, config.height
            ))));
        }
        let capabilities = self.query_capabilities()?;
        if !capabilities.supports(config.codec, config.preset) {
            return Err(Error::Session(SessionError::NoCapability(format!(
                "device does not support {:?} with preset {:?}",
                config.codec, config.preset
            ))));
        }

        let mut params: EncodeParams =
            self.api
                .preset_defaults(self.handle, config.codec, config.preset, config.tuning)?;
        params.rate_control = config.rate_control;
        params.average_bitrate = config.average_bitrate;
        params.gop_length = config.gop_length;
        params.chroma_format = config.chroma_format;

        self.api.initialize_session(self.handle, config, &params)?;
        self.state = SessionState::Initialized;
        info!(
            "encoder initialized: {:?} {}x{} @ {}/{} fps, {:?} {} bps, gop {}",
            config.codec,
            config.width,
            config.height,
            config.frame_rate_num,
            config.frame_rate_den,
            config.rate_control,
            config.average_bitrate,
            config.gop_length
        );
        Ok(())
    }

    /// Submit one mapped frame for synchronous encoding.
    pub fn encode(&self, mapped: MappedHandle, output: OutputHandle) -> Result<()> {
        match self.state {
            SessionState::Initialized => self.api.encode_picture(self.handle, mapped, output),
            SessionState::Opened => Err(Error::Session(SessionError::NotInitialized)),
            SessionState::Closed => Err(Error::Session(SessionError::Closed)),
        }
    }

    /// Close the session. Idempotent; also run on drop.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.api.destroy_session(self.handle)?;
        self.state = SessionState::Closed;
        Ok(())
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!("failed to destroy encode session: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::NullEncodeApi;

    fn null_api() -> Arc<NullEncodeApi> {
        Arc::new(NullEncodeApi::new())
    }

    #[test]
    fn version_is_checked_before_any_session_opens() {
        let api = Arc::new(NullEncodeApi::with_max_version(0x10));
        let device = DeviceContext::open_software().unwrap();
        let err = EncoderSession::open(api.clone(), &device).err().unwrap();
        assert!(matches!(
            err,
            Error::Session(SessionError::VersionMismatch { .. })
        ));
        assert_eq!(api.version_queries(), 1);
        assert_eq!(api.sessions_opened(), 0);
    }

    #[test]
    fn initialize_overrides_preset_defaults() {
        let api = null_api();
        let device = DeviceContext::open_software().unwrap();
        let mut session = EncoderSession::open(api.clone(), &device).unwrap();
        let config = EncoderConfig::default();
        session.initialize(&config).unwrap();

        let (_, params) = api.recorded_initialization(session.handle()).unwrap();
        assert_eq!(params.rate_control, config.rate_control);
        assert_eq!(params.average_bitrate, config.average_bitrate);
        assert_eq!(params.gop_length, config.gop_length);
        assert_eq!(params.chroma_format, config.chroma_format);
    }

    #[test]
    fn capability_query_fails_on_codec_free_device() {
        let api = Arc::new(NullEncodeApi::without_codecs());
        let device = DeviceContext::open_software().unwrap();
        let session = EncoderSession::open(api, &device).unwrap();
        assert!(matches!(
            session.query_capabilities(),
            Err(Error::Session(SessionError::NoCapability(_)))
        ));
    }

    #[test]
    fn capability_query_fails_on_preset_free_codec() {
        let api = Arc::new(NullEncodeApi::without_presets());
        let device = DeviceContext::open_software().unwrap();
        let session = EncoderSession::open(api, &device).unwrap();
        assert!(matches!(
            session.query_capabilities(),
            Err(Error::Session(SessionError::NoCapability(_)))
        ));
    }

    #[test]
    fn initialize_is_gated_on_session_state() {
        let api = null_api();
        let device = DeviceContext::open_software().unwrap();
        let mut session = EncoderSession::open(api, &device).unwrap();
        let config = EncoderConfig::default();
        session.initialize(&config).unwrap();
        assert!(matches!(
            session.initialize(&config),
            Err(Error::Session(SessionError::AlreadyInitialized))
        ));
        session.close().unwrap();
        assert!(matches!(
            session.initialize(&config),
            Err(Error::Session(SessionError::Closed))
        ));
    }

    #[test]
    fn encode_is_gated_on_session_state() {
        use crate::backends::{MappedHandle, OutputHandle};

        let api = null_api();
        let device = DeviceContext::open_software().unwrap();
        let mut session = EncoderSession::open(api, &device).unwrap();
        let mapped = MappedHandle(1);
        let output = OutputHandle(2);
        assert!(matches!(
            session.encode(mapped, output),
            Err(Error::Session(SessionError::NotInitialized))
        ));
        session.initialize(&EncoderConfig::default()).unwrap();
        session.close().unwrap();
        assert!(matches!(
            session.encode(mapped, output),
            Err(Error::Session(SessionError::Closed))
        ));
    }

    #[test]
    fn zero_extents_are_rejected() {
        let api = null_api();
        let device = DeviceContext::open_software().unwrap();
        let mut session = EncoderSession::open(api, &device).unwrap();
        let config = EncoderConfig {
            width: 0,
            ..EncoderConfig::default()
        };
        assert!(matches!(
            session.initialize(&config),
            Err(Error::Session(SessionError::NoCapability(_)))
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let api = null_api();
        let device = DeviceContext::open_software().unwrap();
        let mut session = EncoderSession::open(api, &device).unwrap();
        session.close().unwrap();
        session.close().unwrap();
    }
}
