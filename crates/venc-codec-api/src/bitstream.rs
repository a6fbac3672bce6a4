use std::sync::Arc;

use log::warn;

use crate::backends::{EncodeApi, OutputHandle, SessionHandle};
use crate::error::{BitstreamError, Error, Result};

/// Owns one reusable compressed-output buffer.
///
/// The encode call deposits each frame's packet into the buffer; the
/// sink then locks it, copies the bytes out and unlocks, so the buffer
/// is free again before the next frame is submitted.
pub struct BitstreamSink {
    api: Arc<dyn EncodeApi>,
    session: SessionHandle,
    output: Option<OutputHandle>,
}

impl BitstreamSink {
    pub fn new(api: Arc<dyn EncodeApi>, session: SessionHandle) -> Result<Self> {
        let output = api.create_bitstream_buffer(session)?;
        Ok(Self {
            api,
            session,
            output: Some(output),
        })
    }

    pub fn output(&self) -> Result<OutputHandle> {
        self.output
            .ok_or(Error::Bitstream(BitstreamError::NoBuffer))
    }

    /// Lock the buffer, copy the packet out, unlock.
    ///
    /// With `blocking` false the call fails with
    /// [`BitstreamError::NotReady`] instead of waiting when no packet
    /// is pending.
    pub fn retrieve_packet(&self, blocking: bool) -> Result<Vec<u8>> {
        let output = self.output()?;
        let lock = self.api.lock_bitstream(self.session, output, blocking)?;
        let packet =
            unsafe { std::slice::from_raw_parts(lock.ptr, lock.size_in_bytes as usize) }.to_vec();
        self.api.unlock_bitstream(self.session, output)?;
        Ok(packet)
    }

    /// Destroy the underlying buffer. Idempotent; also run on drop.
    pub fn destroy(&mut self) -> Result<()> {
        if let Some(output) = self.output.take() {
            self.api.destroy_bitstream_buffer(self.session, output)?;
        }
        Ok(())
    }
}

impl Drop for BitstreamSink {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            warn!("failed to destroy bitstream buffer: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{EncodeParams, NullEncodeApi};
    use crate::config::{ChromaFormat, EncoderConfig, RateControlMode};
    use venc_graphics_api::types::{Extents2D, Format, ResourceUsage, TextureDef};
    use venc_graphics_api::DeviceContext;

    #[test]
    fn retrieve_before_encode_reports_not_ready() {
        let api = Arc::new(NullEncodeApi::new());
        let device = DeviceContext::open_software().unwrap();
        let session = api.open_session(&device).unwrap();
        let sink = BitstreamSink::new(api, session).unwrap();
        assert!(matches!(
            sink.retrieve_packet(false),
            Err(Error::Bitstream(BitstreamError::NotReady))
        ));
    }

    #[test]
    fn retrieve_after_encode_drains_the_buffer() {
        let api = Arc::new(NullEncodeApi::new());
        let device = DeviceContext::open_software().unwrap();
        let session = api.open_session(&device).unwrap();
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
            .create_texture(&TextureDef {
                extents: Extents2D::new(4, 4),
                format: Format::NV12,
                usage: ResourceUsage::AS_ENCODE_INPUT,
            })
            .unwrap();
        let registered = api.register_resource(session, &texture).unwrap();
        let mapped = api.map_resource(session, registered).unwrap();

        let sink = BitstreamSink::new(api.clone(), session).unwrap();
        api.encode_picture(session, mapped, sink.output().unwrap())
            .unwrap();

        let packet = sink.retrieve_packet(true).unwrap();
        assert_eq!(packet.len(), api.packet_size());
        assert_eq!(&packet[..4], &[0, 0, 0, 1]);

        // Drained: the same packet is not retrievable twice.
        assert!(matches!(
            sink.retrieve_packet(false),
            Err(Error::Bitstream(BitstreamError::NotReady))
        ));
    }

    #[test]
    fn destroy_is_idempotent() {
        let api = Arc::new(NullEncodeApi::new());
        let device = DeviceContext::open_software().unwrap();
        let session = api.open_session(&device).unwrap();
        let mut sink = BitstreamSink::new(api, session).unwrap();
        sink.destroy().unwrap();
        sink.destroy().unwrap();
        assert!(matches!(
            sink.output(),
            Err(Error::Bitstream(BitstreamError::NoBuffer))
        ));
    }
}
