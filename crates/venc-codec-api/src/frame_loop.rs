use std::io::{Read, Write};
use std::sync::Arc;

use log::{debug, info, warn};

use venc_graphics_api::types::{Extents2D, Format, ResourceUsage, TextureDef};
use venc_graphics_api::{ColorConverter, DeviceContext, Texture};

use crate::backends::{EncodeApi, MappedHandle};
use crate::binder::{MapPolicy, ResourceBinder};
use crate::bitstream::BitstreamSink;
use crate::config::EncoderConfig;
use crate::error::Result;
use crate::session::EncoderSession;

/// Producer of uncompressed frames.
pub trait FrameSource {
    /// Fill `buf` with the next frame. A return shorter than `buf`
    /// means end of stream; a trailing partial frame is dropped.
    fn read_frame(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Consumer of compressed packets, one call per encoded frame.
pub trait PacketSink {
    fn write_packet(&mut self, packet: &[u8]) -> std::io::Result<()>;
}

/// [`FrameSource`] over any reader. Keeps reading until the frame is
/// complete or the reader is exhausted, so a pipe delivering a frame in
/// several chunks still yields whole frames.
pub struct ReaderFrameSource<R> {
    reader: R,
}

impl<R: Read> ReaderFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> FrameSource for ReaderFrameSource<R> {
    fn read_frame(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// [`PacketSink`] over any writer, counting packets as they pass.
pub struct WriterPacketSink<W> {
    writer: W,
    packets_written: u64,
}

impl<W: Write> WriterPacketSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            packets_written: 0,
        }
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PacketSink for WriterPacketSink<W> {
    fn write_packet(&mut self, packet: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(packet)?;
        self.packets_written += 1;
        Ok(())
    }
}

/// The synchronous encode pipeline: read a frame, upload it through
/// the staging texture, convert to NV12, encode, retrieve the packet.
///
/// Construction performs the whole setup: session open and initialize,
/// staging and input texture creation, input registration (and, under
/// [`MapPolicy::Persistent`], the single up-front mapping), bitstream
/// buffer creation. [`run`](Self::run) then moves frames until the
/// source reports end of stream.
pub struct FrameLoop {
    device: DeviceContext,
    converter: ColorConverter,
    // Declaration order doubles as drop order: bindings and the output
    // buffer must go before the session they were created on.
    binder: ResourceBinder,
    sink: BitstreamSink,
    session: EncoderSession,
    staging: Texture,
    converted: Texture,
    mapped: Option<MappedHandle>,
    map_policy: MapPolicy,
    frame_size: usize,
}

impl FrameLoop {
    pub fn new(
        api: Arc<dyn EncodeApi>,
        device: &DeviceContext,
        config: &EncoderConfig,
        map_policy: MapPolicy,
    ) -> Result<Self> {
        let mut session = EncoderSession::open(api.clone(), device)?;
        session.initialize(config)?;

        let extents = Extents2D::new(config.width, config.height);
        let staging = device.create_texture(&TextureDef {
            extents,
            format: config.input_format,
            usage: ResourceUsage::AS_STAGING,
        })?;
        let converted = device.create_texture(&TextureDef {
            extents,
            format: Format::NV12,
            usage: ResourceUsage::AS_RENDER_TARGET | ResourceUsage::AS_ENCODE_INPUT,
        })?;

        let converter = ColorConverter::new(device);
        let mut binder = ResourceBinder::new(api.clone(), session.handle());
        binder.register(&converted)?;
        let mapped = match map_policy {
            MapPolicy::Persistent => Some(binder.map(&converted)?),
            MapPolicy::PerFrame => None,
        };
        let sink = BitstreamSink::new(api, session.handle())?;

        Ok(Self {
            device: device.clone(),
            converter,
            binder,
            sink,
            session,
            staging,
            converted,
            mapped,
            map_policy,
            frame_size: config.frame_size(),
        })
    }

    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    /// Encode frames from `source` until end of stream, handing each
    /// compressed packet to `sink`. Returns the number of frames
    /// encoded, which equals the number of packets written.
    pub fn run(&mut self, source: &mut dyn FrameSource, sink: &mut dyn PacketSink) -> Result<u64> {
        let mut frame = vec![0u8; self.frame_size];
        let mut frames_encoded = 0u64;

        loop {
            let filled = source.read_frame(&mut frame)?;
            if filled < frame.len() {
                if filled > 0 {
                    debug!("dropping trailing partial frame of {filled} bytes");
                }
                break;
            }

            let mut region = self.staging.map()?;
            region.write(&frame)?;
            self.staging.unmap()?;
            self.converter.convert(&self.staging, &self.converted)?;

            let mapped = match self.mapped {
                Some(mapped) => mapped,
                None => self.binder.map(&self.converted)?,
            };
            let encode_result = self
                .session
                .encode(mapped, self.sink.output()?);
            if self.map_policy == MapPolicy::PerFrame {
                self.binder.unmap(&self.converted)?;
            }
            encode_result?;

            let packet = self.sink.retrieve_packet(true)?;
            sink.write_packet(&packet)?;
            debug!("frame {frames_encoded}: packet of {} bytes", packet.len());
            frames_encoded += 1;
        }

        info!("total frames encoded: {frames_encoded}");
        Ok(frames_encoded)
    }

    /// Tear the pipeline down in dependency order: input bindings
    /// first, then the output buffer, then the session. The device is
    /// released when the last texture and context clone drop.
    /// Idempotent; also run on drop.
    pub fn close(&mut self) -> Result<()> {
        self.mapped = None;
        self.binder.release_all()?;
        self.sink.destroy()?;
        self.session.close()
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("failed to tear down encode pipeline: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reader_source_reassembles_chunked_frames() {
        // A reader that returns at most 3 bytes per read.
        struct Trickle(Cursor<Vec<u8>>);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = buf.len().min(3);
                self.0.read(&mut buf[..n])
            }
        }

        let mut source = ReaderFrameSource::new(Trickle(Cursor::new(vec![7u8; 10])));
        let mut frame = [0u8; 10];
        assert_eq!(source.read_frame(&mut frame).unwrap(), 10);
        assert_eq!(frame, [7u8; 10]);
        assert_eq!(source.read_frame(&mut frame).unwrap(), 0);
    }

    #[test]
    fn reader_source_reports_short_final_frame() {
        let mut source = ReaderFrameSource::new(Cursor::new(vec![1u8; 15]));
        let mut frame = [0u8; 10];
        assert_eq!(source.read_frame(&mut frame).unwrap(), 10);
        assert_eq!(source.read_frame(&mut frame).unwrap(), 5);
    }

    #[test]
    fn writer_sink_counts_packets() {
        let mut sink = WriterPacketSink::new(Vec::new());
        sink.write_packet(&[1, 2, 3]).unwrap();
        sink.write_packet(&[4]).unwrap();
        assert_eq!(sink.packets_written(), 2);
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4]);
    }
}
