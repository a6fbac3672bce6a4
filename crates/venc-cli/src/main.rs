//! Encodes a file of raw packed frames into an elementary stream.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{ArgEnum, Parser};
use log::error;

use venc_codec_api::backends::{EncodeApi, NullEncodeApi, NvEncodeApi};
use venc_codec_api::config::{ChromaFormat, Codec, Preset, RateControlMode, Tuning};
use venc_codec_api::{
    EncoderConfig, FrameLoop, MapPolicy, ReaderFrameSource, SessionError, WriterPacketSink,
};
use venc_graphics_api::types::Format;
use venc_graphics_api::DeviceContext;

#[derive(ArgEnum, Clone, Copy, Debug)]
enum CodecArg {
    H264,
    Hevc,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum PresetArg {
    P3,
    P4,
    P7,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum TuningArg {
    HighQuality,
    LowLatency,
    UltraLowLatency,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum FormatArg {
    Bgra,
    Rgba,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum RcArg {
    Constqp,
    Vbr,
    Cbr,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum BackendArg {
    Nvenc,
    Null,
}

#[derive(Parser, Debug)]
#[clap(name = "venc", about = "Encode raw video frames with a hardware encoder")]
struct Args {
    /// Raw input file: tightly packed frames in the input format.
    input: PathBuf,
    /// Output elementary stream.
    output: PathBuf,
    #[clap(long, default_value_t = 352)]
    width: u32,
    #[clap(long, default_value_t = 288)]
    height: u32,
    /// Input pixel layout.
    #[clap(long, arg_enum, default_value = "bgra")]
    format: FormatArg,
    #[clap(long, arg_enum, default_value = "h264")]
    codec: CodecArg,
    #[clap(long, arg_enum, default_value = "p3")]
    preset: PresetArg,
    #[clap(long, arg_enum, default_value = "ultra-low-latency")]
    tuning: TuningArg,
    /// Frames per second.
    #[clap(long, default_value_t = 30)]
    fps: u32,
    /// Target bitrate in bits per second.
    #[clap(long, default_value_t = 25_000)]
    bitrate: u32,
    /// GOP length in frames.
    #[clap(long, default_value_t = 10)]
    gop: u32,
    /// Rate control mode.
    #[clap(long, arg_enum, default_value = "cbr")]
    rc: RcArg,
    /// Encoder backend.
    #[clap(long, arg_enum, default_value = "nvenc")]
    backend: BackendArg,
    /// Remap the encoder input around every frame instead of keeping
    /// one mapping for the whole run.
    #[clap(long)]
    remap: bool,
}

impl Args {
    fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            codec: match self.codec {
                CodecArg::H264 => Codec::H264,
                CodecArg::Hevc => Codec::Hevc,
            },
            preset: match self.preset {
                PresetArg::P3 => Preset::P3,
                PresetArg::P4 => Preset::P4,
                PresetArg::P7 => Preset::P7,
            },
            tuning: match self.tuning {
                TuningArg::HighQuality => Tuning::HighQuality,
                TuningArg::LowLatency => Tuning::LowLatency,
                TuningArg::UltraLowLatency => Tuning::UltraLowLatency,
            },
            width: self.width,
            height: self.height,
            frame_rate_num: self.fps,
            frame_rate_den: 1,
            rate_control: match self.rc {
                RcArg::Constqp => RateControlMode::ConstQp,
                RcArg::Vbr => RateControlMode::Vbr,
                RcArg::Cbr => RateControlMode::Cbr,
            },
            average_bitrate: self.bitrate,
            gop_length: self.gop,
            chroma_format: ChromaFormat::Yuv420,
            input_format: match self.format {
                FormatArg::Bgra => Format::B8G8R8A8_UNORM,
                FormatArg::Rgba => Format::R8G8B8A8_UNORM,
            },
        }
    }
}

fn run(args: &Args) -> venc_codec_api::Result<u64> {
    let api: Arc<dyn EncodeApi> = match args.backend {
        BackendArg::Null => Arc::new(NullEncodeApi::new()),
        BackendArg::Nvenc => match NvEncodeApi::load() {
            Some(api) => Arc::new(api),
            None => return Err(SessionError::NoDevice.into()),
        },
    };

    let device = DeviceContext::open_software()?;
    let config = args.encoder_config();
    let policy = if args.remap {
        MapPolicy::PerFrame
    } else {
        MapPolicy::Persistent
    };

    let mut pipeline = FrameLoop::new(api, &device, &config, policy)?;
    let mut source = ReaderFrameSource::new(BufReader::new(File::open(&args.input)?));
    let mut sink = WriterPacketSink::new(BufWriter::new(File::create(&args.output)?));
    let frames = pipeline.run(&mut source, &mut sink)?;
    pipeline.close()?;
    sink.into_inner().flush()?;
    Ok(frames)
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(frames) => println!("total frames encoded: {frames}"),
        Err(err) => {
            error!("encode failed: {err}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("frames.raw");
        let output_path = dir.path().join("out.h264");

        // Two 16x8 BGRA frames plus a truncated third.
        let frame_size = 16 * 8 * 4;
        let mut raw = vec![0x40u8; frame_size * 2];
        raw.extend_from_slice(&[0xFF; 11]);
        std::fs::write(&input_path, &raw).unwrap();

        let args = Args::parse_from([
            "venc",
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--width",
            "16",
            "--height",
            "8",
            "--backend",
            "null",
        ]);
        let frames = run(&args).unwrap();
        assert_eq!(frames, 2);

        let output = std::fs::read(&output_path).unwrap();
        assert_eq!(output.len(), 2 * 100);
        assert_eq!(&output[..4], &[0, 0, 0, 1]);
    }

    #[test]
    fn config_mirrors_arguments() {
        let args = Args::parse_from([
            "venc", "in.raw", "out.h264", "--codec", "hevc", "--rc", "vbr", "--bitrate",
            "400000", "--format", "rgba",
        ]);
        let config = args.encoder_config();
        assert_eq!(config.codec, Codec::Hevc);
        assert_eq!(config.rate_control, RateControlMode::Vbr);
        assert_eq!(config.average_bitrate, 400_000);
        assert_eq!(config.input_format, Format::R8G8B8A8_UNORM);
        assert_eq!(config.gop_length, 10);
    }
}
