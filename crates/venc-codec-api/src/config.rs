use venc_graphics_api::types::Format;

/// Compressed output standard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    H264,
    Hevc,
}

/// Encoder preset, ordered from fastest (P3) to highest quality (P7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    P3,
    P4,
    P7,
}

/// Latency/quality tuning applied on top of the preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tuning {
    HighQuality,
    LowLatency,
    UltraLowLatency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateControlMode {
    ConstQp,
    Vbr,
    Cbr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaFormat {
    Yuv420,
    Yuv444,
}

/// Everything the session needs to initialize the encoder.
///
/// Defaults target low-latency streaming of a CIF surface: constant
/// bitrate, short GOP, ultra-low-latency tuning.
#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub codec: Codec,
    pub preset: Preset,
    pub tuning: Tuning,
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub rate_control: RateControlMode,
    /// Target bitrate in bits per second. Ignored for `ConstQp`.
    pub average_bitrate: u32,
    /// Distance between IDR frames, in frames.
    pub gop_length: u32,
    pub chroma_format: ChromaFormat,
    /// Layout of the frames handed to the staging texture.
    pub input_format: Format,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: Codec::H264,
            preset: Preset::P3,
            tuning: Tuning::UltraLowLatency,
            width: 352,
            height: 288,
            frame_rate_num: 30,
            frame_rate_den: 1,
            rate_control: RateControlMode::Cbr,
            average_bitrate: 25_000,
            gop_length: 10,
            chroma_format: ChromaFormat::Yuv420,
            input_format: Format::B8G8R8A8_UNORM,
        }
    }
}

impl EncoderConfig {
    /// Byte size of one uncompressed input frame.
    pub fn frame_size(&self) -> usize {
        self.input_format.frame_size(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_low_latency_cif() {
        let config = EncoderConfig::default();
        assert_eq!(config.codec, Codec::H264);
        assert_eq!(config.rate_control, RateControlMode::Cbr);
        assert_eq!(config.gop_length, 10);
        assert_eq!(config.frame_size(), 352 * 288 * 4);
    }
}
