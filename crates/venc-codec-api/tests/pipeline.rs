//! End-to-end pipeline runs against the in-process encoder backend.

use std::io::Cursor;
use std::sync::Arc;

use venc_codec_api::backends::NullEncodeApi;
use venc_codec_api::{
    EncoderConfig, FrameLoop, MapPolicy, ReaderFrameSource, WriterPacketSink,
};
use venc_graphics_api::DeviceContext;

fn small_config() -> EncoderConfig {
    EncoderConfig {
        width: 16,
        height: 8,
        ..EncoderConfig::default()
    }
}

/// Synthetic packed frames with a per-frame fill byte, so consecutive
/// frames differ.
fn synthetic_frames(config: &EncoderConfig, count: usize) -> Vec<u8> {
    let frame_size = config.frame_size();
    let mut data = Vec::with_capacity(frame_size * count);
    for frame in 0..count {
        data.extend(std::iter::repeat(frame as u8).take(frame_size));
    }
    data
}

fn run_pipeline(
    api: Arc<NullEncodeApi>,
    config: &EncoderConfig,
    policy: MapPolicy,
    input: Vec<u8>,
) -> (u64, Vec<u8>) {
    let device = DeviceContext::open_software().unwrap();
    let mut pipeline = FrameLoop::new(api, &device, config, policy).unwrap();
    let mut source = ReaderFrameSource::new(Cursor::new(input));
    let mut sink = WriterPacketSink::new(Vec::new());
    let frames = pipeline.run(&mut source, &mut sink).unwrap();
    pipeline.close().unwrap();
    assert_eq!(frames, sink.packets_written());
    (frames, sink.into_inner())
}

#[test]
fn ten_frames_yield_ten_packets() {
    let api = Arc::new(NullEncodeApi::new());
    let config = small_config();
    let input = synthetic_frames(&config, 10);

    let (frames, output) = run_pipeline(api.clone(), &config, MapPolicy::Persistent, input);

    assert_eq!(frames, 10);
    assert_eq!(output.len(), 10 * api.packet_size());
    for (index, packet) in output.chunks_exact(api.packet_size()).enumerate() {
        assert_eq!(&packet[..4], &[0, 0, 0, 1]);
        assert_eq!(&packet[4..12], &(index as u64).to_be_bytes());
    }
}

#[test]
fn trailing_partial_frame_is_dropped() {
    let api = Arc::new(NullEncodeApi::new());
    let config = small_config();
    let mut input = synthetic_frames(&config, 3);
    input.extend_from_slice(&[0xAB; 7]);

    let (frames, output) = run_pipeline(api.clone(), &config, MapPolicy::Persistent, input);

    assert_eq!(frames, 3);
    assert_eq!(output.len(), 3 * api.packet_size());
}

#[test]
fn empty_input_yields_no_packets() {
    let api = Arc::new(NullEncodeApi::new());
    let config = small_config();

    let (frames, output) = run_pipeline(api, &config, MapPolicy::Persistent, Vec::new());

    assert_eq!(frames, 0);
    assert!(output.is_empty());
}

#[test]
fn per_frame_mapping_matches_persistent_output() {
    let config = small_config();
    let input = synthetic_frames(&config, 5);

    let (frames_a, output_a) = run_pipeline(
        Arc::new(NullEncodeApi::new()),
        &config,
        MapPolicy::Persistent,
        input.clone(),
    );
    let (frames_b, output_b) = run_pipeline(
        Arc::new(NullEncodeApi::new()),
        &config,
        MapPolicy::PerFrame,
        input,
    );

    assert_eq!(frames_a, frames_b);
    assert_eq!(output_a, output_b);
}

#[test]
fn pipeline_tears_down_cleanly_for_reuse() {
    let api = Arc::new(NullEncodeApi::new());
    let config = small_config();
    let device = DeviceContext::open_software().unwrap();

    for _ in 0..2 {
        let mut pipeline =
            FrameLoop::new(api.clone(), &device, &config, MapPolicy::Persistent).unwrap();
        let mut source = ReaderFrameSource::new(Cursor::new(synthetic_frames(&config, 2)));
        let mut sink = WriterPacketSink::new(Vec::new());
        assert_eq!(pipeline.run(&mut source, &mut sink).unwrap(), 2);
        pipeline.close().unwrap();
    }
    assert_eq!(api.sessions_opened(), 2);
}

#[test]
fn implicit_drop_tears_down_in_dependency_order() {
    let api = Arc::new(NullEncodeApi::new());
    let config = small_config();
    let device = DeviceContext::open_software().unwrap();

    {
        let mut pipeline =
            FrameLoop::new(api.clone(), &device, &config, MapPolicy::Persistent).unwrap();
        let mut source = ReaderFrameSource::new(Cursor::new(synthetic_frames(&config, 1)));
        let mut sink = WriterPacketSink::new(Vec::new());
        pipeline.run(&mut source, &mut sink).unwrap();
        // No close(): the drop path must release in the same order.
    }

    assert_eq!(
        api.teardown_calls(),
        vec![
            "unmap_resource",
            "unregister_resource",
            "destroy_bitstream_buffer",
            "destroy_session",
        ]
    );
}

#[test]
fn packet_size_follows_the_backend() {
    let api = Arc::new(NullEncodeApi::with_packet_size(64));
    let config = small_config();
    let input = synthetic_frames(&config, 3);

    let (frames, output) = run_pipeline(api.clone(), &config, MapPolicy::Persistent, input);

    assert_eq!(frames, 3);
    assert_eq!(api.packet_size(), 64);
    assert_eq!(output.len(), 3 * 64);
}

#[test]
fn packets_are_written_in_encode_order() {
    let api = Arc::new(NullEncodeApi::new());
    let config = small_config();
    let input = synthetic_frames(&config, 4);

    let (_, output) = run_pipeline(api.clone(), &config, MapPolicy::Persistent, input);

    let indices: Vec<u64> = output
        .chunks_exact(api.packet_size())
        .map(|packet| u64::from_be_bytes(packet[4..12].try_into().unwrap()))
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}
