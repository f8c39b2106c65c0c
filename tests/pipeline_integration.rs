//! End-to-end coverage for `Pipeline` itself: real threads, real
//! `AudioEngine`/`VideoPacer`/`TimebaseMapper` wiring, but in-process fake
//! encoders and muxer (SPEC_FULL §E) so the run needs no real ffmpeg codec
//! or network I/O. Exercises the properties the component-pair tests can't
//! reach: that `Pipeline::start`/`stop` actually drives packets end to end
//! in timestamp order (P5-P8), and that muxer write failures are reflected
//! in `get_statistics()` (P9).

use avkernel::capture::test_support::{SyntheticAudioSource, SyntheticVideoSource};
use avkernel::config::{OutputTarget, PipelineConfig};
use avkernel::encoder::test_support::{FakeAudioEncoder, FakeVideoEncoder};
use avkernel::mux::test_support::FakeMuxer;
use avkernel::pipeline::{Pipeline, PipelineInputs};
use avkernel::types::{AudioSource as AudioSourceKind, CodecConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn test_config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.fps = 10;
    cfg.width = 4;
    cfg.height = 4;
    cfg.output = Some(OutputTarget::File {
        path: "unused.mp4".to_string(),
    });
    cfg
}

fn idle_inputs() -> PipelineInputs {
    // Neither capture source ever yields data; `FrameRing`'s black-frame
    // fallback and `AudioEngine`'s silence padding mean the pipeline still
    // produces a steady stream of packets without any real capture.
    PipelineInputs {
        video_source: Box::new(SyntheticVideoSource::new(4, 4, Arc::new(Mutex::new(0)))),
        desktop_audio_source: Box::new(SyntheticAudioSource::new(AudioSourceKind::Desktop, 1024, 0)),
        mic_audio_source: Box::new(SyntheticAudioSource::new(AudioSourceKind::Mic, 1024, 0)),
        video_encoder: Box::new(FakeVideoEncoder::new(10)),
        audio_encoder: Box::new(FakeAudioEncoder),
    }
}

#[test]
fn full_pipeline_encodes_and_muxes_in_order() {
    let pipeline = Pipeline::new(test_config());
    let muxer = Arc::new(FakeMuxer::new());

    pipeline
        .start_with_muxer(idle_inputs(), Box::new(Arc::clone(&muxer)))
        .expect("pipeline starts with injected fake muxer");

    std::thread::sleep(Duration::from_millis(250));
    pipeline.stop(Duration::from_secs(2)).expect("pipeline stops within deadline");

    assert!(muxer.header_written());
    assert!(muxer.trailer_written());
    assert_eq!(muxer.video_extradata(), Some(CodecConfig(vec![0xde, 0xad, 0xbe, 0xef])));
    assert_eq!(muxer.audio_extradata(), Some(CodecConfig(vec![0xaa, 0xbb])));

    let packets = muxer.written_packets();
    assert!(!packets.is_empty(), "expected at least one packet to reach the muxer");
    assert!(packets.iter().any(|p| p.stream == avkernel::types::StreamKind::Video));
    assert!(packets.iter().any(|p| p.stream == avkernel::types::StreamKind::Audio));

    let mut last_video_dts = None;
    let mut last_audio_dts = None;
    for packet in &packets {
        let last = match packet.stream {
            avkernel::types::StreamKind::Video => &mut last_video_dts,
            avkernel::types::StreamKind::Audio => &mut last_audio_dts,
        };
        if let Some(prev) = *last {
            assert!(packet.dts_us > prev, "dts must strictly increase per stream");
        }
        *last = Some(packet.dts_us);
    }

    let stats = pipeline.statistics();
    assert!(stats.video_packets > 0);
    assert!(stats.audio_packets > 0);
    assert_eq!(stats.video_packets_dropped, 0);
}

#[test]
fn muxer_rejections_are_reflected_in_statistics() {
    let pipeline = Pipeline::new(test_config());
    let muxer = Arc::new(FakeMuxer::new_dropping_every_nth_video(3));

    pipeline
        .start_with_muxer(idle_inputs(), Box::new(Arc::clone(&muxer)))
        .expect("pipeline starts with injected fake muxer");

    std::thread::sleep(Duration::from_millis(250));
    pipeline.stop(Duration::from_secs(2)).expect("pipeline stops within deadline");

    let stats = pipeline.statistics();
    assert!(
        stats.video_packets_dropped > 0,
        "every third video write is rejected, so the drop counter must move"
    );
    assert!(stats.video_packets > stats.video_packets_dropped);
}
