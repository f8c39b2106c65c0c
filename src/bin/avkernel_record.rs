//! Smoke-test harness binary: wires the synthetic capture sources from
//! `avkernel::capture::test_support` into a real `Pipeline` so the crate
//! can be exercised end-to-end without a platform capture collaborator.
//! Mirrors the shape of `DA1F-RoAnalyzer`'s `src/bin/cli.rs` entry point.

use avkernel::capture::test_support::{SyntheticAudioSource, SyntheticVideoSource};
use avkernel::encoder::ffmpeg_audio::FfmpegAudioEncoder;
use avkernel::encoder::ffmpeg_video::FfmpegVideoEncoder;
use avkernel::pipeline::PipelineInputs;
use avkernel::types::AudioSource;
use avkernel::{Pipeline, PipelineConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("avkernel=info".parse()?))
        .init();

    let config = PipelineConfig::load(std::env::args().nth(1).as_deref())?;
    let pipeline = Pipeline::new(config);

    let clock = Arc::new(Mutex::new(0u64));
    let inputs = PipelineInputs {
        video_source: Box::new(SyntheticVideoSource::new(1920, 1080, Arc::clone(&clock))),
        desktop_audio_source: Box::new(SyntheticAudioSource::new(AudioSource::Desktop, 1024, usize::MAX)),
        mic_audio_source: Box::new(SyntheticAudioSource::new(AudioSource::Mic, 1024, usize::MAX)),
        video_encoder: Box::new(FfmpegVideoEncoder::new()),
        audio_encoder: Box::new(FfmpegAudioEncoder::new()),
    };

    pipeline.start(inputs)?;
    std::thread::sleep(Duration::from_secs(10));
    pipeline.stop(Duration::from_secs(5))?;

    let stats = pipeline.statistics();
    tracing::info!(?stats, "final statistics");
    Ok(())
}
