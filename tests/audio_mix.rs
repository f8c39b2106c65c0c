//! Integration coverage for the audio clock master: `PcmMixBuffer` feeding
//! `AudioEngine::tick` (spec P3: every tick emits exactly 1024 frames;
//! L2: cumulative pts advances by exactly 1024 per tick regardless of
//! source starvation).

use avkernel::audio_engine::AudioEngine;
use avkernel::config::{AudioEngineConfig, PcmBufferConfig};
use avkernel::pcm_mix_buffer::PcmMixBuffer;
use avkernel::types::{AudioSource, PcmBlock, AAC_FRAME};
use std::sync::Arc;

#[test]
fn every_tick_emits_exactly_one_aac_frame_worth_of_samples() {
    let buffer = Arc::new(PcmMixBuffer::new(&PcmBufferConfig::default()));
    let mut engine = AudioEngine::new(Arc::clone(&buffer), &AudioEngineConfig::default());

    for _ in 0..5 {
        let block = engine.tick();
        assert_eq!(block.frame_count(), AAC_FRAME);
    }
}

#[test]
fn pts_advances_by_exactly_aac_frame_each_tick_even_when_starved() {
    let buffer = Arc::new(PcmMixBuffer::new(&PcmBufferConfig::default()));
    let mut engine = AudioEngine::new(Arc::clone(&buffer), &AudioEngineConfig::default());

    let mut expected = 0u64;
    for _ in 0..10 {
        let block = engine.tick();
        assert_eq!(block.pts_in_frames, expected);
        expected += AAC_FRAME as u64;
    }
}

#[test]
fn mismatched_chunk_sizes_from_capture_still_produce_fixed_blocks() {
    let buffer = Arc::new(PcmMixBuffer::new(&PcmBufferConfig::default()));
    let mut engine = AudioEngine::new(Arc::clone(&buffer), &AudioEngineConfig::default());

    // Desktop capture hands over odd-sized chunks (e.g. 333 frames at a
    // time); the engine must still emit exactly 1024-frame ticks.
    for _ in 0..4 {
        buffer.feed(PcmBlock {
            source: AudioSource::Desktop,
            samples: vec![0.3; 333 * 2],
            frame_count: 333,
        });
    }

    let block = engine.tick();
    assert_eq!(block.frame_count(), AAC_FRAME);
}
