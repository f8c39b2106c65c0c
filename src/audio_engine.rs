//! `AudioEngine` (spec §4.3, invariant C3) — the clock master.
//!
//! Every tick pulls exactly 1024 frames from each source (zero-padded by
//! `PcmMixBuffer` if starved), mixes with configurable gains, and clamps to
//! the valid float range. This never fails and never blocks past the
//! `PcmMixBuffer` read, which is itself non-blocking — the rest of the
//! pipeline is paced against this tick, not the other way around.

use crate::config::AudioEngineConfig;
use crate::pcm_mix_buffer::PcmMixBuffer;
use crate::types::{AudioOutputBlock, AudioSource, AAC_FRAME};
use std::sync::Arc;

pub struct AudioEngine {
    buffer: Arc<PcmMixBuffer>,
    desktop_gain: f32,
    mic_gain: f32,
    frames_emitted: u64,
}

impl AudioEngine {
    pub fn new(buffer: Arc<PcmMixBuffer>, cfg: &AudioEngineConfig) -> Self {
        Self {
            buffer,
            desktop_gain: cfg.desktop_gain,
            mic_gain: cfg.mic_gain,
            frames_emitted: 0,
        }
    }

    /// Produces exactly one `AAC_FRAME`-sample mixed block (spec §4.3
    /// mixing law: `clamp(desktop * desktop_gain + mic * mic_gain, -1, 1)`).
    pub fn tick(&mut self) -> AudioOutputBlock {
        let desktop = self.buffer.consume(AudioSource::Desktop, AAC_FRAME);
        let mic = self.buffer.consume(AudioSource::Mic, AAC_FRAME);

        let samples: Vec<f32> = desktop
            .iter()
            .zip(mic.iter())
            .map(|(&d, &m)| (d * self.desktop_gain + m * self.mic_gain).clamp(-1.0, 1.0))
            .collect();

        let pts_in_frames = self.frames_emitted;
        self.frames_emitted += AAC_FRAME as u64;

        AudioOutputBlock {
            samples,
            pts_in_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PcmBlock;

    fn engine_with_buffer() -> (AudioEngine, Arc<PcmMixBuffer>) {
        let buffer = Arc::new(PcmMixBuffer::new(&crate::config::PcmBufferConfig::default()));
        let engine = AudioEngine::new(buffer.clone(), &AudioEngineConfig::default());
        (engine, buffer)
    }

    #[test]
    fn tick_emits_exactly_one_frame_of_silence_when_starved() {
        let (mut engine, _buffer) = engine_with_buffer();
        let block = engine.tick();
        assert_eq!(block.frame_count(), AAC_FRAME);
        assert!(block.samples.iter().all(|&s| s == 0.0));
        assert_eq!(block.pts_in_frames, 0);
    }

    #[test]
    fn pts_advances_by_frame_count_each_tick() {
        let (mut engine, _buffer) = engine_with_buffer();
        let first = engine.tick();
        let second = engine.tick();
        assert_eq!(first.pts_in_frames, 0);
        assert_eq!(second.pts_in_frames, AAC_FRAME as u64);
    }

    #[test]
    fn mixing_applies_gains_and_clamps() {
        let (mut engine, buffer) = engine_with_buffer();
        buffer.feed(PcmBlock {
            source: AudioSource::Desktop,
            samples: vec![1.0; AAC_FRAME * 2],
            frame_count: AAC_FRAME,
        });
        buffer.feed(PcmBlock {
            source: AudioSource::Mic,
            samples: vec![1.0; AAC_FRAME * 2],
            frame_count: AAC_FRAME,
        });
        let block = engine.tick();
        // desktop_gain(1.0) + mic_gain(1.2) = 2.2, clamped to 1.0.
        assert!(block.samples.iter().all(|&s| s == 1.0));
    }
}
