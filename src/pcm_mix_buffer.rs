//! `PcmMixBuffer` (spec §4.2, invariant C2).
//!
//! Two independent bounded queues, one per source, decoupling arbitrary
//! capture chunk sizes from `AudioEngine`'s fixed 1024-sample consumption.
//! Grounded in `velocut-media`'s `encode.rs` audio FIFO (accumulate
//! arbitrary-size pushes, drain exact-size frames) and the drop-oldest
//! overflow policy from `DA1F-RoAnalyzer`'s `StreamPuffer`.

use crate::config::PcmBufferConfig;
use crate::types::{AudioSource, PcmBlock, AUDIO_SAMPLE_RATE};
use parking_lot::Mutex;
use std::collections::VecDeque;

struct SourceQueue {
    samples: VecDeque<f32>,
    high_water_samples: usize,
}

impl SourceQueue {
    fn new(high_water_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            high_water_samples,
        }
    }

    fn feed(&mut self, block: &PcmBlock) {
        self.samples.extend(block.samples.iter().copied());
        while self.samples.len() > self.high_water_samples {
            // Drop-oldest: discard one interleaved stereo frame (2 samples)
            // at a time so we never split a frame across the trim.
            self.samples.pop_front();
            self.samples.pop_front();
        }
    }

    fn available_frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Pops exactly `frames` sample-frames, zero-filling if fewer are
    /// available so the caller always gets a fixed-size block.
    fn consume(&mut self, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            let l = self.samples.pop_front().unwrap_or(0.0);
            let r = self.samples.pop_front().unwrap_or(0.0);
            out.push(l);
            out.push(r);
        }
        out
    }
}

pub struct PcmMixBuffer {
    desktop: Mutex<SourceQueue>,
    mic: Mutex<SourceQueue>,
}

impl PcmMixBuffer {
    pub fn new(cfg: &PcmBufferConfig) -> Self {
        let high_water_frames =
            (AUDIO_SAMPLE_RATE as u64 * cfg.high_water_ms / 1000) as usize;
        let high_water_samples = high_water_frames * 2;
        Self {
            desktop: Mutex::new(SourceQueue::new(high_water_samples)),
            mic: Mutex::new(SourceQueue::new(high_water_samples)),
        }
    }

    pub fn feed(&self, block: PcmBlock) {
        let queue = match block.source {
            AudioSource::Desktop => &self.desktop,
            AudioSource::Mic => &self.mic,
        };
        queue.lock().feed(&block);
    }

    /// Sample-frames currently queued for a source.
    pub fn available(&self, source: AudioSource) -> usize {
        match source {
            AudioSource::Desktop => self.desktop.lock().available_frames(),
            AudioSource::Mic => self.mic.lock().available_frames(),
        }
    }

    /// Consumes exactly `frames` sample-frames from a source, zero-padding
    /// any shortfall. Never blocks, never errors.
    pub fn consume(&self, source: AudioSource, frames: usize) -> Vec<f32> {
        match source {
            AudioSource::Desktop => self.desktop.lock().consume(frames),
            AudioSource::Mic => self.mic.lock().consume(frames),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(source: AudioSource, frames: usize, value: f32) -> PcmBlock {
        PcmBlock {
            source,
            samples: vec![value; frames * 2],
            frame_count: frames,
        }
    }

    #[test]
    fn consume_zero_fills_when_starved() {
        let buf = PcmMixBuffer::new(&PcmBufferConfig::default());
        let out = buf.consume(AudioSource::Desktop, 4);
        assert_eq!(out, vec![0.0; 8]);
    }

    #[test]
    fn feed_then_consume_round_trips_independent_sources() {
        let buf = PcmMixBuffer::new(&PcmBufferConfig::default());
        buf.feed(block(AudioSource::Desktop, 3, 0.5));
        buf.feed(block(AudioSource::Mic, 2, 0.25));

        assert_eq!(buf.available(AudioSource::Desktop), 3);
        assert_eq!(buf.available(AudioSource::Mic), 2);

        let desktop_out = buf.consume(AudioSource::Desktop, 3);
        assert!(desktop_out.iter().all(|&s| s == 0.5));
        let mic_out = buf.consume(AudioSource::Mic, 3);
        // Only 2 frames were available; the third is zero-padded.
        assert_eq!(&mic_out[0..4], &[0.25, 0.25, 0.25, 0.25][..]);
        assert_eq!(&mic_out[4..6], &[0.0, 0.0][..]);
    }

    #[test]
    fn overflow_drops_oldest_frames() {
        let mut cfg = PcmBufferConfig::default();
        cfg.high_water_ms = 10; // 480 frames at 48kHz
        let buf = PcmMixBuffer::new(&cfg);
        buf.feed(block(AudioSource::Desktop, 1000, 1.0));
        assert!(buf.available(AudioSource::Desktop) <= 480);
    }
}
