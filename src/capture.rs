//! Capture-source contracts (spec §9 capability set).
//!
//! Screen/camera grabbing and OS audio loopback are platform collaborators
//! that live outside this crate. `VideoSource`/`AudioSource` are the only
//! boundary the pipeline core depends on; anything satisfying them — a real
//! platform capturer, or the synthetic generator in `test_support` — can
//! drive `Pipeline` identically.

use crate::types::{PcmBlock, RawVideoFrame};

/// Pulls the most recent raw video frame available, if any (non-blocking).
/// Implementations own their own internal buffering; `FrameRing` only ever
/// asks for "the latest frame known right now".
pub trait VideoSource: Send {
    fn try_latest_frame(&mut self) -> Option<RawVideoFrame>;
}

/// Pulls whatever PCM has accumulated for one audio source since the last
/// call (non-blocking). May return a block with `frame_count == 0`.
pub trait AudioSource: Send {
    fn try_drain(&mut self) -> Option<PcmBlock>;
}

/// Synthetic sources for tests and the smoke-test binary (SPEC_FULL §E).
/// Never compiled into a real capture path; gated so it can't leak into
/// release builds by accident.
pub mod test_support {
    use super::{AudioSource, VideoSource};
    use crate::types::{
        AudioSource as AudioSourceKind, PcmBlock, PixelFormat, RawVideoFrame,
    };
    use std::sync::{Arc, Mutex};

    /// Produces solid black BGRA8 frames on demand, with a manually
    /// advanceable capture clock so pacing tests control timing exactly.
    pub struct SyntheticVideoSource {
        width: u32,
        height: u32,
        clock_ns: Arc<Mutex<u64>>,
        pending: Option<RawVideoFrame>,
    }

    impl SyntheticVideoSource {
        pub fn new(width: u32, height: u32, clock_ns: Arc<Mutex<u64>>) -> Self {
            Self {
                width,
                height,
                clock_ns,
                pending: None,
            }
        }

        /// Injects a frame to be returned by the next `try_latest_frame`
        /// call, tagged with the source's current clock value.
        pub fn inject_frame(&mut self, data: Vec<u8>) {
            let capture_ns = *self.clock_ns.lock().unwrap();
            self.pending = Some(RawVideoFrame {
                width: self.width,
                height: self.height,
                pixel_format_tag: PixelFormat::Bgra8,
                capture_ns,
                data: Arc::from(data.into_boxed_slice()),
            });
        }
    }

    impl VideoSource for SyntheticVideoSource {
        fn try_latest_frame(&mut self) -> Option<RawVideoFrame> {
            self.pending.take()
        }
    }

    /// Emits a fixed block of interleaved stereo PCM each time it's asked,
    /// or nothing once `remaining_blocks` is exhausted (simulating a source
    /// that stalls, for `AudioEngine` silence-padding tests).
    pub struct SyntheticAudioSource {
        kind: AudioSourceKind,
        samples_per_block: usize,
        remaining_blocks: usize,
    }

    impl SyntheticAudioSource {
        pub fn new(kind: AudioSourceKind, samples_per_block: usize, blocks: usize) -> Self {
            Self {
                kind,
                samples_per_block,
                remaining_blocks: blocks,
            }
        }
    }

    impl AudioSource for SyntheticAudioSource {
        fn try_drain(&mut self) -> Option<PcmBlock> {
            if self.remaining_blocks == 0 {
                return None;
            }
            self.remaining_blocks -= 1;
            let frame_count = self.samples_per_block;
            Some(PcmBlock {
                source: self.kind,
                samples: vec![0.1_f32; frame_count * 2],
                frame_count,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn synthetic_video_source_yields_injected_frame_once() {
            let clock = Arc::new(Mutex::new(42));
            let mut source = SyntheticVideoSource::new(4, 4, clock);
            assert!(source.try_latest_frame().is_none());
            source.inject_frame(vec![0u8; 4 * 4 * 4]);
            let frame = source.try_latest_frame().expect("frame");
            assert_eq!(frame.capture_ns, 42);
            assert!(source.try_latest_frame().is_none());
        }

        #[test]
        fn synthetic_audio_source_exhausts_after_n_blocks() {
            let mut source = SyntheticAudioSource::new(AudioSourceKind::Mic, 1024, 2);
            assert!(source.try_drain().is_some());
            assert!(source.try_drain().is_some());
            assert!(source.try_drain().is_none());
        }
    }
}
