//! Shared data model entities (spec §3).
//!
//! Each type is owned by exactly one component at a time — producer, then
//! consumer, handed off by move. Nothing here is `Clone` unless a genuine
//! fan-out requires it (`RawVideoFrame`, which `FrameRing` hands to the
//! pacer and also keeps as its "last frame" for duplication).

use std::time::Duration;

/// A raw captured video frame. The core treats pixel data as opaque bytes;
/// it never interprets `pixel_format_tag` itself (that's the concrete
/// `VideoEncoder` adapter's job).
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixel_format_tag: PixelFormat,
    /// Monotonic capture timestamp, nanoseconds since an arbitrary epoch.
    pub capture_ns: u64,
    pub data: std::sync::Arc<[u8]>,
}

/// Pixel formats the bundled ffmpeg encoder adapter understands directly.
/// A capture collaborator declaring a different tag is rejected at
/// `VideoEncoder::initialize` time, not silently reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
    Rgb24,
}

/// Which live audio source a `PcmBlock` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSource {
    Desktop,
    Mic,
}

/// A chunk of interleaved float32 stereo PCM at 48 kHz pushed by a capture
/// collaborator. `PcmMixBuffer` owns these until `AudioEngine` consumes them.
#[derive(Debug, Clone)]
pub struct PcmBlock {
    pub source: AudioSource,
    /// Interleaved [L, R, L, R, ...] samples.
    pub samples: Vec<f32>,
    /// Sample-frames represented by `samples` (i.e. `samples.len() / 2`).
    pub frame_count: usize,
}

/// The fixed-size output of one `AudioEngine::tick()` (spec §4.3).
#[derive(Debug, Clone)]
pub struct AudioOutputBlock {
    /// Interleaved stereo float32, always exactly `AAC_FRAME * 2` samples.
    pub samples: Vec<f32>,
    /// Cumulative sample-frames emitted *before* this block.
    pub pts_in_frames: u64,
}

pub const AAC_FRAME: usize = 1024;
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
pub const AUDIO_CHANNELS: usize = 2;

impl AudioOutputBlock {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / AUDIO_CHANNELS
    }
}

/// Codec extradata (H.264 avcC SPS/PPS, AAC AudioSpecificConfig, ...),
/// handed from `VideoEncoder`/`AudioEncoder::initialize` to the muxers.
/// May be empty for codecs that need none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecConfig(pub Vec<u8>);

/// One encoded video packet, pre-timestamp (spec §3). `VideoPacer` assigns
/// `frame_index`; PTS/DTS are computed later by `TimebaseMapper`.
#[derive(Debug, Clone)]
pub struct EncodedVideoPacket {
    pub data: Vec<u8>,
    pub is_keyframe: bool,
    pub frame_index: u64,
}

/// One encoded audio packet, pre-timestamp. `num_samples` is 1024 except
/// possibly for the final flushed packet (spec §3).
#[derive(Debug, Clone)]
pub struct EncodedAudioPacket {
    pub data: Vec<u8>,
    pub num_samples: u32,
}

/// Which logical stream a `MuxPacket` belongs to. Audio is prioritized over
/// video on exact `pts_us` ties when interleaving (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamKind {
    Audio = 0,
    Video = 1,
}

/// A fully timestamped packet ready to hand to a container writer (spec §3).
#[derive(Debug, Clone)]
pub struct MuxPacket {
    pub stream: StreamKind,
    pub data: Vec<u8>,
    pub pts_us: i64,
    pub dts_us: i64,
    pub duration_us: i64,
    pub is_keyframe: bool,
}

impl MuxPacket {
    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.duration_us.max(0) as u64)
    }
}

/// An integer rational time base, e.g. `{1, 48_000}` for 48 kHz audio or
/// `{1, fps}` for CFR video (spec §4.6 glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i64,
    pub den: i64,
}

impl TimeBase {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    pub const MICROS: TimeBase = TimeBase::new(1, 1_000_000);
}
