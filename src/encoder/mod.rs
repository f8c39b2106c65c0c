//! Encoder adapter contracts (spec §4.5, §9 capability set).
//!
//! `VideoEncoder`/`AudioEncoder` are the only boundary the pipeline core
//! depends on; the bundled ffmpeg-backed implementations live in
//! `ffmpeg_video`/`ffmpeg_audio` and are the sole place libavcodec types
//! appear. A test or alternate codec backend only needs to satisfy these
//! traits, never touch ffmpeg.

pub mod ffmpeg_audio;
pub mod ffmpeg_video;

use crate::error::EncoderError;
use crate::types::{
    AudioOutputBlock, CodecConfig, EncodedAudioPacket, EncodedVideoPacket, RawVideoFrame,
};

/// Encodes paced video frames into a bitstream. Implementations own their
/// own GOP/bitrate policy; the core only calls `encode` once per paced
/// frame and `flush` exactly once at shutdown.
pub trait VideoEncoder: Send {
    /// Opens the encoder and returns the extradata (e.g. avcC) the muxer
    /// needs to write stream headers.
    fn initialize(&mut self, width: u32, height: u32, fps: u32) -> Result<CodecConfig, EncoderError>;

    fn encode(&mut self, frame: &RawVideoFrame, frame_index: u64) -> Result<Option<EncodedVideoPacket>, EncoderError>;

    /// Drains any packets buffered inside the codec (B-frame reordering,
    /// lookahead). Returns an empty vec if none remain.
    fn flush(&mut self) -> Result<Vec<EncodedVideoPacket>, EncoderError>;

    fn codec_name(&self) -> &'static str;
}

/// Encodes fixed-size 1024-sample audio blocks into a bitstream.
pub trait AudioEncoder: Send {
    fn initialize(&mut self, sample_rate: u32, channels: u32) -> Result<CodecConfig, EncoderError>;

    fn encode(&mut self, block: &AudioOutputBlock) -> Result<Option<EncodedAudioPacket>, EncoderError>;

    fn flush(&mut self) -> Result<Vec<EncodedAudioPacket>, EncoderError>;

    fn codec_name(&self) -> &'static str;
}

/// In-process fakes for exercising `Pipeline` end to end without a real
/// libavcodec build (SPEC_FULL §E). Mirrors `capture::test_support`.
pub mod test_support {
    use super::{AudioEncoder, VideoEncoder};
    use crate::error::EncoderError;
    use crate::types::{
        AudioOutputBlock, CodecConfig, EncodedAudioPacket, EncodedVideoPacket, RawVideoFrame,
    };

    /// Returns one packet per `encode` call, keyframe every `gop_size`
    /// frames, with frame data stubbed to its own frame index so tests can
    /// tell packets apart without decoding anything.
    pub struct FakeVideoEncoder {
        gop_size: u64,
    }

    impl FakeVideoEncoder {
        pub fn new(gop_size: u64) -> Self {
            Self { gop_size }
        }
    }

    impl VideoEncoder for FakeVideoEncoder {
        fn initialize(&mut self, _width: u32, _height: u32, _fps: u32) -> Result<CodecConfig, EncoderError> {
            Ok(CodecConfig(vec![0xde, 0xad, 0xbe, 0xef]))
        }

        fn encode(&mut self, _frame: &RawVideoFrame, frame_index: u64) -> Result<Option<EncodedVideoPacket>, EncoderError> {
            Ok(Some(EncodedVideoPacket {
                data: frame_index.to_le_bytes().to_vec(),
                is_keyframe: frame_index % self.gop_size == 0,
                frame_index,
            }))
        }

        fn flush(&mut self) -> Result<Vec<EncodedVideoPacket>, EncoderError> {
            Ok(Vec::new())
        }

        fn codec_name(&self) -> &'static str {
            "fake-video"
        }
    }

    /// Returns exactly one packet per `encode` call; never buffers, so
    /// `flush` always drains empty.
    pub struct FakeAudioEncoder;

    impl AudioEncoder for FakeAudioEncoder {
        fn initialize(&mut self, _sample_rate: u32, _channels: u32) -> Result<CodecConfig, EncoderError> {
            Ok(CodecConfig(vec![0xaa, 0xbb]))
        }

        fn encode(&mut self, block: &AudioOutputBlock) -> Result<Option<EncodedAudioPacket>, EncoderError> {
            Ok(Some(EncodedAudioPacket {
                data: block.pts_in_frames.to_le_bytes().to_vec(),
                num_samples: block.frame_count() as u32,
            }))
        }

        fn flush(&mut self) -> Result<Vec<EncodedAudioPacket>, EncoderError> {
            Ok(Vec::new())
        }

        fn codec_name(&self) -> &'static str {
            "fake-audio"
        }
    }
}
