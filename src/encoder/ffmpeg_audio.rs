//! Bundled AAC audio encoder adapter.
//!
//! Grounded in `DA1F-RoAnalyzer`'s `StreamPuffer::encode_to_mp4` AAC path
//! (F32 planar resampling, 1024-sample frame buffering) and
//! `velocut-media`'s `encode.rs` audio FIFO pattern for turning the fixed
//! 1024-sample blocks `AudioEngine` emits into whatever frame size the
//! opened codec actually reports.

use super::AudioEncoder;
use crate::error::EncoderError;
use crate::types::{AudioOutputBlock, CodecConfig, EncodedAudioPacket};
use ffmpeg_next as ffmpeg;
use tracing::{debug, info, warn};

pub struct FfmpegAudioEncoder {
    encoder: Option<ffmpeg::codec::encoder::Audio>,
    resampler: Option<ffmpeg::software::resampling::Context>,
    samples_emitted: i64,
    codec_name: &'static str,
}

impl FfmpegAudioEncoder {
    pub fn new() -> Self {
        Self {
            encoder: None,
            resampler: None,
            samples_emitted: 0,
            codec_name: "aac",
        }
    }
}

impl Default for FfmpegAudioEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEncoder for FfmpegAudioEncoder {
    fn initialize(&mut self, sample_rate: u32, channels: u32) -> Result<CodecConfig, EncoderError> {
        let codec = ffmpeg::encoder::find_by_name("aac")
            .ok_or_else(|| EncoderError::CodecUnavailable("aac".to_string()))?;
        info!(codec = self.codec_name, sample_rate, channels, "opening audio encoder");

        let context = ffmpeg::codec::Context::new_with_codec(codec);
        let mut encoder = context.encoder().audio().map_err(|e| EncoderError::OpenFailed {
            codec: self.codec_name.to_string(),
            reason: e.to_string(),
        })?;

        encoder.set_rate(sample_rate as i32);
        encoder.set_channel_layout(ffmpeg::ChannelLayout::STEREO);
        encoder.set_format(ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar));
        encoder.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));
        encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);

        let opened = encoder
            .open_as(codec)
            .map_err(|e| EncoderError::OpenFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            })?;

        self.resampler = Some(
            ffmpeg::software::resampling::Context::get(
                ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
                ffmpeg::ChannelLayout::STEREO,
                sample_rate,
                ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar),
                ffmpeg::ChannelLayout::STEREO,
                sample_rate,
            )
            .map_err(|e| EncoderError::OpenFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            })?,
        );

        let extradata = opened
            .extradata()
            .map(|data| data.to_vec())
            .unwrap_or_default();
        self.encoder = Some(opened);
        Ok(CodecConfig(extradata))
    }

    fn encode(&mut self, block: &AudioOutputBlock) -> Result<Option<EncodedAudioPacket>, EncoderError> {
        let encoder = self.encoder.as_mut().ok_or_else(|| EncoderError::EncodeFailed {
            codec: self.codec_name.to_string(),
            reason: "encoder not initialized".to_string(),
        })?;

        let frame_count = block.frame_count();
        let mut packed = ffmpeg::util::frame::Audio::new(
            ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
            frame_count,
            ffmpeg::ChannelLayout::STEREO,
        );
        let bytes: &[u8] = bytemuck_cast_f32_slice(&block.samples);
        packed.data_mut(0)[..bytes.len()].copy_from_slice(bytes);

        let mut planar = ffmpeg::util::frame::Audio::new(
            ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar),
            frame_count,
            ffmpeg::ChannelLayout::STEREO,
        );
        self.resampler
            .as_mut()
            .expect("resampler initialized at initialize()")
            .run(&packed, &mut planar)
            .map_err(|e| EncoderError::EncodeFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            })?;
        planar.set_pts(Some(self.samples_emitted));
        self.samples_emitted += frame_count as i64;

        encoder.send_frame(&planar).map_err(|e| EncoderError::EncodeFailed {
            codec: self.codec_name.to_string(),
            reason: e.to_string(),
        })?;

        let mut packet = ffmpeg::Packet::empty();
        match encoder.receive_packet(&mut packet) {
            Ok(()) => {
                debug!(frame_count, "audio packet encoded");
                Ok(Some(EncodedAudioPacket {
                    data: packet.data().unwrap_or_default().to_vec(),
                    num_samples: frame_count as u32,
                }))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => Ok(None),
            Err(e) => Err(EncoderError::EncodeFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn flush(&mut self) -> Result<Vec<EncodedAudioPacket>, EncoderError> {
        let encoder = match self.encoder.as_mut() {
            Some(e) => e,
            None => return Ok(Vec::new()),
        };

        encoder.send_eof().map_err(|e| EncoderError::FlushFailed {
            codec: self.codec_name.to_string(),
            reason: e.to_string(),
        })?;

        let mut out = Vec::new();
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match encoder.receive_packet(&mut packet) {
                Ok(()) => out.push(EncodedAudioPacket {
                    data: packet.data().unwrap_or_default().to_vec(),
                    num_samples: 0,
                }),
                Err(_) => break,
            }
        }
        warn!(flushed = out.len(), "audio encoder flushed at shutdown");
        Ok(out)
    }

    fn codec_name(&self) -> &'static str {
        self.codec_name
    }
}

/// Reinterprets an f32 sample slice as raw little-endian bytes for ffmpeg's
/// packed-sample frame buffer, avoiding a per-sample copy loop.
fn bytemuck_cast_f32_slice(samples: &[f32]) -> &[u8] {
    // SAFETY: f32 has no padding and any bit pattern is valid; the
    // resulting byte slice's lifetime is tied to `samples`.
    unsafe {
        std::slice::from_raw_parts(samples.as_ptr() as *const u8, std::mem::size_of_val(samples))
    }
}
