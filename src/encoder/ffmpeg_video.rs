//! Bundled libx264 video encoder adapter.
//!
//! Grounded in `george-e-shaw-iv-peaking`'s `SegmentEncoderInner` (codec
//! lookup with a hardware-then-software fallback order, GOP/no-B-frame
//! flags via the raw `AVCodecContext`, extradata extraction) and
//! `DA1F-RoAnalyzer`'s `StreamPuffer::encode_to_mp4` (RGB24/BGRA -> YUV420P
//! scaling before encode). This is the only file in the crate that names
//! libx264 directly; everything above `VideoEncoder` is codec-agnostic.

use super::VideoEncoder;
use crate::error::EncoderError;
use crate::types::{CodecConfig, EncodedVideoPacket, PixelFormat, RawVideoFrame};
use ffmpeg_next as ffmpeg;
use tracing::{debug, info, warn};

pub struct FfmpegVideoEncoder {
    encoder: Option<ffmpeg::codec::encoder::Video>,
    scaler: Option<ffmpeg::software::scaling::Context>,
    width: u32,
    height: u32,
    codec_name: &'static str,
}

impl FfmpegVideoEncoder {
    pub fn new() -> Self {
        Self {
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            codec_name: "libx264",
        }
    }

    fn source_pixel_format(tag: PixelFormat) -> ffmpeg::format::Pixel {
        match tag {
            PixelFormat::Bgra8 => ffmpeg::format::Pixel::BGRA,
            PixelFormat::Rgb24 => ffmpeg::format::Pixel::RGB24,
        }
    }

    fn find_codec() -> Result<ffmpeg::codec::Codec, EncoderError> {
        ffmpeg::encoder::find_by_name("libx264")
            .ok_or_else(|| EncoderError::CodecUnavailable("libx264".to_string()))
    }
}

impl Default for FfmpegVideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn initialize(
        &mut self,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<CodecConfig, EncoderError> {
        let codec = Self::find_codec()?;
        info!(codec = self.codec_name, width, height, fps, "opening video encoder");

        let context = ffmpeg::codec::Context::new_with_codec(codec);
        let mut encoder = context.encoder().video().map_err(|e| EncoderError::OpenFailed {
            codec: self.codec_name.to_string(),
            reason: e.to_string(),
        })?;

        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(ffmpeg::format::Pixel::YUV420P);
        encoder.set_time_base(ffmpeg::Rational::new(1, fps as i32));
        encoder.set_gop(fps * 2);
        encoder.set_max_b_frames(0);
        encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);

        let opened = encoder
            .open_as(codec)
            .map_err(|e| EncoderError::OpenFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            })?;

        let extradata = opened
            .extradata()
            .map(|data| data.to_vec())
            .unwrap_or_default();

        self.width = width;
        self.height = height;
        self.encoder = Some(opened);
        Ok(CodecConfig(extradata))
    }

    fn encode(
        &mut self,
        frame: &RawVideoFrame,
        frame_index: u64,
    ) -> Result<Option<EncodedVideoPacket>, EncoderError> {
        let encoder = self.encoder.as_mut().ok_or_else(|| EncoderError::EncodeFailed {
            codec: self.codec_name.to_string(),
            reason: "encoder not initialized".to_string(),
        })?;

        if self.scaler.is_none() {
            let source_fmt = Self::source_pixel_format(frame.pixel_format_tag);
            self.scaler = Some(
                ffmpeg::software::scaling::Context::get(
                    source_fmt,
                    frame.width,
                    frame.height,
                    ffmpeg::format::Pixel::YUV420P,
                    frame.width,
                    frame.height,
                    ffmpeg::software::scaling::Flags::BILINEAR,
                )
                .map_err(|e| EncoderError::EncodeFailed {
                    codec: self.codec_name.to_string(),
                    reason: e.to_string(),
                })?,
            );
        }

        let mut source = ffmpeg::util::frame::Video::new(
            Self::source_pixel_format(frame.pixel_format_tag),
            frame.width,
            frame.height,
        );
        source.data_mut(0)[..frame.data.len()].copy_from_slice(&frame.data);

        let mut yuv = ffmpeg::util::frame::Video::new(
            ffmpeg::format::Pixel::YUV420P,
            frame.width,
            frame.height,
        );
        self.scaler
            .as_mut()
            .expect("scaler initialized above")
            .run(&source, &mut yuv)
            .map_err(|e| EncoderError::EncodeFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            })?;
        yuv.set_pts(Some(frame_index as i64));

        encoder.send_frame(&yuv).map_err(|e| EncoderError::EncodeFailed {
            codec: self.codec_name.to_string(),
            reason: e.to_string(),
        })?;

        let mut packet = ffmpeg::Packet::empty();
        match encoder.receive_packet(&mut packet) {
            Ok(()) => {
                let is_keyframe = packet.is_key();
                debug!(frame_index, is_keyframe, "video packet encoded");
                Ok(Some(EncodedVideoPacket {
                    data: packet.data().unwrap_or_default().to_vec(),
                    is_keyframe,
                    frame_index,
                }))
            }
            Err(ffmpeg::Error::Other { errno } ) if errno == ffmpeg::util::error::EAGAIN => Ok(None),
            Err(e) => Err(EncoderError::EncodeFailed {
                codec: self.codec_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn flush(&mut self) -> Result<Vec<EncodedVideoPacket>, EncoderError> {
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
                Ok(()) => out.push(EncodedVideoPacket {
                    data: packet.data().unwrap_or_default().to_vec(),
                    is_keyframe: packet.is_key(),
                    frame_index: packet.pts().unwrap_or(0) as u64,
                }),
                Err(_) => break,
            }
        }
        warn!(flushed = out.len(), "video encoder flushed at shutdown");
        Ok(out)
    }

    fn codec_name(&self) -> &'static str {
        self.codec_name
    }
}
