//! MP4 file muxer (spec §4.8). Writes synchronously on the calling thread —
//! there's no network to stall on, so no queue sits between encoder and
//! disk. Grounded directly in `DA1F-RoAnalyzer`'s
//! `StreamPuffer::encode_to_mp4` (stream setup, `write_header`, per-packet
//! `rescale_ts` + `write_frame`, `write_trailer`).

use super::{write_extradata, Muxer};
use crate::error::MuxError;
use crate::timebase::rescale;
use crate::types::{CodecConfig, MuxPacket, StreamKind, TimeBase};
use ffmpeg_next as ffmpeg;
use tracing::info;

pub struct FileMuxer {
    path: String,
    output: Option<ffmpeg::format::context::Output>,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    video_time_base: Option<TimeBase>,
    audio_time_base: Option<TimeBase>,
    header_written: bool,
}

impl FileMuxer {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            output: None,
            video_stream_index: None,
            audio_stream_index: None,
            video_time_base: None,
            audio_time_base: None,
            header_written: false,
        }
    }

    fn output_mut(&mut self) -> Result<&mut ffmpeg::format::context::Output, MuxError> {
        if self.output.is_none() {
            let output = ffmpeg::format::output(&self.path)
                .map_err(|e| MuxError::OpenFailed(e.to_string()))?;
            self.output = Some(output);
        }
        Ok(self.output.as_mut().expect("just initialized"))
    }
}

impl Muxer for FileMuxer {
    fn add_video_stream(&mut self, extradata: &CodecConfig, fps: u32) -> Result<(), MuxError> {
        let output = self.output_mut()?;
        let mut stream = output
            .add_stream(ffmpeg::codec::Id::H264)
            .map_err(|e| MuxError::OpenFailed(e.to_string()))?;
        stream.set_time_base(ffmpeg::Rational::new(1, fps as i32));
        unsafe {
            let params = (*stream.as_mut_ptr()).codecpar;
            write_extradata(params, &extradata.0);
        }
        self.video_stream_index = Some(stream.index());
        self.video_time_base = Some(TimeBase::new(1, fps as i64));
        Ok(())
    }

    fn add_audio_stream(&mut self, extradata: &CodecConfig, sample_rate: u32) -> Result<(), MuxError> {
        let output = self.output_mut()?;
        let mut stream = output
            .add_stream(ffmpeg::codec::Id::AAC)
            .map_err(|e| MuxError::OpenFailed(e.to_string()))?;
        stream.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));
        unsafe {
            let params = (*stream.as_mut_ptr()).codecpar;
            write_extradata(params, &extradata.0);
        }
        self.audio_stream_index = Some(stream.index());
        self.audio_time_base = Some(TimeBase::new(1, sample_rate as i64));
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), MuxError> {
        info!(path = %self.path, "writing mp4 header");
        self.output_mut()?
            .write_header()
            .map_err(|e| MuxError::HeaderFailed(e.to_string()))?;
        self.header_written = true;
        Ok(())
    }

    fn write_packet(&mut self, packet: MuxPacket) -> Result<(), MuxError> {
        let (stream_index, dst_tb) = match packet.stream {
            StreamKind::Video => (
                self.video_stream_index
                    .ok_or(MuxError::StreamNotConfigured("video"))?,
                self.video_time_base
                    .ok_or(MuxError::StreamNotConfigured("video"))?,
            ),
            StreamKind::Audio => (
                self.audio_stream_index
                    .ok_or(MuxError::StreamNotConfigured("audio"))?,
                self.audio_time_base
                    .ok_or(MuxError::StreamNotConfigured("audio"))?,
            ),
        };

        // Packets carry microsecond-domain timestamps (spec §4.6); the
        // container stream declares its own time_base, so every write
        // rescales pts/dts/duration back out of microseconds first —
        // the same step the teacher takes via `rescale_ts` before
        // `write_frame`.
        let pts = rescale(packet.pts_us, TimeBase::MICROS, dst_tb);
        let dts = rescale(packet.dts_us, TimeBase::MICROS, dst_tb);
        let duration = rescale(packet.duration_us, TimeBase::MICROS, dst_tb);

        let mut av_packet = ffmpeg::Packet::copy(&packet.data);
        av_packet.set_stream(stream_index);
        av_packet.set_pts(Some(pts));
        av_packet.set_dts(Some(dts));
        av_packet.set_duration(duration);
        if packet.is_keyframe {
            av_packet.set_flags(ffmpeg::packet::Flags::KEY);
        }

        av_packet
            .write_interleaved(self.output.as_mut().expect("header already written"))
            .map_err(|e| MuxError::HeaderFailed(e.to_string()))
    }

    fn write_trailer(&mut self) -> Result<(), MuxError> {
        if !self.header_written {
            return Ok(());
        }
        self.output
            .as_mut()
            .expect("header already written")
            .write_trailer()
            .map_err(|e| MuxError::TrailerFailed(e.to_string()))
    }
}
