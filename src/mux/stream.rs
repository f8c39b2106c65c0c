//! FLV/RTMP streaming muxer (spec §4.8, §4.10).
//!
//! Unlike `FileMuxer`, `write_packet` does not touch the network itself: it
//! only enqueues onto the shared `PacketQueue`. `Sender` is the sole
//! consumer of that queue and calls back into `write_through_transport` to
//! perform the actual wall-clock-paced write, including reconnects. This
//! split is what lets `Sender` pace writes independently of however fast
//! packets are produced (spec §4.10).

use super::{write_extradata, Muxer};
use crate::error::MuxError;
use crate::packet_queue::PacketQueue;
use crate::timebase::rescale;
use crate::types::{CodecConfig, MuxPacket, StreamKind, TimeBase};
use ffmpeg_next as ffmpeg;
use std::sync::Arc;

pub struct StreamMuxer {
    transport: RtmpTransport,
    queue: Arc<PacketQueue>,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    header_written: bool,
    video_extradata: CodecConfig,
    audio_extradata: CodecConfig,
    fps: u32,
    sample_rate: u32,
}

impl StreamMuxer {
    pub fn new(url: impl Into<String>, queue: Arc<PacketQueue>) -> Self {
        Self {
            transport: RtmpTransport::new(url),
            queue,
            video_stream_index: None,
            audio_stream_index: None,
            header_written: false,
            video_extradata: CodecConfig::default(),
            audio_extradata: CodecConfig::default(),
            fps: 30,
            sample_rate: 48_000,
        }
    }

    pub fn queue(&self) -> Arc<PacketQueue> {
        Arc::clone(&self.queue)
    }

    /// Performs the actual network write for one dequeued packet. Called
    /// by `Sender`, never by the core encode path, so a stalled connection
    /// only blocks `Sender`'s drain loop (spec §4.10).
    pub fn write_through_transport(&mut self, packet: &MuxPacket) -> Result<usize, MuxError> {
        if !self.transport.is_connected() {
            self.transport.connect()?;
            self.reopen_streams_on_transport()?;
        }

        let stream_index = match packet.stream {
            StreamKind::Video => self
                .video_stream_index
                .ok_or(MuxError::StreamNotConfigured("video"))?,
            StreamKind::Audio => self
                .audio_stream_index
                .ok_or(MuxError::StreamNotConfigured("audio"))?,
        };

        let dst_tb = match packet.stream {
            StreamKind::Video => TimeBase::new(1, self.fps as i64),
            StreamKind::Audio => TimeBase::new(1, self.sample_rate as i64),
        };
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

        let output = self
            .transport
            .output_mut()
            .expect("connected above");
        av_packet
            .write_interleaved(output)
            .map_err(|e| MuxError::Transport(crate::error::TransportError::WriteFailed(e.to_string())))?;
        Ok(packet.data.len())
    }

    /// Re-establishes stream descriptors and re-writes the FLV header after
    /// a reconnect, reusing the extradata captured at `add_*_stream` time so
    /// a fresh sequence header reaches the new connection (spec §4.10).
    fn reopen_streams_on_transport(&mut self) -> Result<(), MuxError> {
        let output = self
            .transport
            .output_mut()
            .ok_or_else(|| MuxError::OpenFailed("transport not connected".to_string()))?;

        let mut video_stream = output
            .add_stream(ffmpeg::codec::Id::H264)
            .map_err(|e| MuxError::OpenFailed(e.to_string()))?;
        video_stream.set_time_base(ffmpeg::Rational::new(1, self.fps as i32));
        unsafe {
            let params = (*video_stream.as_mut_ptr()).codecpar;
            write_extradata(params, &self.video_extradata.0);
        }
        self.video_stream_index = Some(video_stream.index());

        let mut audio_stream = output
            .add_stream(ffmpeg::codec::Id::AAC)
            .map_err(|e| MuxError::OpenFailed(e.to_string()))?;
        audio_stream.set_time_base(ffmpeg::Rational::new(1, self.sample_rate as i32));
        unsafe {
            let params = (*audio_stream.as_mut_ptr()).codecpar;
            write_extradata(params, &self.audio_extradata.0);
        }
        self.audio_stream_index = Some(audio_stream.index());

        output
            .write_header()
            .map_err(|e| MuxError::HeaderFailed(e.to_string()))?;
        self.header_written = true;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }
}

impl Muxer for StreamMuxer {
    fn add_video_stream(&mut self, extradata: &CodecConfig, fps: u32) -> Result<(), MuxError> {
        self.video_extradata = extradata.clone();
        self.fps = fps;
        Ok(())
    }

    fn add_audio_stream(&mut self, extradata: &CodecConfig, sample_rate: u32) -> Result<(), MuxError> {
        self.audio_extradata = extradata.clone();
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), MuxError> {
        // Deferred to the first successful transport connect (spec §4.10):
        // there's nothing to write a header to until `Sender` connects.
        Ok(())
    }

    fn write_packet(&mut self, packet: MuxPacket) -> Result<(), MuxError> {
        self.queue.try_push(packet).map_err(MuxError::Dropped)
    }

    fn write_trailer(&mut self) -> Result<(), MuxError> {
        self.disconnect();
        Ok(())
    }
}
