//! Muxer contract and concrete container writers (spec §4.7, §4.8, §9).
//!
//! `Muxer` is the shared trait `FileMuxer` and `StreamMuxer` implement so
//! `Pipeline` can drive either without knowing which one it has. Grounded
//! in `GhostKellz-ghoststream`'s `AvMuxer` (`add_video_stream`/
//! `add_audio_stream`/`write_video`/`write_audio`/`finish` shape).

pub mod file;
pub mod stream;
pub mod transport;

use crate::error::MuxError;
use crate::types::{CodecConfig, MuxPacket};

/// A container writer that accepts fully timestamped packets and owns
/// stream setup/teardown. `FileMuxer` writes synchronously to disk;
/// `StreamMuxer` enqueues onto a `PacketQueue` and lets `Sender` perform
/// the actual transport write (spec §4.8, §4.10).
pub trait Muxer: Send {
    fn add_video_stream(&mut self, extradata: &CodecConfig, fps: u32) -> Result<(), MuxError>;

    fn add_audio_stream(&mut self, extradata: &CodecConfig, sample_rate: u32) -> Result<(), MuxError>;

    fn write_header(&mut self) -> Result<(), MuxError>;

    fn write_packet(&mut self, packet: MuxPacket) -> Result<(), MuxError>;

    fn write_trailer(&mut self) -> Result<(), MuxError>;
}

/// Allocates an ffmpeg-owned extradata buffer and copies `bytes` into it,
/// zero-padding the mandatory `AV_INPUT_BUFFER_PADDING_SIZE` tail ffmpeg
/// expects past the declared size, then assigns both `extradata` and
/// `extradata_size` on the raw codecpar struct. Grounded in
/// `GhostKellz-ghoststream`'s `AvMuxer` (`av_malloc` + copy + padding before
/// assigning `extradata`). Shared by `FileMuxer` and `StreamMuxer` since both
/// write the same codecpar fields, just at different points in their
/// connection lifecycle.
///
/// # Safety
/// `params` must point to a live `AVCodecParameters` owned by a stream that
/// has not yet had `write_header` called on its container.
pub(crate) unsafe fn write_extradata(params: *mut ffmpeg_next::ffi::AVCodecParameters, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    let padded_len = bytes.len() + ffmpeg_next::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
    let buf = ffmpeg_next::ffi::av_malloc(padded_len) as *mut u8;
    if buf.is_null() {
        return;
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
    std::ptr::write_bytes(buf.add(bytes.len()), 0, padded_len - bytes.len());
    (*params).extradata = buf;
    (*params).extradata_size = bytes.len() as i32;
}

/// An in-process `Muxer` that records everything written to it instead of
/// touching ffmpeg, so `Pipeline` tests can assert ordering, drop behavior,
/// and extradata handling without a real container (SPEC_FULL §E). Mirrors
/// `capture::test_support`'s fakes.
pub mod test_support {
    use super::Muxer;
    use crate::error::{DropReason, MuxError};
    use crate::types::{CodecConfig, MuxPacket, StreamKind};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorded {
        video_extradata: Option<CodecConfig>,
        audio_extradata: Option<CodecConfig>,
        header_written: bool,
        trailer_written: bool,
        packets: Vec<MuxPacket>,
        video_writes_seen: u64,
    }

    /// Records everything written to it instead of touching ffmpeg.
    /// Implements `Muxer` on `Arc<FakeMuxer>` (not the bare type) so a test
    /// can keep its own handle after handing the `Arc` into `Pipeline` as a
    /// `Box<dyn Muxer>` — all the trait methods only need the interior
    /// `Mutex`, never `&mut self`.
    #[derive(Default)]
    pub struct FakeMuxer {
        inner: Mutex<Recorded>,
        /// When set, every Nth video packet is rejected with
        /// `DropReason::QueueFull` instead of recorded, so tests can exercise
        /// `Pipeline`'s drop-stats wiring without a real queue.
        drop_every_nth_video: Option<u64>,
    }

    impl FakeMuxer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_dropping_every_nth_video(n: u64) -> Self {
            Self {
                drop_every_nth_video: Some(n),
                ..Self::default()
            }
        }

        pub fn written_packets(&self) -> Vec<MuxPacket> {
            self.inner.lock().packets.clone()
        }

        pub fn header_written(&self) -> bool {
            self.inner.lock().header_written
        }

        pub fn trailer_written(&self) -> bool {
            self.inner.lock().trailer_written
        }

        pub fn video_extradata(&self) -> Option<CodecConfig> {
            self.inner.lock().video_extradata.clone()
        }

        pub fn audio_extradata(&self) -> Option<CodecConfig> {
            self.inner.lock().audio_extradata.clone()
        }
    }

    impl Muxer for Arc<FakeMuxer> {
        fn add_video_stream(&mut self, extradata: &CodecConfig, _fps: u32) -> Result<(), MuxError> {
            self.inner.lock().video_extradata = Some(extradata.clone());
            Ok(())
        }

        fn add_audio_stream(&mut self, extradata: &CodecConfig, _sample_rate: u32) -> Result<(), MuxError> {
            self.inner.lock().audio_extradata = Some(extradata.clone());
            Ok(())
        }

        fn write_header(&mut self) -> Result<(), MuxError> {
            self.inner.lock().header_written = true;
            Ok(())
        }

        fn write_packet(&mut self, packet: MuxPacket) -> Result<(), MuxError> {
            if packet.stream == StreamKind::Video {
                if let Some(n) = self.drop_every_nth_video {
                    let mut guard = self.inner.lock();
                    guard.video_writes_seen += 1;
                    if guard.video_writes_seen % n == 0 {
                        return Err(MuxError::Dropped(DropReason::QueueFull));
                    }
                }
            }
            self.inner.lock().packets.push(packet);
            Ok(())
        }

        fn write_trailer(&mut self) -> Result<(), MuxError> {
            self.inner.lock().trailer_written = true;
            Ok(())
        }
    }
}
