//! `Pipeline` (spec §4.11, invariant C11) — top-level orchestration and
//! the public entry point a host embeds.
//!
//! Spawns one OS thread per stage (video capture pump, per-source audio
//! capture pump, audio ticker, video ticker, and — for streaming output —
//! the `Sender` drain loop), coordinated by a single `should_stop` atomic
//! flag with a bounded shutdown deadline. Grounded in `DA1F-RoAnalyzer`'s
//! `stream.rs` consumer-thread sketch, generalized from its ad-hoc channel
//! wiring into the trait-object components built out across this crate.

use crate::audio_engine::AudioEngine;
use crate::capture::{AudioSource as AudioSourceCapture, VideoSource};
use crate::config::{OutputTarget, PipelineConfig};
use crate::encoder::{AudioEncoder, VideoEncoder};
use crate::error::{DropReason, MuxError, PipelineError};
use crate::frame_ring::FrameRing;
use crate::mux::file::FileMuxer;
use crate::mux::stream::StreamMuxer;
use crate::mux::Muxer;
use crate::packet_queue::PacketQueue;
use crate::pcm_mix_buffer::PcmMixBuffer;
use crate::sender::Sender;
use crate::stats::{StatsCounters, Statistics};
use crate::timebase::TimebaseMapper;
use crate::types::{AudioSource, CodecConfig, MuxPacket, StreamKind, TimeBase};
use crate::video_pacer::VideoPacer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Initializing,
    Running,
    Draining,
    Stopped,
    Failed,
}

/// Everything `Pipeline` needs from the host beyond what's in
/// `PipelineConfig`: the capture sources and the boxed codec adapters
/// (spec §9 — the core never constructs a concrete `VideoEncoder` itself).
pub struct PipelineInputs {
    pub video_source: Box<dyn VideoSource>,
    pub desktop_audio_source: Box<dyn AudioSourceCapture>,
    pub mic_audio_source: Box<dyn AudioSourceCapture>,
    pub video_encoder: Box<dyn VideoEncoder>,
    pub audio_encoder: Box<dyn AudioEncoder>,
}

/// The two concrete muxers behind `Muxer`, kept as a typed handle (rather
/// than `Box<dyn Muxer>`) so the streaming case can also hand its concrete
/// `StreamMuxer` to a `Sender` thread without a downcast.
#[derive(Clone)]
enum MuxerHandle {
    File(Arc<Mutex<FileMuxer>>),
    Stream(Arc<Mutex<StreamMuxer>>),
    /// An injected `Muxer` (e.g. `mux::test_support::FakeMuxer`), used only
    /// by `Pipeline::start_with_muxer` so tests can exercise the full
    /// thread/queue/stats machinery without real ffmpeg I/O (SPEC_FULL §E).
    Boxed(Arc<Mutex<Box<dyn Muxer>>>),
}

impl MuxerHandle {
    fn add_video_stream(&self, extradata: &CodecConfig, fps: u32) -> Result<(), crate::error::MuxError> {
        match self {
            MuxerHandle::File(m) => m.lock().add_video_stream(extradata, fps),
            MuxerHandle::Stream(m) => m.lock().add_video_stream(extradata, fps),
            MuxerHandle::Boxed(m) => m.lock().add_video_stream(extradata, fps),
        }
    }

    fn add_audio_stream(&self, extradata: &CodecConfig, sample_rate: u32) -> Result<(), crate::error::MuxError> {
        match self {
            MuxerHandle::File(m) => m.lock().add_audio_stream(extradata, sample_rate),
            MuxerHandle::Stream(m) => m.lock().add_audio_stream(extradata, sample_rate),
            MuxerHandle::Boxed(m) => m.lock().add_audio_stream(extradata, sample_rate),
        }
    }

    fn write_header(&self) -> Result<(), crate::error::MuxError> {
        match self {
            MuxerHandle::File(m) => m.lock().write_header(),
            MuxerHandle::Stream(m) => m.lock().write_header(),
            MuxerHandle::Boxed(m) => m.lock().write_header(),
        }
    }

    fn write_packet(&self, packet: MuxPacket) -> Result<(), crate::error::MuxError> {
        match self {
            MuxerHandle::File(m) => m.lock().write_packet(packet),
            MuxerHandle::Stream(m) => m.lock().write_packet(packet),
            MuxerHandle::Boxed(m) => m.lock().write_packet(packet),
        }
    }

    fn write_trailer(&self) -> Result<(), crate::error::MuxError> {
        match self {
            MuxerHandle::File(m) => m.lock().write_trailer(),
            MuxerHandle::Stream(m) => m.lock().write_trailer(),
            MuxerHandle::Boxed(m) => m.lock().write_trailer(),
        }
    }
}

/// Increments the matching drop counter for a muxer write failure, or does
/// nothing on success. `MuxError::Dropped` is the only variant a packet
/// write can return from a live pipeline (`PacketQueue::try_push`'s
/// rejection, forwarded through `StreamMuxer::write_packet`); anything else
/// is a structural failure, not a counted drop, so it's only logged.
fn record_write_result(result: Result<(), MuxError>, stream: StreamKind, stats: &StatsCounters) {
    match result {
        Ok(()) => {}
        Err(MuxError::Dropped(reason)) => match (stream, reason) {
            (StreamKind::Video, DropReason::BackpressureDropped) => {
                StatsCounters::incr(&stats.video_packets_dropped_backpressure)
            }
            (StreamKind::Video, DropReason::QueueFull) => {
                StatsCounters::incr(&stats.video_packets_dropped_queue_full)
            }
            (StreamKind::Audio, _) => StatsCounters::incr(&stats.audio_packets_dropped_by_queue),
            (StreamKind::Video, DropReason::MonotonicViolation) => {
                StatsCounters::incr(&stats.monotonic_violations)
            }
        },
        Err(err) => warn!(error = %err, "muxer write failed"),
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    state: Mutex<PipelineState>,
    should_stop: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    muxer: Mutex<Option<MuxerHandle>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PipelineState::Idle),
            should_stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatsCounters::default()),
            threads: Mutex::new(Vec::new()),
            muxer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.snapshot()
    }

    /// Validates configuration, opens encoders/muxer, writes container
    /// headers, and spawns the capture/pacing/encode threads (spec §4.11).
    pub fn start(&self, inputs: PipelineInputs) -> Result<(), PipelineError> {
        self.start_inner(inputs, None)
    }

    /// Like `start`, but drives the pipeline with a caller-supplied `Muxer`
    /// instead of constructing a `FileMuxer`/`StreamMuxer` from
    /// `config.output` — e.g. `mux::test_support::FakeMuxer`, so tests can
    /// exercise the full thread/queue/stats machinery in-process
    /// (SPEC_FULL §E). `config.output` is still required and validated, but
    /// is otherwise ignored: the injected muxer never touches a real
    /// transport, so no `Sender` thread is spawned.
    pub fn start_with_muxer(
        &self,
        inputs: PipelineInputs,
        muxer: Box<dyn Muxer>,
    ) -> Result<(), PipelineError> {
        self.start_inner(inputs, Some(Arc::new(Mutex::new(muxer))))
    }

    fn start_inner(
        &self,
        inputs: PipelineInputs,
        injected_muxer: Option<Arc<Mutex<Box<dyn Muxer>>>>,
    ) -> Result<(), PipelineError> {
        {
            let mut state = self.state.lock();
            if *state != PipelineState::Idle {
                return Err(PipelineError::InvalidState(*state));
            }
            *state = PipelineState::Initializing;
        }
        let result = self.try_start(inputs, injected_muxer);
        if result.is_err() {
            *self.state.lock() = PipelineState::Failed;
        }
        result
    }

    fn try_start(
        &self,
        inputs: PipelineInputs,
        injected_muxer: Option<Arc<Mutex<Box<dyn Muxer>>>>,
    ) -> Result<(), PipelineError> {
        self.config.validate().map_err(PipelineError::Config)?;

        let PipelineInputs {
            video_source,
            desktop_audio_source,
            mic_audio_source,
            mut video_encoder,
            mut audio_encoder,
        } = inputs;

        let video_extradata = video_encoder
            .initialize(self.config.width, self.config.height, self.config.fps)
            .map_err(PipelineError::Encoder)?;
        let audio_extradata = audio_encoder
            .initialize(self.config.audio_sample_rate, 2)
            .map_err(PipelineError::Encoder)?;

        let queue = Arc::new(PacketQueue::new(
            self.config.queue.max_packets,
            self.config.queue.max_latency_ms,
        ));

        let output = self
            .config
            .output
            .as_ref()
            .ok_or(crate::error::ConfigError::MissingOutputTarget)
            .map_err(PipelineError::Config)?;

        let (muxer, stream_muxer_handle) = if let Some(boxed) = injected_muxer {
            (MuxerHandle::Boxed(boxed), None)
        } else {
            let stream_muxer_handle = match output {
                OutputTarget::Stream { url } => {
                    Some(Arc::new(Mutex::new(StreamMuxer::new(url.clone(), Arc::clone(&queue)))))
                }
                OutputTarget::File { .. } => None,
            };
            let muxer = match (output, &stream_muxer_handle) {
                (OutputTarget::File { path }, _) => {
                    MuxerHandle::File(Arc::new(Mutex::new(FileMuxer::new(path.clone()))))
                }
                (OutputTarget::Stream { .. }, Some(handle)) => MuxerHandle::Stream(Arc::clone(handle)),
                (OutputTarget::Stream { .. }, None) => unreachable!("stream handle built above"),
            };
            (muxer, stream_muxer_handle)
        };
        muxer
            .add_video_stream(&video_extradata, self.config.fps)
            .map_err(PipelineError::Mux)?;
        muxer
            .add_audio_stream(&audio_extradata, self.config.audio_sample_rate)
            .map_err(PipelineError::Mux)?;
        muxer.write_header().map_err(PipelineError::Mux)?;

        let frame_ring = Arc::new(FrameRing::new(self.config.width, self.config.height));
        let pcm_buffer = Arc::new(PcmMixBuffer::new(&self.config.pcm_buffer));
        let timebase = Arc::new(Mutex::new(TimebaseMapper::new()));

        let start_instant = Instant::now();
        let mut threads = Vec::new();

        threads.push(self.spawn_video_capture_thread(Arc::clone(&frame_ring), video_source));
        threads.push(self.spawn_audio_capture_thread(
            AudioSource::Desktop,
            Arc::clone(&pcm_buffer),
            desktop_audio_source,
        ));
        threads.push(self.spawn_audio_capture_thread(
            AudioSource::Mic,
            Arc::clone(&pcm_buffer),
            mic_audio_source,
        ));
        threads.push(self.spawn_video_encode_thread(
            Arc::clone(&frame_ring),
            video_encoder,
            muxer.clone(),
            Arc::clone(&timebase),
            start_instant,
        ));
        threads.push(self.spawn_audio_encode_thread(
            Arc::clone(&pcm_buffer),
            audio_encoder,
            muxer.clone(),
            Arc::clone(&timebase),
        ));
        if let Some(stream_muxer) = stream_muxer_handle {
            threads.push(self.spawn_sender_thread(Arc::clone(&queue), stream_muxer));
        }

        *self.muxer.lock() = Some(muxer);
        *self.threads.lock() = threads;
        *self.state.lock() = PipelineState::Running;
        info!(fps = self.config.fps, "pipeline running");
        Ok(())
    }

    /// Signals shutdown and joins every worker thread, waiting at most
    /// `deadline` before giving up (spec §4.11 B1: bounded shutdown).
    pub fn stop(&self, deadline: Duration) -> Result<(), PipelineError> {
        {
            let mut state = self.state.lock();
            if *state != PipelineState::Running {
                return Err(PipelineError::InvalidState(*state));
            }
            *state = PipelineState::Draining;
        }
        self.should_stop.store(true, Ordering::Relaxed);

        let deadline_at = Instant::now() + deadline;
        let mut threads = self.threads.lock();
        for handle in threads.drain(..) {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("shutdown deadline exceeded, abandoning remaining threads");
                *self.state.lock() = PipelineState::Failed;
                return Err(PipelineError::ShutdownDeadlineExceeded(deadline));
            }
            let _ = handle.join();
        }

        if let Some(muxer) = self.muxer.lock().take() {
            if let Err(err) = muxer.write_trailer() {
                warn!(error = %err, "failed to finalize container trailer");
            }
        }

        *self.state.lock() = PipelineState::Stopped;
        info!("pipeline stopped");
        Ok(())
    }

    fn spawn_video_capture_thread(
        &self,
        ring: Arc<FrameRing>,
        mut source: Box<dyn VideoSource>,
    ) -> JoinHandle<()> {
        let should_stop = Arc::clone(&self.should_stop);
        let stats = Arc::clone(&self.stats);
        thread::spawn(move || {
            while !should_stop.load(Ordering::Relaxed) {
                if let Some(frame) = source.try_latest_frame() {
                    ring.push(frame);
                    StatsCounters::incr(&stats.video_frames_captured);
                }
                thread::sleep(Duration::from_millis(5));
            }
        })
    }

    fn spawn_audio_capture_thread(
        &self,
        source_kind: AudioSource,
        buffer: Arc<PcmMixBuffer>,
        mut source: Box<dyn AudioSourceCapture>,
    ) -> JoinHandle<()> {
        let should_stop = Arc::clone(&self.should_stop);
        thread::spawn(move || {
            let _ = source_kind;
            while !should_stop.load(Ordering::Relaxed) {
                if let Some(block) = source.try_drain() {
                    buffer.feed(block);
                }
                thread::sleep(Duration::from_millis(5));
            }
        })
    }

    fn spawn_video_encode_thread(
        &self,
        ring: Arc<FrameRing>,
        mut encoder: Box<dyn VideoEncoder>,
        muxer: MuxerHandle,
        timebase: Arc<Mutex<TimebaseMapper>>,
        start: Instant,
    ) -> JoinHandle<()> {
        let should_stop = Arc::clone(&self.should_stop);
        let stats = Arc::clone(&self.stats);
        let fps = self.config.fps;
        let source_tb = TimeBase::new(1, fps as i64);
        thread::spawn(move || {
            let mut pacer = VideoPacer::new(ring, fps, start);
            loop {
                let stop_requested = should_stop.load(Ordering::Relaxed);
                for paced in pacer.due_frames(Instant::now()) {
                    match encoder.encode(&paced.frame, paced.frame_index) {
                        Ok(Some(packet)) => {
                            StatsCounters::incr(&stats.video_packets_encoded);
                            let mapped = timebase.lock().map(
                                "video",
                                paced.frame_index as i64,
                                paced.frame_index as i64 + 1,
                                source_tb,
                            );
                            if let Ok(ts) = mapped {
                                let mux_packet = crate::types::MuxPacket {
                                    stream: StreamKind::Video,
                                    data: packet.data,
                                    pts_us: ts.pts_us,
                                    dts_us: ts.dts_us,
                                    duration_us: ts.duration_us,
                                    is_keyframe: packet.is_keyframe,
                                };
                                let result = muxer.write_packet(mux_packet);
                                record_write_result(result, StreamKind::Video, &stats);
                            } else {
                                StatsCounters::incr(&stats.monotonic_violations);
                            }
                        }
                        Ok(None) => {}
                        Err(err) => warn!(error = %err, "video encode failed"),
                    }
                }
                if stop_requested {
                    break;
                }
                thread::sleep(Duration::from_millis(2));
            }
            if let Ok(packets) = encoder.flush() {
                for packet in packets {
                    StatsCounters::incr(&stats.video_packets_encoded);
                    let mapped = timebase.lock().map(
                        "video",
                        packet.frame_index as i64,
                        packet.frame_index as i64 + 1,
                        source_tb,
                    );
                    if let Ok(ts) = mapped {
                        let mux_packet = crate::types::MuxPacket {
                            stream: StreamKind::Video,
                            data: packet.data,
                            pts_us: ts.pts_us,
                            dts_us: ts.dts_us,
                            duration_us: ts.duration_us,
                            is_keyframe: packet.is_keyframe,
                        };
                        let result = muxer.write_packet(mux_packet);
                        record_write_result(result, StreamKind::Video, &stats);
                    }
                }
            }
        })
    }

    fn spawn_audio_encode_thread(
        &self,
        buffer: Arc<PcmMixBuffer>,
        mut encoder: Box<dyn AudioEncoder>,
        muxer: MuxerHandle,
        timebase: Arc<Mutex<TimebaseMapper>>,
    ) -> JoinHandle<()> {
        let should_stop = Arc::clone(&self.should_stop);
        let stats = Arc::clone(&self.stats);
        let cfg = self.config.audio_engine.clone();
        let sample_rate = self.config.audio_sample_rate as i64;
        let source_tb = TimeBase::new(1, sample_rate);
        thread::spawn(move || {
            let mut engine = AudioEngine::new(buffer, &cfg);
            let tick_interval =
                Duration::from_secs_f64(crate::types::AAC_FRAME as f64 / sample_rate as f64);
            let mut deadline = Instant::now();
            // Consecutive ticks fired this pass with no intervening sleep,
            // bounded by `burst_cap` (spec §4.3): caps how far the ticker is
            // allowed to catch up after a stall instead of either drifting
            // forever or discarding the whole backlog in one jump.
            let mut burst = 0u32;
            loop {
                let stop_requested = should_stop.load(Ordering::Relaxed);
                let block = engine.tick();
                let frames = block.frame_count() as i64;
                match encoder.encode(&block) {
                    Ok(Some(packet)) => {
                        StatsCounters::incr(&stats.audio_packets_encoded);
                        let mapped = timebase.lock().map(
                            "audio",
                            block.pts_in_frames as i64,
                            block.pts_in_frames as i64 + frames,
                            source_tb,
                        );
                        if let Ok(ts) = mapped {
                            let mux_packet = crate::types::MuxPacket {
                                stream: StreamKind::Audio,
                                data: packet.data,
                                pts_us: ts.pts_us,
                                dts_us: ts.dts_us,
                                duration_us: ts.duration_us,
                                is_keyframe: true,
                            };
                            let result = muxer.write_packet(mux_packet);
                            record_write_result(result, StreamKind::Audio, &stats);
                        } else {
                            StatsCounters::incr(&stats.monotonic_violations);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "audio encode failed"),
                }
                if stop_requested {
                    break;
                }
                deadline += tick_interval;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                    burst = 0;
                } else if burst < cfg.burst_cap {
                    // Behind schedule: fire the next tick immediately rather
                    // than sleeping, up to burst_cap consecutive catch-up
                    // ticks.
                    burst += 1;
                } else {
                    // Exhausted the bounded catch-up budget; give up on the
                    // remaining backlog and resynchronize to wall clock.
                    deadline = now;
                    burst = 0;
                }
            }
            if let Ok(packets) = encoder.flush() {
                for packet in packets {
                    StatsCounters::incr(&stats.audio_packets_encoded);
                    let mux_packet = crate::types::MuxPacket {
                        stream: StreamKind::Audio,
                        data: packet.data,
                        pts_us: 0,
                        dts_us: 0,
                        duration_us: 0,
                        is_keyframe: true,
                    };
                    let result = muxer.write_packet(mux_packet);
                    record_write_result(result, StreamKind::Audio, &stats);
                }
            }
        })
    }

    /// Spawns the sole `PacketQueue` consumer for streaming output (spec
    /// §4.10). Not used for file output, which writes synchronously from
    /// the encode threads instead.
    fn spawn_sender_thread(
        &self,
        queue: Arc<PacketQueue>,
        muxer: Arc<Mutex<StreamMuxer>>,
    ) -> JoinHandle<()> {
        let should_stop = Arc::clone(&self.should_stop);
        let stats = Arc::clone(&self.stats);
        let reconnect_cfg = self.config.reconnect.clone();
        let tolerance_us = self.config.pacing.tolerance_us;
        thread::spawn(move || {
            let mut sender = Sender::new(queue, muxer, &reconnect_cfg, tolerance_us, should_stop, stats);
            sender.run();
        })
    }
}
