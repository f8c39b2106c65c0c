//! Typed error kinds for the pipeline (spec §7).
//!
//! Structural failures (encoder/muxer open, container finalize) propagate to
//! the caller via these types. Data-plane failures (`MonotonicViolation`,
//! `BackpressureDropped`) are represented as plain counted events, not
//! `std::error::Error` impls — they're logged and tallied, never returned
//! from a fallible call.

use thiserror::Error;

/// Bad parameters at `Pipeline::initialize`. Fatal; the pipeline refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fps must be > 0, got {0}")]
    InvalidFps(u32),
    #[error("resolution must be non-zero, got {0}x{1}")]
    InvalidResolution(u32, u32),
    #[error("audio_frame_size must equal 1024, got {0}")]
    InvalidAudioFrameSize(usize),
    #[error("queue.max_packets must be > 0")]
    InvalidQueueCapacity,
    #[error("output target is required")]
    MissingOutputTarget,
    #[error("config source error: {0}")]
    Source(#[from] config::ConfigError),
}

/// Encoder open/encode failures (spec §4.5, §7).
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("failed to open {codec} encoder: {reason}")]
    OpenFailed { codec: String, reason: String },
    #[error("{codec} encode failed: {reason}")]
    EncodeFailed { codec: String, reason: String },
    #[error("{codec} flush failed: {reason}")]
    FlushFailed { codec: String, reason: String },
    #[error("required encoder {0} not available in this ffmpeg build")]
    CodecUnavailable(String),
}

/// Muxer open/write failures (spec §4.7, §4.8, §7).
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("failed to open output: {0}")]
    OpenFailed(String),
    #[error("failed to write header: {0}")]
    HeaderFailed(String),
    #[error("failed to write trailer: {0}")]
    TrailerFailed(String),
    #[error("packet for stream not configured: {0}")]
    StreamNotConfigured(&'static str),
    /// The packet queue refused the packet; carries the reason so callers
    /// can recover the exact counter to increment instead of treating every
    /// write failure as a structural fault.
    #[error("queue rejected packet: {0:?}")]
    Dropped(DropReason),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Network transport failures (spec §7). Triggers reconnect in streaming
/// mode; fatal in file mode (file muxers never construct this variant).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {target}: {reason}")]
    ConnectFailed { target: String, reason: String },
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("connection closed by peer")]
    ClosedByPeer,
}

/// Top-level error surfaced by `Pipeline::start`/`stop` (spec §7, structural
/// failures only — anything degradable is recovered locally).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("encoder initialization failed: {0}")]
    Encoder(#[from] EncoderError),
    #[error("muxer initialization failed: {0}")]
    Mux(#[from] MuxError),
    #[error("stop deadline of {0:?} exceeded; resources released best-effort")]
    ShutdownDeadlineExceeded(std::time::Duration),
    #[error("pipeline is not in a state that permits this operation (current: {0:?})")]
    InvalidState(crate::pipeline::PipelineState),
}

/// Why `TimebaseMapper` rejected a packet, or `PacketQueue` dropped one.
/// Not an `Error` — these are counted outcomes, never bubbled up (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `TimebaseMapper` computed a `dts_us` that did not strictly exceed the
    /// stream's last written `dts_us`.
    MonotonicViolation,
    /// `PacketQueue` rejected a video non-keyframe because the queue's
    /// latency span already exceeds `max_latency_ms` (backpressure).
    BackpressureDropped,
    /// `PacketQueue` was full by count and no droppable packet existed.
    QueueFull,
}
