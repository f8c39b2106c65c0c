//! Real-time desktop audio/video capture pipeline kernel.
//!
//! This crate implements the hard part of a screen recorder/streamer: a
//! clock-master audio engine, a constant-frame-rate video pacer, encoder
//! adapter contracts, timestamp-domain conversion and interleaved muxing, a
//! backpressure-aware packet queue, and a wall-clock-paced network sender.
//! Platform capture, concrete codec libraries beyond the bundled ffmpeg
//! adapter, desktop UI/IPC, and host configuration/packaging are external
//! collaborators — see `capture` for the trait boundary capture sources must
//! satisfy.

pub mod audio_engine;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame_ring;
pub mod mux;
pub mod packet_queue;
pub mod pcm_mix_buffer;
pub mod pipeline;
pub mod sender;
pub mod stats;
pub mod timebase;
pub mod types;
pub mod video_pacer;

pub use config::PipelineConfig;
pub use error::{EncoderError, MuxError, PipelineError, TransportError};
pub use pipeline::{Pipeline, PipelineState};
pub use stats::Statistics;
