//! Pipeline configuration (spec §6).
//!
//! `PipelineConfig` is the single structural input to `Pipeline::initialize`.
//! It's loaded via the `config` crate so a host can layer a TOML file under
//! `AVKERNEL_`-prefixed environment overrides, the way `streamlib-core`
//! layers its own service config. Defaults match the spec §6 table exactly;
//! `audio_sample_rate` and `audio_frame_size` are fixed by the AAC contract
//! and are rejected if a caller tries to change them.

use crate::error::ConfigError;
use crate::types::{AAC_FRAME, AUDIO_SAMPLE_RATE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_packets: usize,
    pub max_latency_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_packets: 100,
            max_latency_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub tolerance_us: i64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { tolerance_us: 5000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEngineConfig {
    pub desktop_gain: f32,
    pub mic_gain: f32,
    /// Maximum consecutive ticks the audio ticker may fire back-to-back
    /// without an intervening sleep when it has fallen behind wall-clock
    /// schedule. Bounds catch-up: a stall longer than `burst_cap` ticks
    /// loses the remaining backlog rather than firing an unbounded burst.
    pub burst_cap: u32,
}

impl Default for AudioEngineConfig {
    fn default() -> Self {
        Self {
            desktop_gain: 1.0,
            mic_gain: 1.2,
            burst_cap: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmBufferConfig {
    pub high_water_ms: u64,
}

impl Default for PcmBufferConfig {
    fn default() -> Self {
        Self { high_water_ms: 200 }
    }
}

/// Where the container output goes (spec §4.8, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputTarget {
    File { path: String },
    Stream { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub audio_sample_rate: u32,
    pub audio_frame_size: usize,
    pub output: Option<OutputTarget>,
    pub queue: QueueConfig,
    pub pacing: PacingConfig,
    pub reconnect: ReconnectConfig,
    pub audio_engine: AudioEngineConfig,
    pub pcm_buffer: PcmBufferConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 1920,
            height: 1080,
            audio_sample_rate: AUDIO_SAMPLE_RATE,
            audio_frame_size: AAC_FRAME,
            output: None,
            queue: QueueConfig::default(),
            pacing: PacingConfig::default(),
            reconnect: ReconnectConfig::default(),
            audio_engine: AudioEngineConfig::default(),
            pcm_buffer: PcmBufferConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads defaults, then an optional TOML file, then `AVKERNEL_`-prefixed
    /// environment overrides (e.g. `AVKERNEL_FPS=60`), mirroring the layering
    /// `streamlib-core` uses for its own service configuration.
    pub fn load(toml_path: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults).map_err(ConfigError::Source)?,
        );
        if let Some(path) = toml_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("AVKERNEL")
                .separator("_")
                .try_parsing(true),
        );
        let built = builder.build().map_err(ConfigError::Source)?;
        let cfg: PipelineConfig = built.try_deserialize().map_err(ConfigError::Source)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::InvalidFps(self.fps));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidResolution(self.width, self.height));
        }
        if self.audio_frame_size != AAC_FRAME {
            return Err(ConfigError::InvalidAudioFrameSize(self.audio_frame_size));
        }
        if self.queue.max_packets == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if self.output.is_none() {
            return Err(ConfigError::MissingOutputTarget);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.fps, 30);
        assert_eq!(cfg.audio_sample_rate, 48_000);
        assert_eq!(cfg.audio_frame_size, 1024);
        assert_eq!(cfg.audio_engine.desktop_gain, 1.0);
        assert_eq!(cfg.audio_engine.mic_gain, 1.2);
        assert_eq!(cfg.queue.max_packets, 100);
        assert_eq!(cfg.queue.max_latency_ms, 2000);
        assert_eq!(cfg.pacing.tolerance_us, 5000);
        assert_eq!(cfg.reconnect.max_attempts, 5);
        assert_eq!(cfg.reconnect.backoff_ms, 500);
        assert_eq!(cfg.pcm_buffer.high_water_ms, 200);
    }

    #[test]
    fn defaults_fail_validate_without_output() {
        let cfg = PipelineConfig::default();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingOutputTarget)
        ));
    }

    #[test]
    fn validate_catches_wrong_audio_frame_size() {
        let mut cfg = PipelineConfig::default();
        cfg.output = Some(OutputTarget::File {
            path: "out.mp4".into(),
        });
        cfg.audio_frame_size = 512;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidAudioFrameSize(512))
        ));
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        let mut cfg = PipelineConfig::default();
        cfg.output = Some(OutputTarget::Stream {
            url: "rtmp://example/live".into(),
        });
        assert!(cfg.validate().is_ok());
    }
}
