//! Lock-free statistics counters (spec §5, §6 `get_statistics`).
//!
//! All fields are atomics so the hot capture/encode path never takes a lock
//! to bump a counter, and a host can poll `Statistics` from any thread
//! without contending with the pipeline. Grounded in `GhostKellz-ghoststream`'s
//! `AvMuxer` (`AtomicU64` byte counter) and spec §5's counter list.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StatsCounters {
    pub video_frames_captured: AtomicU64,
    pub video_packets_encoded: AtomicU64,
    pub audio_packets_encoded: AtomicU64,
    pub video_packets_dropped_backpressure: AtomicU64,
    pub video_packets_dropped_queue_full: AtomicU64,
    pub audio_packets_dropped_by_queue: AtomicU64,
    pub monotonic_violations: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub reconnect_attempts: AtomicU64,
}

impl StatsCounters {
    pub fn snapshot(&self) -> Statistics {
        Statistics {
            video_frames: self.video_frames_captured.load(Ordering::Relaxed),
            video_packets: self.video_packets_encoded.load(Ordering::Relaxed),
            audio_packets: self.audio_packets_encoded.load(Ordering::Relaxed),
            video_packets_dropped: self.video_packets_dropped_backpressure.load(Ordering::Relaxed)
                + self.video_packets_dropped_queue_full.load(Ordering::Relaxed),
            audio_packets_dropped: self.audio_packets_dropped_by_queue.load(Ordering::Relaxed),
            monotonic_violations: self.monotonic_violations.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time statistics snapshot (spec §6 `get_statistics`), serializable
/// so a host can forward it to its own telemetry sink (SPEC_FULL §F.1).
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Statistics {
    pub video_frames: u64,
    pub video_packets: u64,
    pub audio_packets: u64,
    pub video_packets_dropped: u64,
    pub audio_packets_dropped: u64,
    pub monotonic_violations: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub reconnect_attempts: u64,
}
