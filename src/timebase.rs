//! `TimebaseMapper` (spec §4.6, invariant C6).
//!
//! Converts encoder-domain counters (frame index, cumulative sample count)
//! into microsecond PTS/DTS and enforces strict per-stream monotonicity.
//! Grounded in `DA1F-RoAnalyzer`'s `rescale_ts` usage and the PTS-sort
//! interleaving sketch in `stream.rs`, generalized from ffmpeg's
//! `av_rescale_q` into a pure integer function so the core has no ffmpeg
//! dependency (spec §9).

use crate::error::DropReason;
use crate::types::TimeBase;
use std::collections::HashMap;

/// Rescales `value` from `from` to `to`, rounding half away from zero
/// (matches `av_rescale_q_rnd` with `AV_ROUND_NEAR_INF`).
pub fn rescale(value: i64, from: TimeBase, to: TimeBase) -> i64 {
    // value * from.num/from.den * to.den/to.num
    let numerator = value as i128 * from.num as i128 * to.den as i128;
    let denominator = from.den as i128 * to.num as i128;
    if denominator == 0 {
        return 0;
    }
    let half = denominator.abs() / 2;
    let rounded = if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    };
    rounded as i64
}

struct StreamState {
    last_dts_us: Option<i64>,
}

/// Tracks per-stream last-written DTS so timestamps are guaranteed strictly
/// increasing before a packet ever reaches a muxer (C6).
pub struct TimebaseMapper {
    streams: HashMap<&'static str, StreamState>,
}

pub struct Timestamped {
    pub pts_us: i64,
    pub dts_us: i64,
    pub duration_us: i64,
}

impl TimebaseMapper {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
        }
    }

    /// Maps a `(pts, next_pts)` pair in `source_tb` to microsecond PTS/DTS
    /// (PTS == DTS; this pipeline never reorders B-frames, spec Non-goals),
    /// rejecting the result if it would violate monotonicity for `stream_id`.
    pub fn map(
        &mut self,
        stream_id: &'static str,
        pts: i64,
        next_pts: i64,
        source_tb: TimeBase,
    ) -> Result<Timestamped, DropReason> {
        let pts_us = rescale(pts, source_tb, TimeBase::MICROS);
        let next_us = rescale(next_pts, source_tb, TimeBase::MICROS);
        let duration_us = (next_us - pts_us).max(0);

        let state = self
            .streams
            .entry(stream_id)
            .or_insert(StreamState { last_dts_us: None });

        if let Some(last) = state.last_dts_us {
            if pts_us <= last {
                return Err(DropReason::MonotonicViolation);
            }
        }
        state.last_dts_us = Some(pts_us);

        Ok(Timestamped {
            pts_us,
            dts_us: pts_us,
            duration_us,
        })
    }
}

impl Default for TimebaseMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_frame_index_to_micros_at_30fps() {
        let tb = TimeBase::new(1, 30);
        // Frame 1 at 30fps = 33333.33us, rounds to 33333.
        assert_eq!(rescale(1, tb, TimeBase::MICROS), 33333);
    }

    #[test]
    fn rescale_rounds_half_away_from_zero() {
        let tb = TimeBase::new(1, 2);
        // 1 * (1/2) => 0.5s => 500_000us exactly, no rounding ambiguity.
        assert_eq!(rescale(1, tb, TimeBase::MICROS), 500_000);
    }

    #[test]
    fn monotonic_violation_rejected() {
        let mut mapper = TimebaseMapper::new();
        let tb = TimeBase::new(1, 30);
        mapper.map("video", 5, 6, tb).unwrap();
        let result = mapper.map("video", 5, 6, tb);
        assert_eq!(result.unwrap_err(), DropReason::MonotonicViolation);
    }

    #[test]
    fn independent_streams_track_separately() {
        let mut mapper = TimebaseMapper::new();
        let tb = TimeBase::new(1, 30);
        mapper.map("video", 1, 2, tb).unwrap();
        // A fresh "audio" stream at the same pts is not a violation.
        assert!(mapper.map("audio", 1, 2, tb).is_ok());
    }

    #[test]
    fn duration_is_next_minus_current() {
        let mut mapper = TimebaseMapper::new();
        let tb = TimeBase::new(1, 48_000);
        let ts = mapper.map("audio", 0, 1024, tb).unwrap();
        assert_eq!(ts.duration_us, rescale(1024, tb, TimeBase::MICROS));
    }
}
