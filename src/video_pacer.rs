//! `VideoPacer` (spec §4.4, invariant C4) — constant frame rate scheduler.
//!
//! Computes how many frame slots have elapsed in wall-clock time and yields
//! the latest captured frame (or a duplicate/black fallback) for each one
//! that's due, so the encoder always sees exactly `fps` frames per second of
//! wall clock regardless of capture jitter. Grounded in `DA1F-RoAnalyzer`'s
//! `video_encoder_consumer` loop, generalized from a fixed sleep interval to
//! an elapsed-slot count so a slow tick can catch up instead of drifting.

use crate::frame_ring::FrameRing;
use crate::types::RawVideoFrame;
use std::sync::Arc;
use std::time::Instant;

pub struct VideoPacer {
    ring: Arc<FrameRing>,
    fps: u32,
    start: Instant,
    next_slot: u64,
    last_emitted: Option<RawVideoFrame>,
}

/// A single frame slot due for encoding, with its CFR-assigned index.
pub struct PacedFrame {
    pub frame: RawVideoFrame,
    pub frame_index: u64,
    pub duplicated: bool,
}

impl VideoPacer {
    pub fn new(ring: Arc<FrameRing>, fps: u32, start: Instant) -> Self {
        Self {
            ring,
            fps,
            start,
            next_slot: 0,
            last_emitted: None,
        }
    }

    /// Returns every frame slot due as of `now`, oldest first. Usually
    /// yields 0 or 1 slots; yields more than 1 only when the caller's
    /// thread was descheduled long enough to miss a tick (spec §4.4 B2).
    pub fn due_frames(&mut self, now: Instant) -> Vec<PacedFrame> {
        let elapsed_ns = now.saturating_duration_since(self.start).as_nanos() as u128;
        let expected_slots =
            (elapsed_ns * self.fps as u128) / 1_000_000_000u128;
        let expected_slots = expected_slots as u64;

        let mut out = Vec::new();
        while self.next_slot < expected_slots {
            out.push(self.emit_slot());
        }
        out
    }

    fn emit_slot(&mut self) -> PacedFrame {
        let frame_index = self.next_slot;
        self.next_slot += 1;

        let (frame, duplicated) = match self.ring.take_latest() {
            Some(fresh) => {
                self.last_emitted = Some(fresh.clone());
                (fresh, false)
            }
            None => {
                let fallback = self
                    .last_emitted
                    .clone()
                    .unwrap_or_else(|| self.ring.latest());
                (fallback, true)
            }
        };

        PacedFrame {
            frame,
            frame_index,
            duplicated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PixelFormat, RawVideoFrame};
    use std::time::Duration;

    fn frame() -> RawVideoFrame {
        RawVideoFrame {
            width: 2,
            height: 2,
            pixel_format_tag: PixelFormat::Bgra8,
            capture_ns: 0,
            data: Arc::from(vec![1u8; 16].into_boxed_slice()),
        }
    }

    #[test]
    fn no_slots_due_before_one_frame_interval_elapses() {
        let ring = Arc::new(FrameRing::new(2, 2));
        let start = Instant::now();
        let mut pacer = VideoPacer::new(ring, 30, start);
        let due = pacer.due_frames(start);
        assert!(due.is_empty());
    }

    #[test]
    fn catches_up_multiple_slots_after_a_gap() {
        let ring = Arc::new(FrameRing::new(2, 2));
        ring.push(frame());
        let start = Instant::now();
        let mut pacer = VideoPacer::new(ring, 30, start);
        // ~100ms elapsed at 30fps => 3 slots due.
        let due = pacer.due_frames(start + Duration::from_millis(100));
        assert_eq!(due.len(), 3);
        assert_eq!(due[0].frame_index, 0);
        assert_eq!(due[1].frame_index, 1);
        assert_eq!(due[2].frame_index, 2);
    }

    #[test]
    fn duplicates_last_frame_when_capture_stalls() {
        let ring = Arc::new(FrameRing::new(2, 2));
        ring.push(frame());
        let start = Instant::now();
        let mut pacer = VideoPacer::new(ring, 30, start);
        let first = pacer.due_frames(start + Duration::from_millis(40));
        assert!(!first.is_empty());
        assert!(!first[0].duplicated);

        let second = pacer.due_frames(start + Duration::from_millis(80));
        assert!(!second.is_empty());
        assert!(second.iter().all(|f| f.duplicated));
    }
}
