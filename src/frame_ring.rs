//! `FrameRing` (spec §4.1, invariant C1).
//!
//! Holds at most the latest captured video frame plus a fallback in case
//! capture stalls. Grounded in `DA1F-RoAnalyzer`'s `StreamPuffer`
//! (`video_buf: RwLock<VecDeque<_>>`, drop-oldest on overflow), narrowed here
//! to capacity 1 — the pacer only ever wants "the newest frame", so keeping
//! a deeper history buys nothing and only risks serving a stale frame.

use crate::types::{PixelFormat, RawVideoFrame};
use parking_lot::Mutex;
use std::sync::Arc;

/// Never errors (C1): on a cold start with nothing pushed yet, `latest`
/// synthesizes a black frame at the configured resolution rather than
/// returning `None`, so `VideoPacer` always has something to duplicate.
pub struct FrameRing {
    width: u32,
    height: u32,
    slot: Mutex<Option<RawVideoFrame>>,
}

impl FrameRing {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            slot: Mutex::new(None),
        }
    }

    /// Overwrites whatever frame is currently held (drop-oldest policy,
    /// capacity 1). Never blocks.
    pub fn push(&self, frame: RawVideoFrame) {
        *self.slot.lock() = Some(frame);
    }

    /// Returns the most recent frame without consuming it, or a synthesized
    /// black frame if nothing has been pushed yet.
    pub fn latest(&self) -> RawVideoFrame {
        self.slot
            .lock()
            .clone()
            .unwrap_or_else(|| self.black_frame(0))
    }

    /// Like `latest`, but clears the slot — used by the pacer tick that
    /// wants to detect whether a *new* frame arrived since the last tick.
    pub fn take_latest(&self) -> Option<RawVideoFrame> {
        self.slot.lock().take()
    }

    fn black_frame(&self, capture_ns: u64) -> RawVideoFrame {
        let len = (self.width as usize) * (self.height as usize) * 4;
        RawVideoFrame {
            width: self.width,
            height: self.height,
            pixel_format_tag: PixelFormat::Bgra8,
            capture_ns,
            data: Arc::from(vec![0u8; len].into_boxed_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(capture_ns: u64) -> RawVideoFrame {
        RawVideoFrame {
            width: 2,
            height: 2,
            pixel_format_tag: PixelFormat::Bgra8,
            capture_ns,
            data: Arc::from(vec![1u8; 16].into_boxed_slice()),
        }
    }

    #[test]
    fn cold_start_yields_black_frame_not_panic() {
        let ring = FrameRing::new(2, 2);
        let latest = ring.latest();
        assert!(latest.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn push_then_latest_overwrites_without_blocking() {
        let ring = FrameRing::new(2, 2);
        ring.push(frame(10));
        ring.push(frame(20));
        assert_eq!(ring.latest().capture_ns, 20);
    }

    #[test]
    fn take_latest_consumes_the_slot() {
        let ring = FrameRing::new(2, 2);
        ring.push(frame(5));
        assert_eq!(ring.take_latest().unwrap().capture_ns, 5);
        assert!(ring.take_latest().is_none());
        assert_eq!(ring.latest().capture_ns, 0);
    }
}
