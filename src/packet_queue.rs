//! `PacketQueue` (spec §4.9, invariant C9).
//!
//! The single handoff point between muxer-side producers and `Sender`.
//! Bounded by count and by latency span; backpressure never blocks a
//! producer — it drops according to policy instead. Video and audio are
//! produced by independent, uncoordinated OS threads, so the queue itself
//! keeps packets ordered by `(dts_us, stream priority)` on insert rather
//! than trusting producers to interleave correctly. Grounded in
//! `velocut-media`'s `worker.rs` channel-plus-drop-policy pattern, adapted
//! from crossbeam's MPSC channel to an explicit `VecDeque` so latency,
//! ordering, and keyframe-aware drop decisions can inspect the whole queue.

use crate::error::DropReason;
use crate::types::{MuxPacket, StreamKind};
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct PacketQueue {
    inner: Mutex<VecDeque<MuxPacket>>,
    max_packets: usize,
    max_latency_ms: u64,
}

impl PacketQueue {
    pub fn new(max_packets: usize, max_latency_ms: u64) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(max_packets)),
            max_packets,
            max_latency_ms,
        }
    }

    /// Attempts to enqueue a packet. Never blocks (C9). Drop policy:
    /// audio is never dropped; a video non-keyframe is dropped if the
    /// queue's latency span already exceeds `max_latency_ms`, or if the
    /// queue is at capacity and no non-keyframe video packet can be
    /// evicted to make room; otherwise the oldest droppable video packet
    /// is evicted to admit the new one.
    pub fn try_push(&self, packet: MuxPacket) -> Result<(), DropReason> {
        let mut queue = self.inner.lock();

        if packet.stream == StreamKind::Video && !packet.is_keyframe {
            if let Some(span) = Self::latency_span_ms(&queue) {
                if span >= self.max_latency_ms {
                    return Err(DropReason::BackpressureDropped);
                }
            }
        }

        if queue.len() >= self.max_packets {
            if let Some(pos) = queue
                .iter()
                .position(|p| p.stream == StreamKind::Video && !p.is_keyframe)
            {
                queue.remove(pos);
            } else {
                return Err(DropReason::QueueFull);
            }
        }

        let key = Self::order_key(&packet);
        let pos = queue
            .iter()
            .position(|p| Self::order_key(p) > key)
            .unwrap_or(queue.len());
        queue.insert(pos, packet);
        Ok(())
    }

    /// Pops the packet with the smallest `(dts_us, stream priority)`,
    /// regardless of push order — `try_push` keeps the queue sorted on
    /// insert so this is always the front element.
    pub fn pop(&self) -> Option<MuxPacket> {
        self.inner.lock().pop_front()
    }

    /// Audio sorts before video on an exact `dts_us` tie (`StreamKind`'s
    /// declared ordinal values), matching spec §4.7's interleave tie-break.
    fn order_key(packet: &MuxPacket) -> (i64, u8) {
        (packet.dts_us, packet.stream as u8)
    }

    /// Span between the oldest and newest queued packet's `dts_us`, in
    /// milliseconds. `None` when the queue holds 0 or 1 packets.
    pub fn latency_ms(&self) -> Option<u64> {
        Self::latency_span_ms(&self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    fn latency_span_ms(queue: &VecDeque<MuxPacket>) -> Option<u64> {
        let oldest = queue.front()?;
        let newest = queue.back()?;
        let span_us = (newest.dts_us - oldest.dts_us).max(0);
        Some((span_us / 1000) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(stream: StreamKind, dts_us: i64, is_keyframe: bool) -> MuxPacket {
        MuxPacket {
            stream,
            data: vec![0u8; 4],
            pts_us: dts_us,
            dts_us,
            duration_us: 1000,
            is_keyframe,
        }
    }

    #[test]
    fn pop_returns_packets_in_dts_order() {
        let queue = PacketQueue::new(10, 2000);
        queue.try_push(packet(StreamKind::Audio, 100, false)).unwrap();
        queue.try_push(packet(StreamKind::Video, 0, true)).unwrap();
        assert_eq!(queue.pop().unwrap().dts_us, 0);
        assert_eq!(queue.pop().unwrap().dts_us, 100);
    }

    #[test]
    fn audio_sorts_before_video_on_dts_tie() {
        let queue = PacketQueue::new(10, 2000);
        queue.try_push(packet(StreamKind::Video, 50, true)).unwrap();
        queue.try_push(packet(StreamKind::Audio, 50, false)).unwrap();
        assert_eq!(queue.pop().unwrap().stream, StreamKind::Audio);
        assert_eq!(queue.pop().unwrap().stream, StreamKind::Video);
    }

    #[test]
    fn audio_never_dropped_for_latency() {
        let queue = PacketQueue::new(10, 0);
        queue.try_push(packet(StreamKind::Video, 0, true)).unwrap();
        let result = queue.try_push(packet(StreamKind::Audio, 5000, false));
        assert!(result.is_ok());
    }

    #[test]
    fn non_keyframe_video_dropped_past_latency_budget() {
        let queue = PacketQueue::new(10, 100);
        queue.try_push(packet(StreamKind::Video, 0, true)).unwrap();
        let result = queue.try_push(packet(StreamKind::Video, 200_000, false));
        assert_eq!(result.unwrap_err(), DropReason::BackpressureDropped);
    }

    #[test]
    fn full_queue_evicts_oldest_non_keyframe_video() {
        let queue = PacketQueue::new(2, 100_000);
        queue.try_push(packet(StreamKind::Video, 0, false)).unwrap();
        queue.try_push(packet(StreamKind::Audio, 10, false)).unwrap();
        queue.try_push(packet(StreamKind::Video, 20, true)).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().stream, StreamKind::Audio);
    }

    #[test]
    fn full_queue_with_no_droppable_packet_rejects() {
        let queue = PacketQueue::new(1, 100_000);
        queue.try_push(packet(StreamKind::Audio, 0, false)).unwrap();
        let result = queue.try_push(packet(StreamKind::Audio, 10, false));
        assert_eq!(result.unwrap_err(), DropReason::QueueFull);
    }
}
