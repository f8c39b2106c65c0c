//! Integration coverage for the timestamp/queue boundary: packets rejected
//! by `TimebaseMapper` never reach `PacketQueue`, and the queue's
//! backpressure policy protects audio while sacrificing non-keyframe video
//! (spec P6, P9).

use avkernel::error::DropReason;
use avkernel::packet_queue::PacketQueue;
use avkernel::timebase::TimebaseMapper;
use avkernel::types::{MuxPacket, StreamKind, TimeBase};

#[test]
fn only_monotonic_packets_reach_the_queue() {
    let mut mapper = TimebaseMapper::new();
    let queue = PacketQueue::new(10, 5000);
    let tb = TimeBase::new(1, 30);

    for frame_index in [0i64, 1, 1, 2] {
        let result = mapper.map("video", frame_index, frame_index + 1, tb);
        if let Ok(ts) = result {
            queue
                .try_push(MuxPacket {
                    stream: StreamKind::Video,
                    data: vec![0u8; 4],
                    pts_us: ts.pts_us,
                    dts_us: ts.dts_us,
                    duration_us: ts.duration_us,
                    is_keyframe: frame_index == 0,
                })
                .unwrap();
        }
    }

    // frame_index 1 appears twice; the repeat is a monotonic violation and
    // never reaches the queue, so only 3 of the 4 attempts are queued.
    let mut count = 0;
    while queue.pop().is_some() {
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn backpressure_prefers_dropping_video_over_audio() {
    let queue = PacketQueue::new(3, 1);
    queue
        .try_push(MuxPacket {
            stream: StreamKind::Video,
            data: vec![0u8; 4],
            pts_us: 0,
            dts_us: 0,
            duration_us: 0,
            is_keyframe: true,
        })
        .unwrap();

    // A flood of non-keyframe video past the latency budget should never
    // starve audio out of the queue.
    for i in 1..10 {
        let _ = queue.try_push(MuxPacket {
            stream: StreamKind::Video,
            data: vec![0u8; 4],
            pts_us: i * 10_000,
            dts_us: i * 10_000,
            duration_us: 1000,
            is_keyframe: false,
        });
    }

    let audio_result = queue.try_push(MuxPacket {
        stream: StreamKind::Audio,
        data: vec![0u8; 4],
        pts_us: 5_000,
        dts_us: 5_000,
        duration_us: 1000,
        is_keyframe: false,
    });
    assert!(audio_result.is_ok());
}

#[test]
fn monotonic_violation_is_reported_not_panicked() {
    let mut mapper = TimebaseMapper::new();
    let tb = TimeBase::new(1, 30);
    mapper.map("audio", 10, 11, tb).unwrap();
    let result = mapper.map("audio", 10, 11, tb);
    assert_eq!(result.unwrap_err(), DropReason::MonotonicViolation);
}
