// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot frame hand-off between the capture and poll loops

use crate::backends::camera::types::Frame;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct Slot {
    current: Option<Arc<Frame>>,
    published: u64,
}

/// Holds the most recent frame only
///
/// Publishing replaces whatever is there, read or not. The lock is held just
/// long enough to swap an `Arc`, so neither side waits on the other's work.
#[derive(Default)]
pub struct FrameBuffer {
    slot: Mutex<Slot>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the current frame, returning its sequence number
    pub fn publish(&self, frame: Frame) -> u64 {
        self.publish_shared(frame).sequence
    }

    /// Like `publish`, also handing back the shared frame
    pub fn publish_shared(&self, mut frame: Frame) -> Arc<Frame> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.published += 1;
        frame.sequence = slot.published;
        let frame = Arc::new(frame);
        // The superseded frame is dropped here unless a reader still holds it
        slot.current = Some(Arc::clone(&frame));
        frame
    }

    /// The current frame, if any
    pub fn snapshot(&self) -> Option<Arc<Frame>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Drop the current frame. Sequence numbers keep counting.
    pub fn clear(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).current = None;
    }

    /// Number of frames ever published
    pub fn published(&self) -> u64 {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_buffer_has_no_snapshot() {
        let buffer = FrameBuffer::new();
        assert!(buffer.snapshot().is_none());
        assert_eq!(buffer.published(), 0);
    }

    #[test]
    fn test_latest_frame_wins() {
        let buffer = FrameBuffer::new();
        let first = buffer.publish(Frame::gray(1, 1, vec![1]));
        let second = buffer.publish(Frame::gray(1, 1, vec![2]));

        assert!(second > first);
        let snapshot = buffer.snapshot().unwrap();
        assert_eq!(snapshot.sequence, second);
        assert_eq!(snapshot.data[0], 2);
        assert_eq!(buffer.published(), 2);
    }

    #[test]
    fn test_snapshot_survives_later_publish() {
        let buffer = FrameBuffer::new();
        buffer.publish(Frame::gray(1, 1, vec![1]));
        let held = buffer.snapshot().unwrap();
        buffer.publish(Frame::gray(1, 1, vec![2]));

        assert_eq!(held.data[0], 1);
        assert_eq!(buffer.snapshot().unwrap().data[0], 2);
    }

    #[test]
    fn test_clear_keeps_sequence_counting() {
        let buffer = FrameBuffer::new();
        buffer.publish(Frame::gray(1, 1, vec![1]));
        buffer.clear();
        assert!(buffer.snapshot().is_none());
        assert_eq!(buffer.publish(Frame::gray(1, 1, vec![1])), 2);
    }

    #[test]
    fn test_concurrent_readers_see_whole_frames() {
        let buffer = Arc::new(FrameBuffer::new());

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for value in 0..200u8 {
                    buffer.publish(Frame::gray(4, 4, vec![value; 16]));
                }
            })
        };

        let mut last_sequence = 0;
        for _ in 0..200 {
            if let Some(frame) = buffer.snapshot() {
                let first = frame.data[0];
                assert!(frame.data.iter().all(|&v| v == first));
                assert!(frame.sequence >= last_sequence);
                last_sequence = frame.sequence;
            }
        }
        writer.join().unwrap();
        assert_eq!(buffer.published(), 200);
    }
}
