// SPDX-License-Identifier: GPL-3.0-only

//! Detection events and the sink boundary

use crate::backends::camera::types::Frame;
use crate::decode::{Decoded, Strategy, Symbology};
use chrono::{DateTime, Local};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One accepted detection
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    pub payload: String,
    pub symbology: Symbology,
    /// Strategy that decoded the frame
    pub strategy: Strategy,
    /// Monotonic time of acceptance
    pub timestamp: Instant,
    /// Wall clock time of acceptance, for display
    pub detected_at: DateTime<Local>,
    /// Sequence number of the frame the payload came from
    pub frame_sequence: u64,
}

impl DetectionEvent {
    pub fn new(decoded: Decoded, timestamp: Instant, frame_sequence: u64) -> Self {
        Self {
            payload: decoded.payload,
            symbology: decoded.symbology,
            strategy: decoded.strategy,
            timestamp,
            detected_at: Local::now(),
            frame_sequence,
        }
    }
}

/// Receiver of a pipeline's output
///
/// Both callbacks run synchronously on the pipeline's worker threads:
/// `on_detection` on the poll thread, `on_frame_preview` on the capture
/// thread. Implementations that drive a UI must hand work over to their own
/// thread and return quickly.
pub trait DetectionSink: Send + Sync {
    fn on_detection(&self, event: DetectionEvent);

    /// Every captured frame, whether or not it contains a code
    fn on_frame_preview(&self, _frame: &Arc<Frame>) {}
}

impl<F> DetectionSink for F
where
    F: Fn(DetectionEvent) + Send + Sync,
{
    fn on_detection(&self, event: DetectionEvent) {
        self(event)
    }
}

/// Sink forwarding events over an mpsc channel
pub struct ChannelSink {
    sender: Sender<DetectionEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<DetectionEvent>) -> Self {
        Self { sender }
    }
}

impl DetectionSink for ChannelSink {
    fn on_detection(&self, event: DetectionEvent) {
        if self.sender.send(event).is_err() {
            debug!("Detection receiver dropped, discarding event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::thread;

    fn event(payload: &str) -> DetectionEvent {
        DetectionEvent::new(
            Decoded {
                payload: payload.to_string(),
                symbology: Symbology::QrCode,
                strategy: Strategy::Standard,
            },
            Instant::now(),
            7,
        )
    }

    #[test]
    fn test_closure_is_a_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = move |event: DetectionEvent| seen_clone.lock().unwrap().push(event.payload);

        sink.on_detection(event("one"));
        sink.on_frame_preview(&Arc::new(Frame::gray(1, 1, vec![0])));
        assert_eq!(*seen.lock().unwrap(), vec!["one".to_string()]);
    }

    #[test]
    fn test_channel_sink_forwards_and_tolerates_closed_receiver() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);

        sink.on_detection(event("hello"));
        let received = rx.recv().unwrap();
        assert_eq!(received.payload, "hello");
        assert_eq!(received.frame_sequence, 7);

        drop(rx);
        sink.on_detection(event("dropped"));
    }

    #[test]
    fn test_channel_sink_shared_across_threads() {
        let (tx, rx) = mpsc::channel();
        let sink = Arc::new(ChannelSink::new(tx));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || sink.on_detection(event(&format!("t{}", i))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(sink);

        let mut payloads: Vec<String> = rx.iter().map(|e| e.payload).collect();
        payloads.sort();
        assert_eq!(payloads, vec!["t0", "t1", "t2", "t3"]);
    }
}
