// SPDX-License-Identifier: GPL-3.0-only

//! Detection pipeline
//!
//! A scanning session runs two worker loops:
//!
//! ```text
//!  capture thread                         poll thread
//! ┌──────────────┐   publish   ┌─────────────┐  snapshot  ┌──────────────────────┐
//! │ FrameSource  │ ──────────► │ FrameBuffer │ ─────────► │ DecodeStrategyChain  │
//! └──────┬───────┘             └─────────────┘            └──────────┬───────────┘
//!        │ on_frame_preview                                          ▼
//!        │                                                   ┌──────────────┐
//!        │                                                   │ Deduplicator │
//!        │                                                   └──────┬───────┘
//!        ▼                                                          ▼ on_detection
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                               DetectionSink                                 │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The frame buffer is the only state the loops share, apart from the
//! statistics counters. Capture is lossy: the poll loop only ever sees the
//! newest frame and analyses each frame at most once.

pub mod dedup;
pub mod events;
pub mod frame_buffer;
pub mod stats;

pub use dedup::Deduplicator;
pub use events::{ChannelSink, DetectionEvent, DetectionSink};
pub use frame_buffer::FrameBuffer;
pub use stats::{ScanStats, StatsSnapshot};

use crate::backends::camera::frame_loop::{LoopAction, LoopController};
use crate::backends::camera::FrameSource;
use crate::config::PipelineConfig;
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::decode::{DecodeStrategyChain, Decoder, RxingDecoder};
use crate::errors::PipelineError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Lifecycle of a `DetectionPipeline`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Run a callback, absorbing a panic so the calling loop keeps going
fn absorb_panic<T>(session: Uuid, callback: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(session = %session, callback, "Callback panicked, continuing");
            None
        }
    }
}

/// State owned by the capture thread
struct CaptureWorker {
    source: Box<dyn FrameSource>,
    buffer: Arc<FrameBuffer>,
    sink: Arc<dyn DetectionSink>,
    stats: Arc<ScanStats>,
    session: Uuid,
}

impl CaptureWorker {
    fn step(&mut self) -> LoopAction {
        if self.source.end_of_stream() {
            info!(session = %self.session, source = self.source.name(), "Frame source reached end of stream");
            return LoopAction::Stop;
        }

        let source = &mut self.source;
        match absorb_panic(self.session, "capture_frame", || source.capture_frame()).flatten() {
            Some(frame) => {
                let frame = self.buffer.publish_shared(frame);
                let captured = self.stats.record_capture();
                if captured % FRAME_LOG_INTERVAL == 1 {
                    debug!(
                        session = %self.session,
                        sequence = frame.sequence,
                        width = frame.width,
                        height = frame.height,
                        captured,
                        "Capturing frames"
                    );
                }
                let sink = &self.sink;
                absorb_panic(self.session, "on_frame_preview", || sink.on_frame_preview(&frame));
            }
            None => self.stats.record_capture_miss(),
        }
        LoopAction::Continue
    }

    fn finish(mut self) {
        self.source.close();
        debug!(session = %self.session, "Capture loop released its source");
    }
}

/// State owned by the poll thread
pub(crate) struct PollWorker {
    chain: DecodeStrategyChain,
    dedup: Deduplicator,
    buffer: Arc<FrameBuffer>,
    stats: Arc<ScanStats>,
    last_sequence: Option<u64>,
    session: Uuid,
}

impl PollWorker {
    pub(crate) fn new(
        chain: DecodeStrategyChain,
        dedup: Deduplicator,
        buffer: Arc<FrameBuffer>,
        stats: Arc<ScanStats>,
        session: Uuid,
    ) -> Self {
        Self {
            chain,
            dedup,
            buffer,
            stats,
            last_sequence: None,
            session,
        }
    }

    /// Analyse the newest frame once, returning an event if one is due
    pub(crate) fn step(&mut self, now: Instant) -> Option<DetectionEvent> {
        let frame = self.buffer.snapshot()?;
        if self.last_sequence == Some(frame.sequence) {
            return None;
        }
        self.last_sequence = Some(frame.sequence);
        self.stats.record_analysed();

        let started = Instant::now();
        let outcome = self.chain.decode_frame(&frame);
        trace!(
            session = %self.session,
            sequence = frame.sequence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            found = outcome.is_found(),
            "Frame analysed"
        );

        let decoded = outcome.decoded()?;
        self.stats.record_hit(decoded.strategy);

        if !self.dedup.accept(&decoded.payload, now) {
            self.stats.record_suppressed();
            return None;
        }

        self.stats.record_event();
        info!(
            session = %self.session,
            payload = %decoded.payload,
            symbology = %decoded.symbology,
            strategy = decoded.strategy.as_str(),
            sequence = frame.sequence,
            "Barcode detected"
        );
        Some(DetectionEvent::new(decoded, now, frame.sequence))
    }

    fn finish(mut self) {
        self.dedup.reset();
        debug!(session = %self.session, "Poll loop finished");
    }
}

/// A running scanning session
struct Session {
    id: Uuid,
    started_at: Instant,
    capture: LoopController,
    poll: LoopController,
    buffer: Arc<FrameBuffer>,
    stats: Arc<ScanStats>,
}

/// Camera-to-sink barcode detection
///
/// Only `start` reports errors. Once running, capture glitches and decoder
/// faults are logged and absorbed; the sink only ever sees detections.
///
/// # Example
///
/// ```ignore
/// let pipeline = DetectionPipeline::new(|event: DetectionEvent| {
///     println!("{} ({})", event.payload, event.symbology);
/// });
/// pipeline.start(Box::new(LiveCamera::new(V4l2Driver::new(), None)), PipelineConfig::default())?;
/// // ...
/// pipeline.stop();
/// ```
pub struct DetectionPipeline {
    sink: Arc<dyn DetectionSink>,
    decoder: Arc<dyn Decoder>,
    state: Mutex<PipelineState>,
    session: Mutex<Option<Session>>,
    last_stats: Mutex<Arc<ScanStats>>,
}

impl DetectionPipeline {
    /// Pipeline using the built-in multi-format decoder
    pub fn new(sink: impl DetectionSink + 'static) -> Self {
        Self::with_decoder(sink, Arc::new(RxingDecoder::new()))
    }

    /// Pipeline using a specific decoding library
    pub fn with_decoder(sink: impl DetectionSink + 'static, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            sink: Arc::new(sink),
            decoder,
            state: Mutex::new(PipelineState::Idle),
            session: Mutex::new(None),
            last_stats: Mutex::new(Arc::new(ScanStats::new())),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Counters of the current session, or of the last one after `stop`
    pub fn stats(&self) -> StatsSnapshot {
        self.last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Open `source` and begin scanning
    ///
    /// The source is opened on the calling thread. On failure the pipeline
    /// stays idle and the error is returned; on success both worker loops are
    /// running when this returns. A worker thread that cannot be spawned is
    /// also a failure.
    pub fn start(&self, mut source: Box<dyn FrameSource>, config: PipelineConfig) -> Result<(), PipelineError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != PipelineState::Idle {
                let current = *state;
                debug!(state = %current, "Start requested while not idle");
                return Err(PipelineError::AlreadyRunning);
            }
            *state = PipelineState::Starting;
        }

        if let Err(e) = config.validate() {
            self.set_state(PipelineState::Idle);
            return Err(e.into());
        }

        let handle = match source.open(config.resolution) {
            Ok(handle) => handle,
            Err(e) => {
                source.close();
                self.set_state(PipelineState::Idle);
                return Err(e.into());
            }
        };

        let id = Uuid::new_v4();
        info!(
            session = %id,
            source = source.name(),
            resolution = %handle.resolution,
            poll_ms = config.poll_interval_ms,
            cooldown_ms = config.cooldown_ms,
            strategies = ?config.enabled_strategies,
            "Starting scanning session"
        );

        let buffer = Arc::new(FrameBuffer::new());
        let stats = Arc::new(ScanStats::new());
        *self.last_stats.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&stats);

        let capture = match LoopController::start(
            "barcode-capture",
            config.capture_interval(),
            CaptureWorker {
                source,
                buffer: Arc::clone(&buffer),
                sink: Arc::clone(&self.sink),
                stats: Arc::clone(&stats),
                session: id,
            },
            CaptureWorker::step,
            CaptureWorker::finish,
        ) {
            Ok(capture) => capture,
            Err(e) => {
                self.set_state(PipelineState::Idle);
                return Err(PipelineError::Spawn(e.to_string()));
            }
        };

        let sink = Arc::clone(&self.sink);
        let poll = match LoopController::start(
            "barcode-poll",
            config.poll_interval(),
            PollWorker::new(
                DecodeStrategyChain::from_config(Arc::clone(&self.decoder), &config),
                Deduplicator::new(config.cooldown()),
                Arc::clone(&buffer),
                Arc::clone(&stats),
                id,
            ),
            move |worker: &mut PollWorker| {
                let session = worker.session;
                absorb_panic(session, "poll_step", || {
                    if let Some(event) = worker.step(Instant::now()) {
                        sink.on_detection(event);
                    }
                });
                LoopAction::Continue
            },
            PollWorker::finish,
        ) {
            Ok(poll) => poll,
            Err(e) => {
                // Joining the capture loop closes the source
                let mut capture = capture;
                capture.stop();
                self.set_state(PipelineState::Idle);
                return Err(PipelineError::Spawn(e.to_string()));
            }
        };

        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Session {
            id,
            started_at: Instant::now(),
            capture,
            poll,
            buffer,
            stats,
        });
        self.set_state(PipelineState::Running);
        Ok(())
    }

    /// Stop scanning and release the source
    ///
    /// Blocks until both worker threads have exited. No callbacks reach the
    /// sink after this returns. Does nothing unless running.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != PipelineState::Running {
                return;
            }
            *state = PipelineState::Stopping;
        }

        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut session) = session {
            info!(session = %session.id, "Stopping scanning session");

            session.poll.request_stop();
            session.capture.request_stop();
            session.poll.join();
            session.capture.join();
            session.buffer.clear();

            let snapshot = session.stats.snapshot();
            info!(
                session = %session.id,
                duration_ms = session.started_at.elapsed().as_millis() as u64,
                frames_captured = snapshot.frames_captured,
                capture_misses = snapshot.capture_misses,
                frames_analysed = snapshot.frames_analysed,
                decode_hits = snapshot.decode_hits,
                events = snapshot.events_emitted,
                suppressed = snapshot.duplicates_suppressed,
                "Scanning session stopped"
            );
        }

        self.set_state(PipelineState::Idle);
    }
}

impl Drop for DetectionPipeline {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("DetectionPipeline dropped while running, stopping");
            self.stop();
        }
    }
}
