// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for the capture and poll loops
//!
//! Both worker loops of a scanning session run on a dedicated thread that
//! executes one step per period. Steps start a fixed period apart, so time
//! spent inside a step shortens the sleep that follows it. The sleep waits on
//! a condition variable so a stop request wakes the thread immediately
//! instead of waiting for the period to elapse.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Cancellable stop flag shared between a controller and its thread
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake any sleeper
    pub fn stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `period` unless stopped first. Returns true if stopped.
    pub fn sleep(&self, period: Duration) -> bool {
        self.sleep_until(Instant::now() + period)
    }

    /// Sleep until `deadline` unless stopped first. Returns true if stopped.
    ///
    /// A deadline in the past only checks the flag.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .wake
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
        *stopped
    }
}

/// Controller for a paced worker loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let mut controller = LoopController::start("capture", Duration::from_millis(33), source,
///     |source| {
///         if let Some(frame) = source.capture_frame() {
///             buffer.publish(frame);
///         }
///         LoopAction::Continue
///     },
///     |mut source| source.close(),
/// )?;
///
/// // Later, stop the loop; `close` has run once this returns
/// controller.stop();
/// ```
pub struct LoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<StopSignal>,
    /// Name for logging
    name: String,
}

impl LoopController {
    /// Start a loop that owns `state`
    ///
    /// `loop_fn` runs once per `period` until it returns `LoopAction::Stop`
    /// or the controller is stopped. `on_exit` receives the state back on the
    /// worker thread after the last iteration, so resources the state owns are
    /// released before `stop()` returns.
    ///
    /// Fails if the worker thread cannot be spawned. `state` is dropped
    /// without `on_exit` in that case.
    pub fn start<S, F, E>(name: &str, period: Duration, state: S, loop_fn: F, on_exit: E) -> io::Result<Self>
    where
        S: Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
        E: FnOnce(S) + Send + 'static,
    {
        Self::spawn(
            thread::Builder::new().name(name.to_string()),
            name,
            period,
            state,
            loop_fn,
            on_exit,
        )
    }

    fn spawn<S, F, E>(
        builder: thread::Builder,
        name: &str,
        period: Duration,
        state: S,
        mut loop_fn: F,
        on_exit: E,
    ) -> io::Result<Self>
    where
        S: Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
        E: FnOnce(S) + Send + 'static,
    {
        let stop_signal = Arc::new(StopSignal::new());
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, period_ms = period.as_millis() as u64, "Starting worker loop");

        let spawn_result = builder.spawn(move || {
            debug!(name = %name_clone, "Worker loop thread started");
            let mut state = state;

            loop {
                if stop_signal_clone.is_stopped() {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                let step_started = Instant::now();
                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }

                if stop_signal_clone.sleep_until(step_started + period) {
                    debug!(name = %name_clone, "Stop signal received during sleep");
                    break;
                }
            }

            on_exit(state);
            info!(name = %name_clone, "Worker loop thread exiting");
        });

        let thread_handle = spawn_result.inspect_err(|e| {
            warn!(name = %name, error = %e, "Failed to spawn worker thread");
        })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting worker loop stop");
        self.stop_signal.stop();
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for worker loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Worker loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Worker loop thread finished");
            }
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "LoopController dropped, stopping loop");
            self.stop();
        }
    }
}
