// SPDX-License-Identifier: GPL-3.0-only

//! Repeat suppression for decoded payloads

use std::time::{Duration, Instant};
use tracing::trace;

/// Suppresses the same payload within a cooldown window
///
/// Owned by one scanning session's poll loop. A different payload is always
/// accepted at once; the same payload again only once `cooldown` has passed
/// since it was last accepted.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    cooldown: Duration,
    last_payload: Option<String>,
    last_emitted_at: Option<Instant>,
}

impl Deduplicator {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_payload: None,
            last_emitted_at: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Decide whether `payload` seen at `now` should be emitted
    ///
    /// Records the payload and time when it returns true. A `now` earlier
    /// than the last emission counts as no time elapsed.
    pub fn accept(&mut self, payload: &str, now: Instant) -> bool {
        let now = match self.last_emitted_at {
            Some(last) if now < last => last,
            _ => now,
        };

        let accepted = match (&self.last_payload, self.last_emitted_at) {
            (Some(last_payload), Some(last)) if last_payload == payload => {
                now.saturating_duration_since(last) >= self.cooldown
            }
            _ => true,
        };

        if accepted {
            self.last_payload = Some(payload.to_string());
            self.last_emitted_at = Some(now);
        } else {
            trace!(payload, "Suppressed repeat detection");
        }
        accepted
    }

    /// Forget the last emission
    pub fn reset(&mut self) {
        self.last_payload = None;
        self.last_emitted_at = None;
    }

    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }

    pub fn last_emitted_at(&self) -> Option<Instant> {
        self.last_emitted_at
    }
}
