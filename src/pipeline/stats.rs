// SPDX-License-Identifier: GPL-3.0-only

//! Session statistics

use crate::decode::Strategy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by a session's worker threads
#[derive(Debug, Default)]
pub struct ScanStats {
    frames_captured: AtomicU64,
    capture_misses: AtomicU64,
    frames_analysed: AtomicU64,
    decode_hits: AtomicU64,
    events_emitted: AtomicU64,
    duplicates_suppressed: AtomicU64,
    strategy_hits: [AtomicU64; Strategy::ALL.len()],
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_capture(&self) -> u64 {
        self.frames_captured.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_capture_miss(&self) {
        self.capture_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysed(&self) {
        self.frames_analysed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self, strategy: Strategy) {
        self.decode_hits.fetch_add(1, Ordering::Relaxed);
        self.strategy_hits[strategy.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            capture_misses: self.capture_misses.load(Ordering::Relaxed),
            frames_analysed: self.frames_analysed.load(Ordering::Relaxed),
            decode_hits: self.decode_hits.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            strategy_hits: Strategy::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), self.strategy_hits[s.index()].load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Point-in-time copy of `ScanStats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub capture_misses: u64,
    pub frames_analysed: u64,
    pub decode_hits: u64,
    pub events_emitted: u64,
    pub duplicates_suppressed: u64,
    /// Hits keyed by strategy name
    pub strategy_hits: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    /// Share of analysed frames that decoded, in percent
    pub fn hit_rate(&self) -> f64 {
        if self.frames_analysed == 0 {
            0.0
        } else {
            self.decode_hits as f64 * 100.0 / self.frames_analysed as f64
        }
    }

    pub fn hits_for(&self, strategy: Strategy) -> u64 {
        self.strategy_hits.get(strategy.as_str()).copied().unwrap_or(0)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames: {} captured, {} analysed; decodes: {} ({:.1}%); events: {}, suppressed: {}",
            self.frames_captured,
            self.frames_analysed,
            self.decode_hits,
            self.hit_rate(),
            self.events_emitted,
            self.duplicates_suppressed
        )
    }
}
