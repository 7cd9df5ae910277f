use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Receive-path counters. Best effort: updated with relaxed atomics.
#[derive(Debug, Default)]
pub(crate) struct Stats {
    rx_frames: AtomicU64,
    matched_frames: AtomicU64,
    matches: AtomicU64,
}

impl Stats {
    pub(crate) fn record(&self, matches: u32) {
        self.rx_frames.fetch_add(1, Ordering::Relaxed);
        if matches > 0 {
            self.matched_frames.fetch_add(1, Ordering::Relaxed);
            self.matches.fetch_add(u64::from(matches), Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            matched_frames: self.matched_frames.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }
}

/// Counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Frames passed to dispatch.
    pub rx_frames: u64,
    /// Frames delivered to at least one receiver.
    pub matched_frames: u64,
    /// Total receiver invocations.
    pub matches: u64,
}

impl StatsSnapshot {
    /// Share of received frames that matched at least one receiver, in percent.
    pub fn match_ratio(&self) -> u64 {
        if self.rx_frames == 0 {
            0
        } else {
            self.matched_frames * 100 / self.rx_frames
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_frames_and_matches() {
        let stats = Stats::default();
        stats.record(0);
        stats.record(3);
        stats.record(1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.rx_frames, 3);
        assert_eq!(snapshot.matched_frames, 2);
        assert_eq!(snapshot.matches, 4);
        assert_eq!(snapshot.match_ratio(), 66);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(StatsSnapshot::default()).unwrap();
        assert_eq!(json["rx_frames"], 0);
        assert_eq!(json["matches"], 0);
    }
}
