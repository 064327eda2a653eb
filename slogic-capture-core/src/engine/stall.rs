use std::time::{Duration, Instant};

/// Throughput figures for one data-bearing completion, feeding the
/// per-completion progress log line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachSample {
    /// Throughput of this completion alone, MB/s.
    pub instant_mbps: f64,
    /// Throughput averaged over the whole acquisition window, MB/s.
    pub average_mbps: f64,
    /// Time since the previous data-bearing completion.
    pub delta: Duration,
    /// Time since the acquisition window opened.
    pub total: Duration,
}

/// Tracks completion cadence and raw byte throughput.
///
/// Records the device-reported (pre-clamp) lengths: throughput diagnostics
/// reflect what the link moved, not what the byte budget kept.
#[derive(Debug, Clone, Copy)]
pub struct StallTracker {
    window_start: Instant,
    last_reach_at: Instant,
    last_reach_bytes: u64,
    cumulative_bytes: u64,
}

impl StallTracker {
    pub fn start(now: Instant) -> Self {
        Self {
            window_start: now,
            last_reach_at: now,
            last_reach_bytes: 0,
            cumulative_bytes: 0,
        }
    }

    /// Time since the last data-bearing completion (or the window start if
    /// none arrived yet). Compared against the stall window by the
    /// completion handler.
    pub fn since_last_reach(&self, now: Instant) -> Duration {
        now.duration_since(self.last_reach_at)
    }

    /// Record a data-bearing completion of `nbytes` and return its
    /// throughput sample.
    pub fn record(&mut self, nbytes: u64, now: Instant) -> ReachSample {
        let delta = now.duration_since(self.last_reach_at);
        let total = now.duration_since(self.window_start);
        self.last_reach_bytes = nbytes;
        self.cumulative_bytes += nbytes;
        let sample = ReachSample {
            instant_mbps: mbps(nbytes, delta),
            average_mbps: mbps(self.cumulative_bytes, total),
            delta,
            total,
        };
        self.last_reach_at = now;
        sample
    }

    pub fn cumulative_bytes(&self) -> u64 {
        self.cumulative_bytes
    }

    pub fn last_reach_bytes(&self) -> u64 {
        self.last_reach_bytes
    }
}

/// Bytes per microsecond, which is exactly MB/s.
fn mbps(bytes: u64, over: Duration) -> f64 {
    let micros = over.as_micros() as f64;
    if micros == 0.0 {
        return 0.0;
    }
    bytes as f64 / micros
}
