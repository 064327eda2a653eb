use serde::Serialize;

/// Diagnostics for one acquisition.
///
/// Held behind `Arc<parking_lot::Mutex<_>>` by the engine so an observer
/// thread can snapshot progress while the host pumps. Invariant:
/// `bytes_captured <= bytes_needed`; completions that overshoot the need
/// are clamped, never reported in excess.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub bytes_needed: u64,
    pub bytes_captured: u64,
    /// Monotonic count of completion callbacks processed (any status).
    pub completions_observed: u64,
    pub transfers_submitted: u64,
    pub resubmissions: u64,
    /// Completions that carried no usable payload.
    pub empty_completions: u64,
    /// Non-fatal transport errors that retired a slot.
    pub transport_errors: u64,
}

impl CaptureStats {
    pub fn is_satisfied(&self) -> bool {
        self.bytes_captured >= self.bytes_needed
    }

    /// Capture progress in percent, for progress logging.
    pub fn percent(&self) -> f64 {
        if self.bytes_needed == 0 {
            return 100.0;
        }
        100.0 * self.bytes_captured as f64 / self.bytes_needed as f64
    }
}
