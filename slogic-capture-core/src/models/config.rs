use serde::{Deserialize, Serialize};

/// Payload handling mode for an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Forward every non-empty payload to the stream sink.
    Normal,
    /// Diagnostic mode: account bytes and throughput but discard payloads.
    MaxSpeedTest,
}

/// Configuration for one acquisition.
///
/// Sample rate and channel count live in the capacity model, not here, so
/// they stay clamped to the device's bandwidth ceiling at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Total samples to capture before the stream ends. The byte budget is
    /// `limit_samples * channel_count / 8`.
    pub limit_samples: u64,

    pub mode: CaptureMode,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.limit_samples == 0 {
            return Err("sample limit must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            limit_samples: 1_000_000,
            mode: CaptureMode::Normal,
        }
    }
}
