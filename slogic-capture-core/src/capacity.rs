use log::warn;

use crate::models::capability::{SlogicModel, CHANNEL_COUNTS, SAMPLERATES};

/// Keeps the configured (sample rate, channel count) pair inside the
/// device's bandwidth ceiling.
///
/// Setters are best-effort clamps, not rejecting validators: an unreachable
/// or unsupported value is wrapped to the current ceiling with a warning,
/// never an error. Each setter recomputes the other dimension's ceiling, so
/// when the two dimensions fight over bandwidth the last writer wins. That
/// asymmetry is intentional: `set_samplerate(160M); set_channel_count(8)`
/// and the reverse order land on different pairs, both bandwidth-legal.
#[derive(Debug, Clone)]
pub struct CapacityModel {
    model: &'static SlogicModel,
    samplerate: u64,
    channel_count: u64,
    limit_samplerate: u64,
    limit_channel_count: u64,
    channel_enabled: Vec<bool>,
}

impl CapacityModel {
    pub fn new(model: &'static SlogicModel) -> Self {
        let limit_channel_count = model.max_channel_count;
        let limit_samplerate = (model.max_bandwidth / limit_channel_count).min(model.max_samplerate);
        Self {
            model,
            samplerate: limit_samplerate,
            channel_count: limit_channel_count,
            limit_samplerate,
            limit_channel_count,
            channel_enabled: vec![true; model.max_channel_count as usize],
        }
    }

    pub fn model(&self) -> &'static SlogicModel {
        self.model
    }

    pub fn samplerate(&self) -> u64 {
        self.samplerate
    }

    pub fn channel_count(&self) -> u64 {
        self.channel_count
    }

    /// Whether the logical channel at `index` participates in the capture.
    pub fn channel_enabled(&self, index: usize) -> bool {
        self.channel_enabled.get(index).copied().unwrap_or(false)
    }

    /// Current `rate * width` product, bits per second.
    pub fn bandwidth_in_use(&self) -> u64 {
        self.samplerate * self.channel_count
    }

    /// Set the sample rate, clamping to the channel-adjusted ceiling, and
    /// recompute the channel-count ceiling. Returns the applied value.
    pub fn set_samplerate(&mut self, rate: u64) -> u64 {
        let rate = if rate > self.limit_samplerate || !SAMPLERATES.contains(&rate) {
            warn!(
                "samplerate {} out of reach or unsupported, wrapping to {}",
                rate, self.limit_samplerate
            );
            self.limit_samplerate
        } else {
            rate
        };
        self.samplerate = rate;
        self.limit_channel_count = (self.model.max_bandwidth / rate).min(self.model.max_channel_count);
        rate
    }

    /// Set the channel count, clamping to the rate-adjusted ceiling, and
    /// recompute the sample-rate ceiling. Channels at or past the applied
    /// width are disabled. Returns the applied value.
    pub fn set_channel_count(&mut self, count: u64) -> u64 {
        let count = if count > self.limit_channel_count || !CHANNEL_COUNTS.contains(&count) {
            warn!(
                "channel count {} out of reach or unsupported, wrapping to {}ch",
                count, self.limit_channel_count
            );
            self.limit_channel_count
        } else {
            count
        };
        self.channel_count = count;
        self.limit_samplerate = (self.model.max_bandwidth / count).min(self.model.max_samplerate);
        for (index, enabled) in self.channel_enabled.iter_mut().enumerate() {
            *enabled = (index as u64) < count;
        }
        count
    }

    /// Sample rates reachable under the current channel count.
    pub fn supported_samplerates(&self) -> Vec<u64> {
        SAMPLERATES
            .iter()
            .copied()
            .filter(|rate| *rate <= self.limit_samplerate)
            .collect()
    }

    /// Channel counts reachable under the current sample rate.
    pub fn supported_channel_counts(&self) -> Vec<u64> {
        CHANNEL_COUNTS
            .iter()
            .copied()
            .filter(|count| *count <= self.limit_channel_count)
            .collect()
    }
}
