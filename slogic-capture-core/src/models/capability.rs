use serde::Serialize;

const fn mhz(n: u64) -> u64 {
    n * 1_000_000
}

/// Immutable capability set of one device model.
///
/// `max_bandwidth` is the ceiling on `samplerate * channel_count`, in bits
/// per second; the capacity model keeps the configured pair under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlogicModel {
    pub name: &'static str,
    pub max_samplerate: u64,
    pub max_channel_count: u64,
    pub max_bandwidth: u64,
}

pub const SLOGIC_LITE_8: SlogicModel = SlogicModel {
    name: "Slogic Lite 8",
    max_samplerate: mhz(160),
    max_channel_count: 8,
    max_bandwidth: mhz(320),
};

pub const SLOGIC_BASIC_16_U3: SlogicModel = SlogicModel {
    name: "Slogic Basic 16 U3",
    max_samplerate: mhz(1600),
    max_channel_count: 16,
    max_bandwidth: mhz(3200),
};

/// Discrete sample rates the firmware supports, across both models.
/// Per-model reachability is enforced by the capacity model's ceilings.
pub const SAMPLERATES: [u64; 16] = [
    mhz(1),
    mhz(2),
    mhz(4),
    mhz(5),
    mhz(8),
    mhz(10),
    mhz(16),
    mhz(20),
    mhz(32),
    // Slogic Lite 8: x8ch / x4ch / x2ch
    mhz(40),
    mhz(80),
    mhz(160),
    // Slogic Basic 16 U3: x16ch / x8ch / x4ch / x2ch
    mhz(200),
    mhz(400),
    mhz(800),
    mhz(1600),
];

/// Supported capture widths, in channels.
pub const CHANNEL_COUNTS: [u64; 4] = [2, 4, 8, 16];
