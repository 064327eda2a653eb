use std::time::Duration;

use log::{debug, info};

use crate::models::error::CaptureError;
use crate::traits::transport::{BulkTransport, SubmitError};

/// Nominal duration one transfer should cover, in milliseconds.
pub const TARGET_TRANSFER_DURATION_MS: u64 = 125;

/// Burst alignment unit: transfers are sized in two 16 KiB halves.
pub const TRANSFER_ALIGN_BYTES: usize = 2 * 16 * 1024;

/// Smallest viable chunk. 32 KiB covers 125 ms at 1 MHz x 2ch, the lowest
/// supported configuration; probing below it means no plan is viable.
pub const MIN_TRANSFER_BYTES: usize = 32 * 1024;

/// Fraction of the per-transfer duration tolerated on top of the budget
/// before a completion counts as stalled.
pub const TRANSFER_DURATION_TOLERANCE: f64 = 0.25;

/// Bounded wait for the calibration probe's cancellation to settle. The
/// only blocking pump in the crate; used once per acquisition start.
const PROBE_SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Timing plan for an entire acquisition, produced once by [`calibrate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingBudget {
    pub per_transfer_bytes: usize,
    pub per_transfer_duration_ms: u64,
    pub tolerance: f64,
}

impl TimingBudget {
    /// Per-slot submission timeout, scaled by queue depth so transfers
    /// queued behind one slow transfer do not expire spuriously.
    pub fn slot_timeout(&self, active_count: usize) -> Duration {
        let ms = (1.0 + self.tolerance)
            * self.per_transfer_duration_ms as f64
            * (active_count as f64 + 2.0);
        Duration::from_millis(ms as u64)
    }

    /// Window after which a missing completion counts as a stall.
    pub fn stall_window(&self) -> Duration {
        Duration::from_millis(((1.0 + self.tolerance) * self.per_transfer_duration_ms as f64) as u64)
    }

    /// Pump registration period for the host.
    pub fn pump_period(&self) -> Duration {
        Duration::from_millis((self.per_transfer_duration_ms / 2).max(1))
    }
}

fn align_up(nbytes: usize) -> usize {
    (nbytes + TRANSFER_ALIGN_BYTES - 1) & !(TRANSFER_ALIGN_BYTES - 1)
}

fn align_down(nbytes: usize) -> usize {
    nbytes & !(TRANSFER_ALIGN_BYTES - 1)
}

fn duration_for(nbytes: usize, samplerate: u64, channel_count: u64) -> u64 {
    ((nbytes as u64 * 8 * 1000) / (samplerate * channel_count)).max(1)
}

/// Empirically find the largest per-transfer chunk the transport will take.
///
/// Starts from the chunk covering [`TARGET_TRANSFER_DURATION_MS`] at the
/// configured rate and width, aligned up to [`TRANSFER_ALIGN_BYTES`], and
/// probes with an allocate + submit + cancel round. Allocation or no-memory
/// failures halve the size and retry; any other refusal is fatal. The first
/// accepted size is halved once more as headroom for a full queue of
/// in-flight transfers.
///
/// The result stays aligned and at or above [`MIN_TRANSFER_BYTES`], except
/// when the configured bandwidth is too low to fill the floor within the
/// duration target; only then is a sub-floor chunk kept.
pub fn calibrate<T: BulkTransport + ?Sized>(
    transport: &mut T,
    samplerate: u64,
    channel_count: u64,
) -> Result<TimingBudget, CaptureError> {
    let mut nbytes = (TARGET_TRANSFER_DURATION_MS * samplerate * channel_count / 8 / 1000) as usize;

    loop {
        nbytes = align_up(nbytes);
        let duration_ms = duration_for(nbytes, samplerate, channel_count);
        debug!("plan to receive {} bytes per {}ms", nbytes, duration_ms);

        let mut probe = Vec::new();
        if probe.try_reserve_exact(nbytes).is_err() {
            debug!("failed to allocate {} bytes, halving", nbytes);
            nbytes >>= 1;
            if nbytes <= MIN_TRANSFER_BYTES {
                return Err(CaptureError::CalibrationFailed(format!(
                    "no viable transfer size above the {} byte floor",
                    MIN_TRANSFER_BYTES
                )));
            }
            continue;
        }
        probe.resize(nbytes, 0);

        match transport.submit(probe, Duration::ZERO) {
            Err(SubmitError::NoMem) => {
                debug!("probe submit refused (no memory), halving");
                nbytes >>= 1;
                if nbytes <= MIN_TRANSFER_BYTES {
                    return Err(CaptureError::CalibrationFailed(format!(
                        "no viable transfer size above the {} byte floor",
                        MIN_TRANSFER_BYTES
                    )));
                }
            }
            Err(err) => {
                return Err(CaptureError::CalibrationFailed(format!(
                    "probe submit rejected: {}",
                    err
                )));
            }
            Ok(handle) => {
                transport.cancel(handle);
                // The probe buffer comes back with the cancellation notice
                // and drops here.
                let _ = transport.pump(PROBE_SETTLE_TIMEOUT);

                let mut chosen = nbytes >> 1;
                if chosen >= MIN_TRANSFER_BYTES {
                    chosen = align_down(chosen);
                }
                // else: bandwidth too low to reach the floor; keep the
                // sub-floor chunk.
                let duration_ms = duration_for(chosen, samplerate, channel_count);
                info!("calibrated: {} bytes per {}ms", chosen, duration_ms);
                return Ok(TimingBudget {
                    per_transfer_bytes: chosen,
                    per_transfer_duration_ms: duration_ms,
                    tolerance: TRANSFER_DURATION_TOLERANCE,
                });
            }
        }
    }
}
