use std::time::Duration;

use log::{debug, trace};

use slogic_capture_core::{
    CaptureError, SubmitError, TransferCompletion, TransferHandle, TransferStatus,
};
use slogic_capture_core::{BulkTransport, DeviceControl};

/// Failure-injection knobs for [`SimDevice`]. The default behavior is a
/// well-fed device that completes every transfer in full.
#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// Submissions larger than this are refused with `NoMem`, which is what
    /// drives the calibrator down to smaller chunks.
    pub alloc_limit: usize,
    /// Deliver the nth data completion (zero-based) with this status
    /// instead of data; every transfer after it settles as cancelled.
    pub fatal_after: Option<(usize, TransferStatus)>,
    /// Cap on completions delivered per pump, for tests that need to
    /// interleave pumps with wall-clock delays.
    pub max_completions_per_pump: usize,
    /// Deliver completions in reverse submission order.
    pub complete_reversed: bool,
    /// Drop cancel requests on the floor: in-flight transfers keep
    /// producing data and complete in full even after a cancel.
    pub ignore_cancel: bool,
    pub fail_remote_run: bool,
    pub fail_remote_stop: bool,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            alloc_limit: usize::MAX,
            fatal_after: None,
            max_completions_per_pump: usize::MAX,
            complete_reversed: false,
            ignore_cancel: false,
            fail_remote_run: false,
            fail_remote_stop: false,
        }
    }
}

#[derive(Debug)]
struct Inflight {
    handle: TransferHandle,
    buffer: Vec<u8>,
    cancelled: bool,
}

/// In-memory stand-in for a Slogic device.
///
/// Produces a deterministic byte stream: each data completion fills its
/// buffer with consecutive `position & 0xff` values from a device-side
/// counter, so a consumer can verify both the total and the content of
/// what it received. While the device is not running (or once it has hit
/// an injected fatal), transfers settle as cancelled and the counter does
/// not advance.
#[derive(Debug)]
pub struct SimDevice {
    behavior: SimBehavior,
    running: bool,
    wedged: bool,
    stream_position: u64,
    next_handle: u64,
    data_completions: usize,
    inflight: Vec<Inflight>,
    remote_runs: usize,
    remote_stops: usize,
}

impl SimDevice {
    pub fn new(behavior: SimBehavior) -> Self {
        Self {
            behavior,
            running: false,
            wedged: false,
            stream_position: 0,
            next_handle: 1,
            data_completions: 0,
            inflight: Vec::new(),
            remote_runs: 0,
            remote_stops: 0,
        }
    }

    pub fn remote_runs(&self) -> usize {
        self.remote_runs
    }

    pub fn remote_stops(&self) -> usize {
        self.remote_stops
    }

    /// Bytes the device has produced so far.
    pub fn stream_position(&self) -> u64 {
        self.stream_position
    }

    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Continue the `position & 0xff` counter stream into `buffer`.
    /// Template-copied in 256-byte chunks so large transfers stay cheap.
    fn fill_pattern(&mut self, buffer: &mut [u8]) {
        let mut pattern = [0u8; 256];
        for (i, byte) in pattern.iter_mut().enumerate() {
            *byte = ((self.stream_position as usize + i) & 0xff) as u8;
        }
        let mut chunks = buffer.chunks_exact_mut(256);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&pattern);
        }
        for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
            *byte = pattern[i];
        }
        self.stream_position += buffer.len() as u64;
    }

    fn complete(&mut self, entry: Inflight) -> TransferCompletion {
        let Inflight {
            handle,
            mut buffer,
            cancelled,
        } = entry;

        if cancelled || !self.running || self.wedged {
            return TransferCompletion {
                handle,
                status: TransferStatus::Cancelled,
                actual_length: 0,
                buffer,
            };
        }

        if let Some((at, status)) = self.behavior.fatal_after {
            if self.data_completions == at {
                debug!("injecting {:?} at data completion {}", status, at);
                self.wedged = true;
                return TransferCompletion {
                    handle,
                    status,
                    actual_length: 0,
                    buffer,
                };
            }
        }

        self.fill_pattern(&mut buffer);
        self.data_completions += 1;
        let actual_length = buffer.len();
        TransferCompletion {
            handle,
            status: TransferStatus::Completed,
            actual_length,
            buffer,
        }
    }
}

impl DeviceControl for SimDevice {
    fn remote_run(&mut self) -> Result<(), CaptureError> {
        if self.behavior.fail_remote_run {
            return Err(CaptureError::RemoteControlFailed("CMD_RUN refused".into()));
        }
        self.remote_runs += 1;
        self.running = true;
        Ok(())
    }

    fn remote_stop(&mut self) -> Result<(), CaptureError> {
        if self.behavior.fail_remote_stop {
            return Err(CaptureError::RemoteControlFailed("CMD_STOP refused".into()));
        }
        self.remote_stops += 1;
        self.running = false;
        Ok(())
    }
}

impl BulkTransport for SimDevice {
    fn submit(&mut self, buffer: Vec<u8>, timeout: Duration) -> Result<TransferHandle, SubmitError> {
        if buffer.len() > self.behavior.alloc_limit {
            return Err(SubmitError::NoMem);
        }
        let handle = TransferHandle::new(self.next_handle);
        self.next_handle += 1;
        trace!(
            "accepted transfer {:?}: {} bytes, timeout {:?}",
            handle,
            buffer.len(),
            timeout
        );
        self.inflight.push(Inflight {
            handle,
            buffer,
            cancelled: false,
        });
        Ok(handle)
    }

    fn cancel(&mut self, handle: TransferHandle) {
        if self.behavior.ignore_cancel {
            return;
        }
        if let Some(entry) = self.inflight.iter_mut().find(|e| e.handle == handle) {
            entry.cancelled = true;
        }
    }

    fn pump(&mut self, _timeout: Duration) -> Vec<TransferCompletion> {
        if self.behavior.complete_reversed {
            self.inflight.reverse();
        }
        let take = self.behavior.max_completions_per_pump.min(self.inflight.len());
        let entries: Vec<Inflight> = self.inflight.drain(..take).collect();
        if self.behavior.complete_reversed {
            // Put the untouched remainder back in submission order.
            self.inflight.reverse();
        }
        entries.into_iter().map(|entry| self.complete(entry)).collect()
    }
}
