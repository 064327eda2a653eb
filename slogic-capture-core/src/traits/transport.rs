use std::time::Duration;

use thiserror::Error;

/// Opaque identifier for one submitted bulk transfer.
///
/// Minted by the transport on `submit` and echoed back in the matching
/// `TransferCompletion`. Never derived from pointers or buffer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferHandle(u64);

impl TransferHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Device-reported outcome of a bulk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// The transfer finished; the buffer holds `actual_length` bytes.
    Completed,
    /// The per-transfer deadline expired. Some data may still have arrived.
    TimedOut,
    /// The device produced more than the buffer could hold. Pool-fatal.
    Overflow,
    /// The endpoint stalled. Pool-fatal.
    Stall,
    /// The device is gone (unplugged or reset). Pool-fatal.
    NoDevice,
    /// A cancellation request took effect.
    Cancelled,
    /// Any other transport failure.
    Error,
}

/// One completion event, drained via [`BulkTransport::pump`].
///
/// The buffer handed to `submit` comes back here by value: between
/// submission and completion it is owned by the transport, afterwards by
/// whoever receives the event. There is never a second reference to it.
#[derive(Debug)]
pub struct TransferCompletion {
    pub handle: TransferHandle,
    pub status: TransferStatus,
    /// Bytes actually written into `buffer`.
    pub actual_length: usize,
    pub buffer: Vec<u8>,
}

/// Why a submission was refused. The submitted buffer is released by the
/// transport in either case.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Transient out-of-memory class; the caller may retry with a smaller
    /// buffer.
    #[error("no memory for transfer")]
    NoMem,

    /// Anything else. Not retryable.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Raw bulk-transfer primitive, implemented by device backends.
///
/// The transport performs I/O asynchronously; completions are observed only
/// through `pump`, which the host invokes from a single logical thread of
/// control. Implementations must tolerate interleaved `submit`/`cancel`
/// calls from that same thread.
pub trait BulkTransport {
    /// Queue `buffer` for an inbound bulk transfer.
    ///
    /// A zero `timeout` means no deadline (used by the calibration probe).
    /// On success the transport owns the buffer until its completion is
    /// delivered; on failure the buffer is released.
    fn submit(&mut self, buffer: Vec<u8>, timeout: Duration) -> Result<TransferHandle, SubmitError>;

    /// Request cancellation of an in-flight transfer.
    ///
    /// Cooperative: resources are reclaimed only once the cancellation is
    /// observed through `pump`. Cancelling an unknown or already-settled
    /// handle is a no-op.
    fn cancel(&mut self, handle: TransferHandle);

    /// Process transport events for at most `timeout`, returning the
    /// completions observed. A zero `timeout` must not block.
    ///
    /// Completions are not guaranteed to arrive in submission order.
    fn pump(&mut self, timeout: Duration) -> Vec<TransferCompletion>;
}
