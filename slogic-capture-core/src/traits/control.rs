use crate::models::error::CaptureError;
use crate::traits::transport::BulkTransport;

/// Remote control of the device's own data-producing state.
///
/// Both commands are issued exactly once per acquisition (stop at start for
/// a clean slate, run after the pool is primed, stop again at teardown).
/// A failure is fatal to the operation in progress and is surfaced, not
/// retried.
pub trait DeviceControl {
    fn remote_run(&mut self) -> Result<(), CaptureError>;
    fn remote_stop(&mut self) -> Result<(), CaptureError>;
}

/// The full capability set a device backend provides to the engine: bulk
/// transfer plumbing plus remote run/stop control. Selected once per model
/// at device-open time.
pub trait CaptureDevice: BulkTransport + DeviceControl {}

impl<T: BulkTransport + DeviceControl> CaptureDevice for T {}
