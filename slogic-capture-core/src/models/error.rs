use thiserror::Error;

/// Errors that can occur during capture operations.
///
/// Transient conditions (allocation pressure, a single lost transfer, a
/// refused submission) are handled inside the engine and never surface
/// here; this enum covers only the fatal, caller-visible cases.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No viable transfer size could be calibrated; acquisition never
    /// started.
    #[error("calibration failed: {0}")]
    CalibrationFailed(String),

    /// The device refused a run/stop command.
    #[error("remote control failed: {0}")]
    RemoteControlFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}
