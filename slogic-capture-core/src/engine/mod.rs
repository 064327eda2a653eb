//! Acquisition engine: timing calibration, the transfer pool, stall
//! tracking, and the orchestrator that ties them to a device backend.

pub mod acquisition;
pub mod budget;
pub mod pool;
pub mod stall;

pub use acquisition::AcquisitionEngine;
pub use budget::{calibrate, TimingBudget};
pub use pool::{SlotState, TransferPool, TransferSlot, MAX_INFLIGHT_TRANSFERS};
pub use stall::{ReachSample, StallTracker};
