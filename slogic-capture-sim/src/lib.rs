//! # Slogic Capture Sim
//!
//! Simulated device backend for exercising the capture engine without
//! hardware: a deterministic [`SimDevice`] with failure-injection knobs,
//! plus a recording sink and a manual pump scheduler for integration
//! tests.

pub mod device;
pub mod scheduler;
pub mod sink;

pub use device::{SimBehavior, SimDevice};
pub use scheduler::ManualScheduler;
pub use sink::RecordingSink;
