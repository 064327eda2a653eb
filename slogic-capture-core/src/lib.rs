//! # Slogic Capture Core
//!
//! Streaming acquisition engine for Sipeed Slogic USB logic analyzers.
//! The crate plans, sustains, and tears down the continuous bulk-in
//! stream: it sizes transfers against the configured bandwidth, keeps a
//! bounded pool of them in flight, hands captured bytes to a sink, and
//! detects when the link stalls.
//!
//! The device backend is abstracted behind the [`BulkTransport`] and
//! [`DeviceControl`] traits, so the engine runs identically against real
//! hardware plumbing or a simulated device.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                AcquisitionEngine                 │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────────┐  │
//! │  │ Capacity   │ │ Timing     │ │ Transfer     │  │
//! │  │ Model      │ │ Budget     │ │ Pool         │  │
//! │  └────────────┘ └────────────┘ └──────────────┘  │
//! │  ┌────────────┐ ┌────────────┐                   │
//! │  │ Stall      │ │ Capture    │                   │
//! │  │ Tracker    │ │ Stats      │                   │
//! │  └────────────┘ └────────────┘                   │
//! └──────┬─────────────────┬────────────────┬────────┘
//!        │ BulkTransport   │ StreamSink     │ PumpScheduler
//!        │ DeviceControl   │                │
//!   device backend    payload consumer   host event pump
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use slogic_capture_core::{AcquisitionEngine, CaptureConfig, SLOGIC_LITE_8};
//! # fn demo(device: impl slogic_capture_core::CaptureDevice,
//! #         sink: Arc<dyn slogic_capture_core::StreamSink>,
//! #         scheduler: Box<dyn slogic_capture_core::PumpScheduler>) {
//! let mut engine = AcquisitionEngine::new(device, &SLOGIC_LITE_8, sink, scheduler);
//! engine.set_samplerate(40_000_000);
//! engine.set_channel_count(8);
//! engine.configure(CaptureConfig::default()).unwrap();
//! engine.acquisition_start().unwrap();
//! while !engine.state().is_drained() {
//!     engine.pump();
//! }
//! # }
//! ```

pub mod capacity;
pub mod engine;
pub mod models;
pub mod traits;

pub use capacity::CapacityModel;
pub use engine::{
    AcquisitionEngine, ReachSample, StallTracker, TimingBudget, MAX_INFLIGHT_TRANSFERS,
};
pub use models::capability::{
    SlogicModel, CHANNEL_COUNTS, SAMPLERATES, SLOGIC_BASIC_16_U3, SLOGIC_LITE_8,
};
pub use models::config::{CaptureConfig, CaptureMode};
pub use models::error::CaptureError;
pub use models::state::AcquisitionState;
pub use models::stats::CaptureStats;
pub use traits::control::{CaptureDevice, DeviceControl};
pub use traits::scheduler::{PumpScheduler, PumpToken};
pub use traits::sink::StreamSink;
pub use traits::transport::{
    BulkTransport, SubmitError, TransferCompletion, TransferHandle, TransferStatus,
};
