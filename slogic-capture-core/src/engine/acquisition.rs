use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace};
use parking_lot::Mutex;

use crate::capacity::CapacityModel;
use crate::engine::budget::{calibrate, TimingBudget};
use crate::engine::pool::{SlotState, TransferPool};
use crate::engine::stall::StallTracker;
use crate::models::capability::SlogicModel;
use crate::models::config::{CaptureConfig, CaptureMode};
use crate::models::error::CaptureError;
use crate::models::state::AcquisitionState;
use crate::models::stats::CaptureStats;
use crate::traits::control::CaptureDevice;
use crate::traits::scheduler::{PumpScheduler, PumpToken};
use crate::traits::sink::StreamSink;
use crate::traits::transport::{TransferCompletion, TransferStatus};

/// Streaming acquisition engine for Slogic capture devices.
///
/// Generic over the device backend via the `CaptureDevice` trait seam; the
/// payload consumer and pump source plug in as `StreamSink` and
/// `PumpScheduler`.
///
/// ```text
/// CapacityModel → calibrate() → TimingBudget
///                                   ↓
///                  TransferPool ← fill / resubmit
///                       ↓ completions (host pump)
///                handle_completion → StreamSink / StallTracker
///                       ↓ active_count == 0 or stop request
///                   drain → end_stream
/// ```
///
/// Every observable mutation happens inside `pump`, which the host invokes
/// from a single logical thread of control, so no internal locking is
/// needed beyond the shared stats snapshot. Completions may arrive in any
/// order across slots.
pub struct AcquisitionEngine<D: CaptureDevice> {
    device: D,
    sink: Arc<dyn StreamSink>,
    scheduler: Box<dyn PumpScheduler>,
    capacity: CapacityModel,
    config: CaptureConfig,
    state: AcquisitionState,
    budget: Option<TimingBudget>,
    pool: TransferPool,
    stall: StallTracker,
    stats: Arc<Mutex<CaptureStats>>,
    aborted: bool,
    pump_token: Option<PumpToken>,
}

impl<D: CaptureDevice> AcquisitionEngine<D> {
    pub fn new(
        device: D,
        model: &'static SlogicModel,
        sink: Arc<dyn StreamSink>,
        scheduler: Box<dyn PumpScheduler>,
    ) -> Self {
        Self {
            device,
            sink,
            scheduler,
            capacity: CapacityModel::new(model),
            config: CaptureConfig::default(),
            state: AcquisitionState::Idle,
            budget: None,
            pool: TransferPool::new(),
            stall: StallTracker::start(Instant::now()),
            stats: Arc::new(Mutex::new(CaptureStats::default())),
            aborted: false,
            pump_token: None,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn capacity(&self) -> &CapacityModel {
        &self.capacity
    }

    /// The timing plan of the current (or last) acquisition.
    pub fn budget(&self) -> Option<TimingBudget> {
        self.budget
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Snapshot of the acquisition diagnostics.
    pub fn stats(&self) -> CaptureStats {
        self.stats.lock().clone()
    }

    /// Shared handle for observing progress from another thread while the
    /// host pumps.
    pub fn stats_handle(&self) -> Arc<Mutex<CaptureStats>> {
        Arc::clone(&self.stats)
    }

    /// Best-effort sample-rate change; see `CapacityModel::set_samplerate`.
    pub fn set_samplerate(&mut self, rate: u64) -> u64 {
        self.capacity.set_samplerate(rate)
    }

    /// Best-effort channel-count change; see
    /// `CapacityModel::set_channel_count`.
    pub fn set_channel_count(&mut self, count: u64) -> u64 {
        self.capacity.set_channel_count(count)
    }

    pub fn configure(&mut self, config: CaptureConfig) -> Result<(), CaptureError> {
        if self.state.is_active() {
            return Err(CaptureError::InvalidState(
                "cannot reconfigure while acquiring".into(),
            ));
        }
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        self.config = config;
        Ok(())
    }

    /// Start an acquisition: reset the device, calibrate the transfer plan,
    /// prime the pool, signal stream start, and set the device running.
    ///
    /// Returns without error even when nothing could be queued; the drain
    /// path then delivers an immediate, empty stream.
    pub fn acquisition_start(&mut self) -> Result<(), CaptureError> {
        if self.state.is_active() {
            return Err(CaptureError::InvalidState(
                "acquisition already in progress".into(),
            ));
        }

        let samplerate = self.capacity.samplerate();
        let channel_count = self.capacity.channel_count();
        let bytes_needed = self
            .config
            .limit_samples
            .checked_mul(channel_count)
            .map(|bits| bits / 8)
            .ok_or_else(|| {
                CaptureError::ConfigurationFailed(format!(
                    "sample limit {} x {}ch overflows the byte budget",
                    self.config.limit_samples, channel_count
                ))
            })?;

        // Reset the device's producer side before planning transfers.
        self.device.remote_stop()?;
        info!(
            "need {} samples x {}ch @ {}MHz => {} bytes",
            self.config.limit_samples,
            channel_count,
            samplerate / 1_000_000,
            bytes_needed
        );

        let budget = calibrate(&mut self.device, samplerate, channel_count)?;

        *self.stats.lock() = CaptureStats {
            bytes_needed,
            ..CaptureStats::default()
        };
        self.aborted = false;
        self.pool = TransferPool::new();
        self.pump_token = Some(self.scheduler.register(budget.pump_period()));

        let submitted = self.pool.fill(&mut self.device, &budget, 0, bytes_needed);
        debug!("submitted {} transfers", submitted);
        self.stats.lock().transfers_submitted += submitted as u64;

        self.sink.begin_stream();
        self.sink.begin_frame();

        self.stall = StallTracker::start(Instant::now());
        self.budget = Some(budget);
        self.state = AcquisitionState::Running;

        if self.pool.active_count() == 0 {
            // Nothing queued (or nothing needed): tear down through the
            // normal drain path without ever running the device.
            return self.acquisition_stop();
        }

        if let Err(err) = self.device.remote_run() {
            error!("failed to start device: {}", err);
            // Leave the engine in a drainable state so the host can still
            // pump the queued transfers back out.
            self.aborted = true;
            self.state = AcquisitionState::Aborting;
            return Err(err);
        }
        Ok(())
    }

    /// Request an orderly stop. Cancellation and buffer release happen over
    /// subsequent `pump` calls; `end_stream` fires once the pool quiesces.
    /// Idempotent while an acquisition is active.
    pub fn acquisition_stop(&mut self) -> Result<(), CaptureError> {
        match self.state {
            AcquisitionState::Running => {
                info!("acquisition stop requested");
                self.aborted = true;
                self.state = AcquisitionState::Aborting;
                Ok(())
            }
            AcquisitionState::Aborting => Ok(()),
            AcquisitionState::Idle | AcquisitionState::Drained => Err(
                CaptureError::InvalidState("no acquisition in progress".into()),
            ),
        }
    }

    /// Host pump entry point: process transport completions and, once
    /// aborting, advance the drain. Non-blocking; the host calls this
    /// periodically until the engine reports `Drained`.
    pub fn pump(&mut self) {
        match self.state {
            AcquisitionState::Running => {
                let completions = self.device.pump(Duration::ZERO);
                for completion in completions {
                    self.handle_completion(completion);
                }
                if self.state.is_aborting() {
                    self.drain_step();
                }
            }
            AcquisitionState::Aborting => self.drain_step(),
            AcquisitionState::Idle | AcquisitionState::Drained => {}
        }
    }

    /// Per-completion accounting, payload hand-off, resubmission, and stall
    /// detection.
    fn handle_completion(&mut self, completion: TransferCompletion) {
        let TransferCompletion {
            handle,
            status,
            actual_length,
            buffer,
        } = completion;

        if self.aborted {
            // Stale completion after abort: settle the slot, drop the
            // buffer, account nothing.
            self.pool.settle(handle, status);
            return;
        }
        let Some(budget) = self.budget else { return };
        if self.pool.slot(handle).is_none() {
            trace!("completion for unknown transfer {:?}", handle);
            return;
        }

        let now = Instant::now();
        let since_last_reach = self.stall.since_last_reach(now);
        trace!(
            "transfer {:?} status {:?} ({} bytes)",
            handle,
            status,
            actual_length
        );

        match status {
            // A timed-out transfer may still carry data.
            TransferStatus::Completed | TransferStatus::TimedOut => {
                let sample = self.stall.record(actual_length as u64, now);
                let (clamped, captured, needed, completions) = {
                    let mut stats = self.stats.lock();
                    let remaining = stats.bytes_needed.saturating_sub(stats.bytes_captured);
                    let clamped = (actual_length as u64).min(remaining) as usize;
                    stats.bytes_captured += clamped as u64;
                    (
                        clamped,
                        stats.bytes_captured,
                        stats.bytes_needed,
                        stats.completions_observed,
                    )
                };
                debug!(
                    "[{}] got({:.2}%): {}/{} => {:.2}MBps, {:.2}MBps(avg) => +{:.3}={:.3}ms",
                    completions,
                    if needed == 0 {
                        100.0
                    } else {
                        100.0 * captured as f64 / needed as f64
                    },
                    captured,
                    needed,
                    sample.instant_mbps,
                    sample.average_mbps,
                    sample.delta.as_secs_f64() * 1000.0,
                    sample.total.as_secs_f64() * 1000.0
                );

                if clamped == 0 {
                    // Used-but-empty slot: retire it, no payload, no
                    // resubmit.
                    self.stats.lock().empty_completions += 1;
                    self.pool.release(handle, SlotState::Completed);
                } else {
                    if self.config.mode != CaptureMode::MaxSpeedTest {
                        self.sink.accept(&buffer[..clamped]);
                    }
                    self.pool.release(handle, SlotState::Completed);

                    let outstanding =
                        self.pool.active_count() as u64 * budget.per_transfer_bytes as u64;
                    if captured + outstanding < needed {
                        let timeout = budget.slot_timeout(self.pool.active_count());
                        match self.device.submit(buffer, timeout) {
                            Ok(new_handle) => {
                                trace!("resubmitted transfer as {:?}", new_handle);
                                self.pool.rearm(handle, new_handle, timeout);
                                self.stats.lock().resubmissions += 1;
                            }
                            Err(err) => debug!("failed to resubmit transfer: {}", err),
                        }
                    }
                }
            }

            // Fatal for the whole pool. Physically outstanding transfers
            // will settle through the abort guard once the drain begins.
            TransferStatus::Overflow | TransferStatus::Stall | TransferStatus::NoDevice => {
                error!("transfer {:?} failed fatally: {:?}", handle, status);
                self.pool.settle(handle, status);
                self.pool.poison();
            }

            // One slot lost; the acquisition continues with reduced
            // parallelism.
            TransferStatus::Cancelled | TransferStatus::Error => {
                debug!("transfer {:?} lost ({:?}), continuing degraded", handle, status);
                self.stats.lock().transport_errors += 1;
                let state = if status == TransferStatus::Cancelled {
                    SlotState::Cancelled
                } else {
                    SlotState::Completed
                };
                self.pool.release(handle, state);
            }
        }

        // Independent of status: a completion arriving long after the
        // previous one means the link stalled.
        let completions = self.stats.lock().completions_observed;
        let stall_window = budget.stall_window();
        if completions > 0 && since_last_reach > stall_window {
            error!(
                "timeout: {:.3}ms since last completion exceeds {:.3}ms ({}ms +{:.0}%)",
                since_last_reach.as_secs_f64() * 1000.0,
                stall_window.as_secs_f64() * 1000.0,
                budget.per_transfer_duration_ms,
                budget.tolerance * 100.0
            );
            self.pool.poison();
        }

        if self.pool.active_count() == 0 {
            let _ = self.acquisition_stop();
        }

        self.stats.lock().completions_observed += 1;
    }

    /// One non-blocking drain step: cancel whatever is still submitted,
    /// settle any completions the transport delivers, and finalize once
    /// every slot is out of flight.
    fn drain_step(&mut self) {
        for handle in self.pool.submitted_handles() {
            self.device.cancel(handle);
        }
        let completions = self.device.pump(Duration::ZERO);
        for completion in completions {
            self.handle_completion(completion);
        }
        if !self.pool.is_quiesced() {
            return;
        }

        let stats = self.stats();
        info!(
            "bulk in {}/{} bytes with {} transfers",
            stats.bytes_captured, stats.bytes_needed, stats.completions_observed
        );
        self.pool.clear();
        debug!("freed all transfers");
        if let Some(token) = self.pump_token.take() {
            self.scheduler.unregister(token);
        }
        if let Err(err) = self.device.remote_stop() {
            debug!("failed to stop device: {}", err);
        }
        self.sink.end_stream();
        self.state = AcquisitionState::Drained;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capability::SLOGIC_LITE_8;
    use crate::traits::control::DeviceControl;
    use crate::traits::transport::{BulkTransport, SubmitError, TransferHandle};

    /// Device that accepts the calibration probe and then at most
    /// `data_submits` real submissions, completing each in full on pump.
    struct LoopDevice {
        running: bool,
        next_handle: u64,
        inflight: Vec<(TransferHandle, Vec<u8>, bool)>,
        data_submits: usize,
        submits_seen: usize,
        fail_remote_stop: bool,
        fail_remote_run: bool,
    }

    impl LoopDevice {
        fn new(data_submits: usize) -> Self {
            Self {
                running: false,
                next_handle: 1,
                inflight: Vec::new(),
                data_submits,
                submits_seen: 0,
                fail_remote_stop: false,
                fail_remote_run: false,
            }
        }
    }

    impl DeviceControl for LoopDevice {
        fn remote_run(&mut self) -> Result<(), CaptureError> {
            if self.fail_remote_run {
                return Err(CaptureError::RemoteControlFailed("CMD_RUN refused".into()));
            }
            self.running = true;
            Ok(())
        }

        fn remote_stop(&mut self) -> Result<(), CaptureError> {
            if self.fail_remote_stop {
                return Err(CaptureError::RemoteControlFailed("CMD_STOP refused".into()));
            }
            self.running = false;
            Ok(())
        }
    }

    impl BulkTransport for LoopDevice {
        fn submit(
            &mut self,
            buffer: Vec<u8>,
            _timeout: Duration,
        ) -> Result<TransferHandle, SubmitError> {
            self.submits_seen += 1;
            // First submission is the calibration probe.
            if self.submits_seen > 1 + self.data_submits {
                return Err(SubmitError::Rejected("queue full".into()));
            }
            let handle = TransferHandle::new(self.next_handle);
            self.next_handle += 1;
            self.inflight.push((handle, buffer, false));
            Ok(handle)
        }

        fn cancel(&mut self, handle: TransferHandle) {
            if let Some(entry) = self.inflight.iter_mut().find(|(h, _, _)| *h == handle) {
                entry.2 = true;
            }
        }

        fn pump(&mut self, _timeout: Duration) -> Vec<TransferCompletion> {
            let running = self.running;
            self.inflight
                .drain(..)
                .map(|(handle, buffer, cancelled)| {
                    if cancelled || !running {
                        TransferCompletion {
                            handle,
                            status: TransferStatus::Cancelled,
                            actual_length: 0,
                            buffer,
                        }
                    } else {
                        let actual_length = buffer.len();
                        TransferCompletion {
                            handle,
                            status: TransferStatus::Completed,
                            actual_length,
                            buffer,
                        }
                    }
                })
                .collect()
        }
    }

    #[derive(Default)]
    struct CountingSink {
        events: Mutex<(u64, u64, u64, u64)>, // begin_stream, begin_frame, end_stream, bytes
    }

    impl StreamSink for CountingSink {
        fn begin_stream(&self) {
            self.events.lock().0 += 1;
        }

        fn begin_frame(&self) {
            self.events.lock().1 += 1;
        }

        fn accept(&self, payload: &[u8]) {
            self.events.lock().3 += payload.len() as u64;
        }

        fn end_stream(&self) {
            self.events.lock().2 += 1;
        }
    }

    struct NullScheduler {
        registered: u64,
        unregistered: u64,
    }

    impl PumpScheduler for NullScheduler {
        fn register(&mut self, _period: Duration) -> PumpToken {
            self.registered += 1;
            PumpToken::new(self.registered)
        }

        fn unregister(&mut self, _token: PumpToken) {
            self.unregistered += 1;
        }
    }

    fn engine_with(device: LoopDevice) -> (AcquisitionEngine<LoopDevice>, Arc<CountingSink>) {
        let sink = Arc::new(CountingSink::default());
        let engine = AcquisitionEngine::new(
            device,
            &SLOGIC_LITE_8,
            sink.clone(),
            Box::new(NullScheduler {
                registered: 0,
                unregistered: 0,
            }),
        );
        (engine, sink)
    }

    fn pump_until_drained(engine: &mut AcquisitionEngine<LoopDevice>) {
        for _ in 0..64 {
            engine.pump();
            if engine.state().is_drained() {
                return;
            }
        }
        panic!("engine did not drain");
    }

    #[test]
    fn stop_without_start_is_an_error() {
        let (mut engine, _) = engine_with(LoopDevice::new(8));
        assert!(matches!(
            engine.acquisition_stop(),
            Err(CaptureError::InvalidState(_))
        ));
    }

    #[test]
    fn zero_sample_limit_is_rejected() {
        let (mut engine, _) = engine_with(LoopDevice::new(8));
        let err = engine
            .configure(CaptureConfig {
                limit_samples: 0,
                mode: CaptureMode::Normal,
            })
            .unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }

    #[test]
    fn oversized_sample_limit_is_rejected_at_start() {
        // u64::MAX samples passes the zero check but its byte budget does
        // not fit in 64 bits once multiplied by the channel count.
        let (mut engine, sink) = engine_with(LoopDevice::new(8));
        engine
            .configure(CaptureConfig {
                limit_samples: u64::MAX,
                mode: CaptureMode::Normal,
            })
            .unwrap();
        let err = engine.acquisition_start().unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert_eq!(engine.state(), AcquisitionState::Idle);
        assert_eq!(sink.events.lock().0, 0);
    }

    #[test]
    fn remote_stop_failure_aborts_start() {
        let mut device = LoopDevice::new(8);
        device.fail_remote_stop = true;
        let (mut engine, sink) = engine_with(device);
        let err = engine.acquisition_start().unwrap_err();
        assert!(matches!(err, CaptureError::RemoteControlFailed(_)));
        assert_eq!(engine.state(), AcquisitionState::Idle);
        assert_eq!(sink.events.lock().0, 0);
    }

    #[test]
    fn remote_run_failure_leaves_a_drainable_engine() {
        let mut device = LoopDevice::new(8);
        device.fail_remote_run = true;
        let (mut engine, sink) = engine_with(device);
        let err = engine.acquisition_start().unwrap_err();
        assert!(matches!(err, CaptureError::RemoteControlFailed(_)));
        assert!(engine.state().is_aborting());

        pump_until_drained(&mut engine);
        assert_eq!(sink.events.lock().2, 1);
        assert_eq!(engine.stats().bytes_captured, 0);
    }

    #[test]
    fn empty_pool_drains_immediately_with_one_end_stream() {
        // Every post-probe submission refused: the pool never fills.
        let (mut engine, sink) = engine_with(LoopDevice::new(0));
        engine.acquisition_start().unwrap();
        assert_eq!(engine.state(), AcquisitionState::Aborting);

        pump_until_drained(&mut engine);
        let events = sink.events.lock();
        assert_eq!(events.0, 1);
        assert_eq!(events.1, 1);
        assert_eq!(events.2, 1);
        assert_eq!(events.3, 0);
    }

    #[test]
    fn happy_path_accounts_exactly_the_budget() {
        let (mut engine, sink) = engine_with(LoopDevice::new(64));
        engine
            .configure(CaptureConfig {
                limit_samples: 1_000_000,
                mode: CaptureMode::Normal,
            })
            .unwrap();
        engine.acquisition_start().unwrap();
        pump_until_drained(&mut engine);

        let stats = engine.stats();
        assert_eq!(stats.bytes_needed, 1_000_000);
        assert_eq!(stats.bytes_captured, 1_000_000);
        assert!(stats.is_satisfied());
        assert_eq!(sink.events.lock().3, 1_000_000);
        assert_eq!(sink.events.lock().2, 1);
    }

    #[test]
    fn stats_handle_observes_progress() {
        let (mut engine, _) = engine_with(LoopDevice::new(64));
        let handle = engine.stats_handle();
        engine.acquisition_start().unwrap();
        pump_until_drained(&mut engine);
        assert!(handle.lock().is_satisfied());
    }

    #[test]
    fn restart_after_drain_is_allowed() {
        let (mut engine, sink) = engine_with(LoopDevice::new(64));
        engine.acquisition_start().unwrap();
        pump_until_drained(&mut engine);

        engine.acquisition_start().unwrap();
        pump_until_drained(&mut engine);
        assert_eq!(sink.events.lock().2, 2);
    }
}
