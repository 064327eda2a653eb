use std::time::{Duration, Instant};

use log::debug;

use crate::engine::budget::TimingBudget;
use crate::traits::transport::{BulkTransport, TransferHandle, TransferStatus};

/// Upper bound on concurrently in-flight transfers.
pub const MAX_INFLIGHT_TRANSFERS: usize = 8;

/// Lifecycle of one transfer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Submitted,
    Completed,
    Cancelled,
}

/// Bookkeeping record for one bulk transfer.
///
/// The byte buffer travels to the transport on submit and returns with the
/// completion, so while a transfer is in flight the slot holds metadata
/// only; the buffer is never aliased.
#[derive(Debug)]
pub struct TransferSlot {
    handle: TransferHandle,
    state: SlotState,
    submitted_at: Instant,
    expected_timeout: Duration,
}

impl TransferSlot {
    fn submitted(handle: TransferHandle, expected_timeout: Duration) -> Self {
        Self {
            handle,
            state: SlotState::Submitted,
            submitted_at: Instant::now(),
            expected_timeout,
        }
    }

    pub fn handle(&self) -> TransferHandle {
        self.handle
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub fn expected_timeout(&self) -> Duration {
        self.expected_timeout
    }
}

/// Fixed-capacity collection of transfer slots.
///
/// `active_count` tracks how many submissions the engine still expects a
/// useful completion for. It is bookkeeping, not a count of physically
/// outstanding transfers: pool-fatal conditions force it to zero while the
/// transport may still hold transfers, whose eventual completions are then
/// settled without accounting.
///
/// Only ever mutated from the completion handler's single logical thread of
/// control.
#[derive(Debug, Default)]
pub struct TransferPool {
    slots: Vec<TransferSlot>,
    active_count: usize,
}

impl TransferPool {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_INFLIGHT_TRANSFERS),
            active_count: 0,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Submit new transfers while capacity remains and the outstanding
    /// buffers would not overshoot the remaining need. Returns how many
    /// were submitted.
    ///
    /// A failed submission releases its buffer and leaves the pool
    /// under-subscribed; there is no retry.
    pub fn fill<T: BulkTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        budget: &TimingBudget,
        bytes_captured: u64,
        bytes_needed: u64,
    ) -> usize {
        let per = budget.per_transfer_bytes as u64;
        let mut submitted = 0;
        while self.active_count < MAX_INFLIGHT_TRANSFERS
            && bytes_captured + self.active_count as u64 * per < bytes_needed
        {
            let mut buffer = Vec::new();
            if buffer.try_reserve_exact(budget.per_transfer_bytes).is_err() {
                debug!("failed to allocate buffer[{}]", self.active_count);
                break;
            }
            buffer.resize(budget.per_transfer_bytes, 0);

            let timeout = budget.slot_timeout(self.active_count);
            match transport.submit(buffer, timeout) {
                Ok(handle) => {
                    self.slots.push(TransferSlot::submitted(handle, timeout));
                    self.active_count += 1;
                    submitted += 1;
                }
                Err(err) => {
                    debug!("failed to submit transfer[{}]: {}", self.active_count, err);
                    break;
                }
            }
        }
        submitted
    }

    pub fn slot(&self, handle: TransferHandle) -> Option<&TransferSlot> {
        self.slots.iter().find(|slot| slot.handle == handle)
    }

    fn slot_mut(&mut self, handle: TransferHandle) -> Option<&mut TransferSlot> {
        self.slots.iter_mut().find(|slot| slot.handle == handle)
    }

    /// Move `handle`'s slot to a terminal state and decrement the active
    /// count.
    pub fn release(&mut self, handle: TransferHandle, state: SlotState) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.state = state;
        }
        self.active_count = self.active_count.saturating_sub(1);
    }

    /// Re-arm a just-released slot for resubmission under a new handle.
    pub fn rearm(&mut self, old: TransferHandle, new: TransferHandle, timeout: Duration) {
        if let Some(slot) = self.slot_mut(old) {
            slot.handle = new;
            slot.state = SlotState::Submitted;
            slot.submitted_at = Instant::now();
            slot.expected_timeout = timeout;
        }
        self.active_count += 1;
        debug_assert!(self.active_count <= MAX_INFLIGHT_TRANSFERS);
    }

    /// Settle a slot's terminal state without touching the active count
    /// (stale completions and pool-fatal statuses).
    pub fn settle(&mut self, handle: TransferHandle, status: TransferStatus) {
        let state = if status == TransferStatus::Cancelled {
            SlotState::Cancelled
        } else {
            SlotState::Completed
        };
        if let Some(slot) = self.slot_mut(handle) {
            slot.state = state;
        }
    }

    /// Force the whole pool to be treated as to-be-drained.
    pub fn poison(&mut self) {
        self.active_count = 0;
    }

    /// Handles still awaiting a terminal completion.
    pub fn submitted_handles(&self) -> Vec<TransferHandle> {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Submitted)
            .map(|slot| slot.handle)
            .collect()
    }

    /// Whether every slot has left the `Submitted` state.
    pub fn is_quiesced(&self) -> bool {
        !self.slots.iter().any(|slot| slot.state == SlotState::Submitted)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.active_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::transport::{SubmitError, TransferCompletion};

    struct RecordingTransport {
        accepted: Vec<(usize, Duration)>,
        refuse_after: usize,
        next_handle: u64,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                accepted: Vec::new(),
                refuse_after: usize::MAX,
                next_handle: 1,
            }
        }
    }

    impl BulkTransport for RecordingTransport {
        fn submit(
            &mut self,
            buffer: Vec<u8>,
            timeout: Duration,
        ) -> Result<TransferHandle, SubmitError> {
            if self.accepted.len() >= self.refuse_after {
                return Err(SubmitError::Rejected("queue full".into()));
            }
            self.accepted.push((buffer.len(), timeout));
            let handle = TransferHandle::new(self.next_handle);
            self.next_handle += 1;
            Ok(handle)
        }

        fn cancel(&mut self, _handle: TransferHandle) {}

        fn pump(&mut self, _timeout: Duration) -> Vec<TransferCompletion> {
            Vec::new()
        }
    }

    fn budget() -> TimingBudget {
        TimingBudget {
            per_transfer_bytes: 524_288,
            per_transfer_duration_ms: 100,
            tolerance: 0.25,
        }
    }

    #[test]
    fn fill_stops_at_the_need() {
        let mut transport = RecordingTransport::new();
        let mut pool = TransferPool::new();
        // 1_000_000 bytes needed at 524_288 per transfer: two suffice.
        let submitted = pool.fill(&mut transport, &budget(), 0, 1_000_000);
        assert_eq!(submitted, 2);
        assert_eq!(pool.active_count(), 2);
        assert!(transport.accepted.iter().all(|(len, _)| *len == 524_288));
    }

    #[test]
    fn fill_never_exceeds_the_inflight_cap() {
        let mut transport = RecordingTransport::new();
        let mut pool = TransferPool::new();
        let submitted = pool.fill(&mut transport, &budget(), 0, u64::MAX);
        assert_eq!(submitted, MAX_INFLIGHT_TRANSFERS);
        assert_eq!(pool.active_count(), MAX_INFLIGHT_TRANSFERS);
    }

    #[test]
    fn slot_timeouts_grow_with_queue_depth() {
        let mut transport = RecordingTransport::new();
        let mut pool = TransferPool::new();
        pool.fill(&mut transport, &budget(), 0, u64::MAX);
        let timeouts: Vec<Duration> = transport.accepted.iter().map(|(_, t)| *t).collect();
        // (1 + 0.25) * 100ms * (depth + 2)
        assert_eq!(timeouts[0], Duration::from_millis(250));
        assert_eq!(timeouts[1], Duration::from_millis(375));
        assert_eq!(timeouts[7], Duration::from_millis(1125));
    }

    #[test]
    fn submit_failure_leaves_pool_undersubscribed() {
        let mut transport = RecordingTransport::new();
        transport.refuse_after = 3;
        let mut pool = TransferPool::new();
        let submitted = pool.fill(&mut transport, &budget(), 0, u64::MAX);
        assert_eq!(submitted, 3);
        assert_eq!(pool.active_count(), 3);
    }

    #[test]
    fn release_and_rearm_round_trip() {
        let mut transport = RecordingTransport::new();
        let mut pool = TransferPool::new();
        pool.fill(&mut transport, &budget(), 0, 1_000_000);

        let first = pool.submitted_handles()[0];
        pool.release(first, SlotState::Completed);
        assert_eq!(pool.active_count(), 1);
        assert!(!pool.is_quiesced());

        let reborn = TransferHandle::new(99);
        pool.rearm(first, reborn, Duration::from_millis(250));
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.slot(reborn).unwrap().state(), SlotState::Submitted);
        assert!(pool.slot(first).is_none());
    }

    #[test]
    fn poison_zeroes_active_but_keeps_slots_pending() {
        let mut transport = RecordingTransport::new();
        let mut pool = TransferPool::new();
        pool.fill(&mut transport, &budget(), 0, u64::MAX);

        pool.poison();
        assert_eq!(pool.active_count(), 0);
        assert!(!pool.is_quiesced());
        assert_eq!(pool.submitted_handles().len(), MAX_INFLIGHT_TRANSFERS);

        for handle in pool.submitted_handles() {
            pool.settle(handle, TransferStatus::Cancelled);
        }
        assert!(pool.is_quiesced());
    }
}
