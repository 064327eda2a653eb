use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use slogic_capture_core::{PumpScheduler, PumpToken};

#[derive(Debug, Default)]
struct SchedulerState {
    next_token: u64,
    registrations: Vec<(PumpToken, Duration)>,
}

/// Scheduler that records registrations instead of driving a timer; the
/// test itself calls the engine's `pump`.
///
/// Clones share state, so a test can hand one clone to the engine and keep
/// another to assert the registration lifecycle.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_registrations(&self) -> usize {
        self.state.lock().registrations.len()
    }

    /// Period of the most recent registration still active, if any.
    pub fn registered_period(&self) -> Option<Duration> {
        self.state.lock().registrations.last().map(|(_, period)| *period)
    }
}

impl PumpScheduler for ManualScheduler {
    fn register(&mut self, period: Duration) -> PumpToken {
        let mut state = self.state.lock();
        state.next_token += 1;
        let token = PumpToken::new(state.next_token);
        state.registrations.push((token, period));
        token
    }

    fn unregister(&mut self, token: PumpToken) {
        self.state
            .lock()
            .registrations
            .retain(|(registered, _)| *registered != token);
    }
}
