use std::time::Duration;

/// Opaque registration token returned by [`PumpScheduler::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PumpToken(u64);

impl PumpToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Host-provided periodic callback source.
///
/// The engine registers once per acquisition and expects the host to invoke
/// its `pump` entry point roughly every `period` until the token is
/// unregistered. Delivery is serialized: the host never runs two pump
/// invocations concurrently.
pub trait PumpScheduler {
    fn register(&mut self, period: Duration) -> PumpToken;
    fn unregister(&mut self, token: PumpToken);
}
