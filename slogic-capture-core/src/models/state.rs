/// Acquisition lifecycle state machine.
///
/// State transitions:
/// ```text
/// idle → running → aborting → drained
///           ↑__________________|  (next acquisition_start)
/// ```
///
/// `Aborting` is entered either by an explicit stop request or when the
/// completion handler drives the active transfer count to zero. `Drained`
/// is terminal for one acquisition; a new `acquisition_start` re-enters at
/// `Running` with freshly created state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    Running,
    Aborting,
    Drained,
}

impl AcquisitionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_aborting(&self) -> bool {
        matches!(self, Self::Aborting)
    }

    /// Whether the acquisition has fully torn down.
    pub fn is_drained(&self) -> bool {
        matches!(self, Self::Drained)
    }

    /// Whether an acquisition is in progress in any form.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Aborting)
    }
}
