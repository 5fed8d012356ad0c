/// Health of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncHealth {
    /// No cycle has finished yet.
    #[default]
    Starting,

    /// The last cycle completed.
    Healthy,

    /// The last cycle was abandoned on a transient error (typically a remote
    /// call that exhausted its retries). Cursors are not advancing.
    Degraded,
}

impl SyncHealth {
    pub fn can_transition_to(&self, target: SyncHealth) -> bool {
        match self {
            SyncHealth::Starting => matches!(target, SyncHealth::Healthy | SyncHealth::Degraded),
            SyncHealth::Healthy => matches!(target, SyncHealth::Degraded),
            SyncHealth::Degraded => matches!(target, SyncHealth::Healthy),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, SyncHealth::Healthy)
    }
}
