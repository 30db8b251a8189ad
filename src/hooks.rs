//! Per-request callbacks fired at race milestones.

use std::time::Duration;

use crate::{errors::AttemptError, transport::Role};

/// Observer for the lifecycle of one hedged call.
///
/// Every method has a no-op default. A panic inside a hook is caught and
/// logged; it never aborts the race.
pub trait HedgeHooks: Send + Sync {
    /// A speculative attempt is about to be dispatched.
    fn on_hedge(&self) {}

    /// The primary attempt won after `_elapsed` since the call started.
    fn on_primary_win(&self, _elapsed: Duration) {}

    /// The speculative attempt won after `_elapsed` since the call started.
    fn on_speculative_win(&self, _elapsed: Duration) {}

    /// An attempt ended in a retryable failure.
    fn on_attempt_failed(&self, _role: Role, _error: &AttemptError) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl HedgeHooks for NoopHooks {}
