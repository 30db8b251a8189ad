//! Caller-side cancellation carrying a reason.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

const DEFAULT_REASON: &str = "operation aborted";

/// Cloneable cancellation handle a caller passes into a hedged request.
///
/// Aborting is idempotent; the first reason wins.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts with the default reason.
    pub fn abort(&self) {
        self.abort_with(DEFAULT_REASON);
    }

    /// Aborts with the given reason, which is surfaced verbatim by
    /// [`HedgedError::Cancelled`](crate::HedgedError::Cancelled).
    pub fn abort_with(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> String {
        self.reason
            .get()
            .cloned()
            .unwrap_or_else(|| DEFAULT_REASON.to_string())
    }

    /// Underlying token; races derive their cancellation tree from it.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Completes once the signal is aborted.
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let signal = AbortSignal::new();
        assert!(!signal.is_aborted());

        signal.abort_with("user navigated away");
        signal.abort_with("second");
        assert!(signal.is_aborted());
        assert_eq!(signal.reason(), "user navigated away");
    }

    #[test]
    fn clones_share_state() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        clone.abort();
        assert!(signal.is_aborted());
        assert_eq!(signal.reason(), DEFAULT_REASON);
    }

    #[tokio::test]
    async fn aborted_resolves_after_abort() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.aborted().await });
        signal.abort();
        handle.await.unwrap();
    }
}
