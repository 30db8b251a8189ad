//! Admission control for speculative attempts.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::config::BudgetConfig;

/// Capability set consulted before every speculative dispatch.
///
/// The operations are async so a fleet-wide implementation backed by a
/// shared counter store can be dropped in without touching the client.
#[async_trait]
pub trait HedgeBudget: Send + Sync {
    /// Whether enough tokens remain for one hedge.
    async fn can_hedge(&self) -> bool;

    /// Spends the cost of one hedge. Does not re-check the level.
    async fn consume_hedge(&self);

    /// Credits one successful primary completion.
    async fn inc(&self);

    /// Checks and spends in one step, returning whether a hedge was admitted.
    ///
    /// Implementations that can make this atomic should override it.
    async fn try_hedge(&self) -> bool {
        if self.can_hedge().await {
            self.consume_hedge().await;
            true
        } else {
            false
        }
    }
}

/// In-process token bucket replenished by successes rather than by time.
#[derive(Debug)]
pub struct LocalHedgeBudget {
    cfg: BudgetConfig,
    tokens: Mutex<f64>,
}

impl Default for LocalHedgeBudget {
    fn default() -> Self {
        Self::new(BudgetConfig::default())
    }
}

impl LocalHedgeBudget {
    /// Creates a full budget.
    pub fn new(cfg: BudgetConfig) -> Self {
        let tokens = cfg.max_tokens;
        Self::with_tokens(cfg, tokens)
    }

    /// Creates a budget starting at `tokens`, clamped to `[0, max_tokens]`.
    pub fn with_tokens(cfg: BudgetConfig, tokens: f64) -> Self {
        let tokens = tokens.clamp(0.0, cfg.max_tokens);
        Self {
            cfg,
            tokens: Mutex::new(tokens),
        }
    }

    /// Current token level.
    pub fn tokens(&self) -> f64 {
        *self.lock()
    }

    pub fn max_tokens(&self) -> f64 {
        self.cfg.max_tokens
    }

    fn lock(&self) -> MutexGuard<'_, f64> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HedgeBudget for LocalHedgeBudget {
    async fn can_hedge(&self) -> bool {
        *self.lock() >= self.cfg.hedge_cost
    }

    async fn consume_hedge(&self) {
        let mut tokens = self.lock();
        *tokens = (*tokens - self.cfg.hedge_cost).max(0.0);
    }

    async fn inc(&self) {
        let mut tokens = self.lock();
        *tokens = (*tokens + self.cfg.success_gain).min(self.cfg.max_tokens);
    }

    async fn try_hedge(&self) -> bool {
        let mut tokens = self.lock();
        if *tokens >= self.cfg.hedge_cost {
            *tokens -= self.cfg.hedge_cost;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn starts_full_and_admits_ten_hedges() {
        let budget = LocalHedgeBudget::default();
        assert_eq!(budget.tokens(), 10.0);

        for _ in 0..10 {
            assert!(budget.can_hedge().await);
            budget.consume_hedge().await;
        }
        assert!(!budget.can_hedge().await);
        assert_eq!(budget.tokens(), 0.0);
    }

    #[tokio::test]
    async fn inc_caps_at_max_tokens() {
        let budget = LocalHedgeBudget::default();
        budget.inc().await;
        assert_eq!(budget.tokens(), 10.0);

        budget.consume_hedge().await;
        for _ in 0..100 {
            budget.inc().await;
        }
        assert_eq!(budget.tokens(), 10.0);
    }

    #[tokio::test]
    async fn twenty_successes_earn_one_hedge() {
        let budget = LocalHedgeBudget::with_tokens(BudgetConfig::default(), 0.0);
        for _ in 0..19 {
            budget.inc().await;
        }
        assert!(!budget.can_hedge().await);

        budget.inc().await;
        budget.inc().await;
        assert!(budget.can_hedge().await);
    }

    #[tokio::test]
    async fn consume_never_goes_negative() {
        let budget = LocalHedgeBudget::with_tokens(BudgetConfig::default(), 0.5);
        budget.consume_hedge().await;
        assert_eq!(budget.tokens(), 0.0);
    }

    #[tokio::test]
    async fn try_hedge_is_check_and_consume() {
        let budget = LocalHedgeBudget::with_tokens(BudgetConfig::default(), 1.5);
        assert!(budget.try_hedge().await);
        assert!((budget.tokens() - 0.5).abs() < 1e-9);
        assert!(!budget.try_hedge().await);
        assert!((budget.tokens() - 0.5).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_hedges_admit_at_most_the_level() {
        let budget = Arc::new(LocalHedgeBudget::default());
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let budget = budget.clone();
                tokio::spawn(async move { budget.try_hedge().await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 10);
        assert_eq!(budget.tokens(), 0.0);
    }

    #[test]
    fn with_tokens_clamps_into_range() {
        let cfg = BudgetConfig::default();
        assert_eq!(LocalHedgeBudget::with_tokens(cfg.clone(), 42.0).tokens(), 10.0);
        assert_eq!(LocalHedgeBudget::with_tokens(cfg, -1.0).tokens(), 0.0);
    }
}
