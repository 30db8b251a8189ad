use std::time::Duration;

/// Latency tracker calibration.
///
/// The defaults are the calibrated values the adaptive delay is tuned for;
/// changing them changes when speculative attempts fire.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyConfig {
    /// Maximum number of samples kept in the sliding window.
    pub window_capacity: usize,

    /// Estimate used before enough samples have been observed.
    pub initial_estimate_ms: f64,

    /// Lower bound applied when the wait time is read.
    pub floor_ms: u64,

    /// Percentile of the window used as the raw estimate, in `(0.0, 1.0]`.
    pub percentile: f64,

    /// Weight of a new raw percentile in the exponential smoother.
    pub smoothing: f64,

    /// Samples required before the estimate is touched at all.
    pub min_samples: u64,

    /// Samples after which the estimate switches from overwrite to smoothing.
    pub warmup_samples: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            window_capacity: 100,
            initial_estimate_ms: 150.0,
            floor_ms: 25,
            percentile: 0.95,
            smoothing: 0.2,
            min_samples: 5,
            warmup_samples: 20,
        }
    }
}

/// Hedge budget calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetConfig {
    /// Upper bound of the token level. A fresh local budget starts full.
    pub max_tokens: f64,

    /// Tokens spent per speculative dispatch.
    pub hedge_cost: f64,

    /// Tokens earned per successful primary completion.
    pub success_gain: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10.0,
            hedge_cost: 1.0,
            success_gain: 0.05,
        }
    }
}

/// Hedging strategy configuration.
///
/// Controls how early speculative attempts fire and how much speculative
/// traffic the client is willing to add on top of its primary load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HedgeConfig {
    /// Adaptive delay calibration.
    pub latency: LatencyConfig,

    /// Admission control for speculative attempts.
    pub budget: BudgetConfig,

    /// Deadline applied to requests that do not carry their own.
    ///
    /// `None` means calls without an explicit timeout may run unbounded.
    pub default_timeout: Option<Duration>,
}

impl HedgeConfig {
    /// Creates a low-latency hedging configuration.
    ///
    /// Hedges earlier and tolerates more speculative traffic:
    /// - 10ms wait floor
    /// - 0.1 tokens earned per success
    /// - 1 second deadline
    pub fn low_latency() -> Self {
        Self {
            latency: LatencyConfig {
                floor_ms: 10,
                ..LatencyConfig::default()
            },
            budget: BudgetConfig {
                success_gain: 0.1,
                ..BudgetConfig::default()
            },
            default_timeout: Some(Duration::from_secs(1)),
        }
    }

    /// Creates a conservative hedging configuration.
    ///
    /// Minimizes added backend load, only hedging clearly late requests:
    /// - 50ms wait floor
    /// - 5 token ceiling, 0.02 tokens earned per success
    /// - 3 second deadline
    pub fn conservative() -> Self {
        Self {
            latency: LatencyConfig {
                floor_ms: 50,
                ..LatencyConfig::default()
            },
            budget: BudgetConfig {
                max_tokens: 5.0,
                success_gain: 0.02,
                ..BudgetConfig::default()
            },
            default_timeout: Some(Duration::from_secs(3)),
        }
    }

    /// Creates an aggressive hedging configuration.
    ///
    /// Prioritizes latency over backend load:
    /// - 90th percentile instead of 95th
    /// - 20 token ceiling, 0.2 tokens earned per success
    /// - 1 second deadline
    pub fn aggressive() -> Self {
        Self {
            latency: LatencyConfig {
                percentile: 0.90,
                floor_ms: 10,
                ..LatencyConfig::default()
            },
            budget: BudgetConfig {
                max_tokens: 20.0,
                success_gain: 0.2,
                ..BudgetConfig::default()
            },
            default_timeout: Some(Duration::from_secs(1)),
        }
    }
}
