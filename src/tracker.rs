//! Adaptive hedge delay derived from recently observed response times.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::config::LatencyConfig;

/// Source of the adaptive delay before a speculative attempt is launched.
///
/// Implementations are shared by every in-flight race, so both operations
/// must be safe to call concurrently.
pub trait LatencyTracker: Send + Sync {
    /// Records the time-to-response of a primary attempt, in milliseconds.
    fn add(&self, sample_ms: f64);

    /// Current wait threshold in milliseconds.
    fn wait_time_ms(&self) -> u64;

    /// Current wait threshold as a [`Duration`].
    fn wait_time(&self) -> Duration {
        Duration::from_millis(self.wait_time_ms())
    }
}

#[derive(Debug)]
struct TrackerState {
    window: VecDeque<f64>,
    total_samples: u64,
    estimate_ms: f64,
}

/// In-process latency tracker over a sliding window of samples.
///
/// The estimate follows the window's high percentile: it is overwritten while
/// fewer than `warmup_samples` have been observed, then exponentially smoothed.
#[derive(Debug)]
pub struct LocalLatencyTracker {
    cfg: LatencyConfig,
    state: Mutex<TrackerState>,
}

impl Default for LocalLatencyTracker {
    fn default() -> Self {
        Self::new(LatencyConfig::default())
    }
}

impl LocalLatencyTracker {
    pub fn new(cfg: LatencyConfig) -> Self {
        let state = TrackerState {
            window: VecDeque::with_capacity(cfg.window_capacity),
            total_samples: 0,
            estimate_ms: cfg.initial_estimate_ms.max(0.0),
        };

        Self {
            cfg,
            state: Mutex::new(state),
        }
    }

    /// Unclamped smoothed estimate in milliseconds.
    pub fn estimate_ms(&self) -> f64 {
        self.lock().estimate_ms
    }

    /// Number of samples currently held in the window.
    pub fn len(&self) -> usize {
        self.lock().window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples ever added, including evicted ones.
    pub fn total_samples(&self) -> u64 {
        self.lock().total_samples
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw percentile of the window: `sorted[floor(n * p) - 1]`, index clamped at 0.
    fn raw_percentile(&self, window: &VecDeque<f64>) -> Option<f64> {
        if window.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = window.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let idx = ((sorted.len() as f64 * self.cfg.percentile).floor() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);

        Some(sorted[idx])
    }

    #[cfg(test)]
    fn window(&self) -> Vec<f64> {
        self.lock().window.iter().copied().collect()
    }
}

impl LatencyTracker for LocalLatencyTracker {
    fn add(&self, sample_ms: f64) {
        if !sample_ms.is_finite() {
            return;
        }

        let mut state = self.lock();

        state.window.push_back(sample_ms.max(0.0));
        while state.window.len() > self.cfg.window_capacity {
            state.window.pop_front();
        }
        state.total_samples += 1;

        if state.total_samples < self.cfg.min_samples {
            return;
        }

        let Some(raw) = self.raw_percentile(&state.window) else {
            return;
        };

        state.estimate_ms = if state.total_samples < self.cfg.warmup_samples {
            raw
        } else {
            let alpha = self.cfg.smoothing;
            state.estimate_ms * (1.0 - alpha) + raw * alpha
        };
    }

    fn wait_time_ms(&self) -> u64 {
        let estimate = self.lock().estimate_ms.round() as u64;
        estimate.max(self.cfg.floor_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_uses_initial_estimate() {
        let tracker = LocalLatencyTracker::default();
        assert_eq!(tracker.wait_time_ms(), 150);
        assert!(tracker.is_empty());
    }

    #[test]
    fn five_equal_samples_set_the_estimate() {
        let tracker = LocalLatencyTracker::default();
        for _ in 0..5 {
            tracker.add(100.0);
        }
        assert_eq!(tracker.estimate_ms(), 100.0);
        assert_eq!(tracker.wait_time_ms(), 100);
    }

    #[test]
    fn fewer_than_five_samples_leave_estimate_untouched() {
        let tracker = LocalLatencyTracker::default();
        for _ in 0..4 {
            tracker.add(10.0);
        }
        assert_eq!(tracker.estimate_ms(), 150.0);
        assert_eq!(tracker.len(), 4);
    }

    #[test]
    fn wait_time_never_drops_below_floor() {
        let tracker = LocalLatencyTracker::default();
        for _ in 0..50 {
            tracker.add(1.0);
            assert!(tracker.wait_time_ms() >= 25);
        }
        assert_eq!(tracker.wait_time_ms(), 25);
        assert!(tracker.estimate_ms() < 25.0);
    }

    #[test]
    fn small_window_index_is_clamped_to_zero() {
        let cfg = LatencyConfig {
            min_samples: 1,
            ..LatencyConfig::default()
        };
        let tracker = LocalLatencyTracker::new(cfg);
        tracker.add(40.0);
        // floor(1 * 0.95) - 1 would be -1
        assert_eq!(tracker.estimate_ms(), 40.0);
    }

    #[test]
    fn cold_start_overwrites_with_latest_percentile() {
        let tracker = LocalLatencyTracker::default();
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0] {
            tracker.add(ms);
        }
        // n = 5, idx = floor(4.75) - 1 = 3
        assert_eq!(tracker.estimate_ms(), 40.0);

        tracker.add(500.0);
        // n = 6, idx = floor(5.7) - 1 = 4
        assert_eq!(tracker.estimate_ms(), 50.0);
    }

    #[test]
    fn steady_state_blends_previous_estimate() {
        let tracker = LocalLatencyTracker::default();
        for i in 1..=19 {
            tracker.add(i as f64 * 10.0);
        }
        // n = 19, idx = floor(18.05) - 1 = 17
        assert_eq!(tracker.estimate_ms(), 180.0);

        tracker.add(1000.0);
        // n = 20, idx = 18 -> 190, blended 80/20
        let expected = 180.0 * 0.8 + 190.0 * 0.2;
        assert!((tracker.estimate_ms() - expected).abs() < 1e-9);
        assert_eq!(tracker.wait_time_ms(), 182);
    }

    #[test]
    fn window_evicts_oldest_first() {
        let tracker = LocalLatencyTracker::default();
        for i in 0..150 {
            tracker.add(i as f64);
            assert!(tracker.len() <= 100);
        }

        let window = tracker.window();
        assert_eq!(window.len(), 100);
        assert_eq!(window.first().copied(), Some(50.0));
        assert_eq!(window.last().copied(), Some(149.0));
        assert_eq!(tracker.total_samples(), 150);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let tracker = LocalLatencyTracker::default();
        tracker.add(f64::NAN);
        tracker.add(f64::INFINITY);
        assert_eq!(tracker.total_samples(), 0);
    }

    #[test]
    fn concurrent_adds_keep_window_bounded() {
        let tracker = std::sync::Arc::new(LocalLatencyTracker::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        tracker.add((t * 200 + i) as f64);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.len(), 100);
        assert_eq!(tracker.total_samples(), 1600);
        assert!(tracker.wait_time_ms() >= 25);
    }
}
