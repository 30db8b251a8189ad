//! Application state and logic for the TUI dashboard.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use hedged_http_client::{
    HedgeStatsSnapshot, HedgedClient, LatencyTracker, LocalHedgeBudget, LocalLatencyTracker,
    SimulatedTransport,
};
use http::Method;

use crate::env::{Backend, Setup};

/// How a dashboard call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The primary attempt answered first.
    Primary,
    /// The speculative attempt answered first.
    Speculative,
    /// The race failed (both attempts, deadline or cancellation).
    Failed,
}

/// Events emitted by hedged calls.
#[derive(Debug)]
pub enum AppEvent {
    /// A hedged call completed.
    CallFinished {
        outcome: CallOutcome,
        latency_ms: f64,
        message: String,
    },
}

/// Main application state for the TUI.
pub struct App {
    pub client: HedgedClient<Backend>,
    pub budget: Arc<LocalHedgeBudget>,
    pub tracker: Arc<LocalLatencyTracker>,
    pub sim: Option<SimulatedTransport>,
    pub target: String,
    pub method: Method,
    pub force_hedge: bool,
    pub auto_idempotency: bool,
    pub last_message: String,
    pub last_outcome: Option<CallOutcome>,
    pub last_latency_ms: Option<f64>,
    pub stats_snapshot: HedgeStatsSnapshot,
    pub batch_mode: bool,
    pub batch_count: usize,
    pub batch_current: usize,
    pub session_start: Instant,
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_errors: u64,
    pub latency_history: VecDeque<u64>,
    pub wait_history: VecDeque<u64>,
    pub call_timestamps: VecDeque<Instant>,
}

impl App {
    pub fn new(setup: Setup) -> Self {
        let Setup {
            client,
            budget,
            tracker,
            sim,
            target,
        } = setup;

        Self {
            client,
            budget,
            tracker,
            sim,
            target,
            method: Method::GET,
            force_hedge: false,
            auto_idempotency: true,
            last_message: String::from("Ready. Press 'r' to run a call or 'b' for batch mode"),
            last_outcome: None,
            last_latency_ms: None,
            stats_snapshot: HedgeStatsSnapshot::default(),
            batch_mode: false,
            batch_count: 100,
            batch_current: 0,
            session_start: Instant::now(),
            total_calls: 0,
            total_successes: 0,
            total_errors: 0,
            latency_history: VecDeque::with_capacity(100),
            wait_history: VecDeque::with_capacity(100),
            call_timestamps: VecDeque::with_capacity(1000),
        }
    }

    pub fn toggle_method(&mut self) {
        self.method = if self.method == Method::GET {
            Method::POST
        } else {
            Method::GET
        };
    }

    pub fn toggle_force_hedge(&mut self) {
        self.force_hedge = !self.force_hedge;
    }

    pub fn toggle_auto_idempotency(&mut self) {
        self.auto_idempotency = !self.auto_idempotency;
    }

    pub fn toggle_batch_mode(&mut self) {
        self.batch_mode = !self.batch_mode;
        if self.batch_mode {
            self.batch_current = 0;
            self.last_message = format!("Batch mode ON: {} calls queued", self.batch_count);
        } else {
            self.last_message = "Batch mode OFF".to_string();
        }
    }

    pub fn increase_batch_count(&mut self) {
        self.batch_count = (self.batch_count + 10).min(1000);
    }

    pub fn decrease_batch_count(&mut self) {
        self.batch_count = (self.batch_count.saturating_sub(10)).max(10);
    }

    /// Shifts the simulated slow-tail probability by `delta`.
    pub fn adjust_tail(&mut self, delta: f64) {
        let Some(sim) = &self.sim else {
            self.last_message = "Tail control needs the simulated backend".to_string();
            return;
        };

        let mut profile = sim.profile();
        profile.tail_probability = (profile.tail_probability + delta).clamp(0.0, 1.0);
        self.last_message = format!("Slow tail now {:.0}%", profile.tail_probability * 100.0);
        sim.set_profile(profile);
    }

    pub fn tail_probability(&self) -> Option<f64> {
        self.sim.as_ref().map(|sim| sim.profile().tail_probability)
    }

    pub fn refresh_stats(&mut self) {
        self.stats_snapshot = self.client.stats();
    }

    pub fn reset_stats(&mut self) {
        self.client.reset_stats();
        self.stats_snapshot = HedgeStatsSnapshot::default();
        self.last_message = "Stats reset".to_string();
    }

    pub fn wait_time_ms(&self) -> u64 {
        self.tracker.wait_time_ms()
    }

    pub fn budget_ratio(&self) -> f64 {
        let max = self.budget.max_tokens();
        if max > 0.0 {
            (self.budget.tokens() / max).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn set_last_result(&mut self, outcome: CallOutcome, latency_ms: f64, message: String) {
        self.last_outcome = Some(outcome);
        self.last_latency_ms = Some(latency_ms);

        self.total_calls += 1;
        let ok = outcome != CallOutcome::Failed;
        if ok {
            self.total_successes += 1;
        } else {
            self.total_errors += 1;
        }

        push_bounded(&mut self.latency_history, latency_ms as u64, 100);
        push_bounded(&mut self.wait_history, self.tracker.wait_time_ms(), 100);
        push_bounded(&mut self.call_timestamps, Instant::now(), 1000);

        self.refresh_stats();

        let status = if ok { "✓" } else { "✗" };
        self.last_message = format!("{} {} ({:.0} ms)", status, message, latency_ms);

        if self.batch_mode {
            self.batch_current += 1;
            if self.batch_current >= self.batch_count {
                self.batch_mode = false;
                self.last_message = format!("Batch complete! {} calls finished", self.batch_count);
            }
        }
    }

    pub fn should_run_call(&self) -> bool {
        self.batch_mode && self.batch_current < self.batch_count
    }

    pub fn session_uptime(&self) -> Duration {
        self.session_start.elapsed()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls > 0 {
            (self.total_successes as f64 / self.total_calls as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Share of won races that the speculative attempt won, in percent.
    pub fn hedge_win_rate(&self) -> f64 {
        let wins = self.stats_snapshot.primary_wins + self.stats_snapshot.speculative_wins;
        if wins > 0 {
            self.stats_snapshot.speculative_wins as f64 / wins as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn calls_per_second(&self) -> f64 {
        let one_sec_ago = Instant::now() - Duration::from_secs(1);

        self.call_timestamps
            .iter()
            .filter(|&&ts| ts > one_sec_ago)
            .count() as f64
    }

    pub fn average_latency(&self) -> f64 {
        if self.latency_history.is_empty() {
            return 0.0;
        }
        let total: u64 = self.latency_history.iter().sum();
        total as f64 / self.latency_history.len() as f64
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, cap: usize) {
    queue.push_back(value);
    if queue.len() > cap {
        queue.pop_front();
    }
}
