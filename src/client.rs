use std::{
    future,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
    time::Duration,
};

use http::{HeaderMap, HeaderValue};
use tokio::{
    sync::Notify,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    budget::{HedgeBudget, LocalHedgeBudget},
    config::HedgeConfig,
    errors::{AttemptError, BranchFailure, HedgedError},
    hooks::HedgeHooks,
    request::{is_safe_method, Hedged, HedgedRequest, HEDGE_REQUEST, IDEMPOTENCY_KEY},
    signal::AbortSignal,
    tracker::{LatencyTracker, LocalLatencyTracker},
    transport::{AttemptRequest, Role, Transport, TransportError},
};

/// How a single race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    PrimaryWin,
    SpeculativeWin,
    BothFailed,
    TimedOut,
    UserCancelled,
}

/// Terminal state of one branch of a race.
///
/// `Withdrawn` is the speculative branch refused by the budget: it is done,
/// produced nothing, and is never a winner.
enum Branch<B> {
    Accepted(http::Response<B>),
    Failed(AttemptError),
    Withdrawn,
}

#[derive(Debug, Default)]
struct HedgeStats {
    primary_wins: u64,
    speculative_wins: u64,
    hedges: u64,
    withdrawn: u64,
    failures: u64,
    timeouts: u64,
    cancellations: u64,
    total_latency_ms: f64,
}

/// Snapshot of the client's hedging statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HedgeStatsSnapshot {
    /// Races won by the primary attempt.
    pub primary_wins: u64,
    /// Races won by the speculative attempt.
    pub speculative_wins: u64,
    /// Speculative attempts actually dispatched.
    pub hedges: u64,
    /// Speculative attempts refused by the budget.
    pub withdrawn: u64,
    /// Races where every live attempt failed.
    pub failures: u64,
    /// Races that hit their deadline.
    pub timeouts: u64,
    /// Races aborted by the caller.
    pub cancellations: u64,
    /// Average latency in milliseconds of won races.
    pub avg_latency_ms: f64,
}

/// An HTTP client that hedges slow requests with a speculative second attempt.
///
/// Every call dispatches a primary attempt. If no response has arrived once
/// the adaptive delay elapses (or the primary fails), and the hedge budget
/// allows it, a speculative attempt is raced against the primary. The first
/// accepted response wins and the loser is cancelled.
///
/// Clones share the transport, the latency tracker, the budget and the
/// statistics, so one client can serve any number of concurrent calls.
pub struct HedgedClient<T> {
    transport: Arc<T>,
    tracker: Arc<dyn LatencyTracker>,
    budget: Arc<dyn HedgeBudget>,
    cfg: HedgeConfig,
    stats: Arc<Mutex<HedgeStats>>,
}

impl<T> Clone for HedgedClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            tracker: self.tracker.clone(),
            budget: self.budget.clone(),
            cfg: self.cfg.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<T: Transport> HedgedClient<T> {
    /// Creates a client with an in-process tracker and budget built from `cfg`.
    ///
    /// # Example
    /// ```no_run
    /// use hedged_http_client::{HedgeConfig, HedgedClient, ReqwestTransport};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = HedgedClient::new(ReqwestTransport::default(), HedgeConfig::default());
    /// let response = client.get("https://example.com/health").await?;
    /// println!("status {}", response.status());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(transport: T, cfg: HedgeConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            tracker: Arc::new(LocalLatencyTracker::new(cfg.latency.clone())),
            budget: Arc::new(LocalHedgeBudget::new(cfg.budget.clone())),
            cfg,
            stats: Arc::new(Mutex::new(HedgeStats::default())),
        }
    }

    /// Replaces the latency tracker, e.g. to share one across clients.
    pub fn with_tracker(mut self, tracker: Arc<dyn LatencyTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Replaces the hedge budget, e.g. with a fleet-wide implementation.
    pub fn with_budget(mut self, budget: Arc<dyn HedgeBudget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn config(&self) -> &HedgeConfig {
        &self.cfg
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Delay a speculative attempt would currently wait for.
    pub fn wait_time(&self) -> Duration {
        self.tracker.wait_time()
    }

    /// Returns a snapshot of accumulated hedging statistics.
    pub fn stats(&self) -> HedgeStatsSnapshot {
        let Ok(stats) = self.stats.lock() else {
            return HedgeStatsSnapshot::default();
        };

        let wins = stats.primary_wins + stats.speculative_wins;
        let avg = if wins > 0 {
            stats.total_latency_ms / (wins as f64)
        } else {
            0.0
        };

        HedgeStatsSnapshot {
            primary_wins: stats.primary_wins,
            speculative_wins: stats.speculative_wins,
            hedges: stats.hedges,
            withdrawn: stats.withdrawn,
            failures: stats.failures,
            timeouts: stats.timeouts,
            cancellations: stats.cancellations,
            avg_latency_ms: avg,
        }
    }

    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = HedgeStats::default();
        }
    }

    /// Hedged GET of `url` with default options.
    pub async fn get(&self, url: &str) -> Result<http::Response<T::Body>, HedgedError> {
        self.race(HedgedRequest::get(url)).await
    }

    /// Runs one hedged call.
    ///
    /// Returns the first accepted response (2xx, 3xx and 4xx are accepted, 4xx
    /// being a terminal client fault). The response carries a
    /// [`Hedged`](crate::Hedged) extension telling which attempt produced it.
    ///
    /// # Errors
    /// * [`HedgedError::Cancelled`] if the request's signal is or becomes aborted.
    /// * [`HedgedError::Timeout`] if the deadline elapses first.
    /// * [`HedgedError::ServiceUnavailable`] if every live attempt failed with a
    ///   5xx status or a transport error.
    pub async fn race(&self, request: HedgedRequest) -> Result<http::Response<T::Body>, HedgedError> {
        let start = Instant::now();
        let result = self.run_race(request, start).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok((settlement, response)) => {
                debug!(?settlement, status = %response.status(), elapsed_ms, "race settled");
                self.record(settlement, elapsed_ms);
                Ok(response)
            }
            Err(error) => {
                let settlement = match &error {
                    HedgedError::Cancelled { .. } => Settlement::UserCancelled,
                    HedgedError::Timeout(_) => Settlement::TimedOut,
                    HedgedError::ServiceUnavailable { .. } => Settlement::BothFailed,
                };
                debug!(?settlement, %error, elapsed_ms, "race failed");
                self.record(settlement, elapsed_ms);
                Err(error)
            }
        }
    }

    async fn run_race(
        &self,
        request: HedgedRequest,
        start: Instant,
    ) -> Result<(Settlement, http::Response<T::Body>), HedgedError> {
        let HedgedRequest {
            method,
            url,
            mut headers,
            body,
            signal,
            timeout,
            force_hedge,
            auto_idempotency,
            hooks,
        } = request;

        if let Some(signal) = &signal {
            if signal.is_aborted() {
                return Err(HedgedError::Cancelled {
                    reason: signal.reason(),
                });
            }
        }

        let is_safe = is_safe_method(&method);
        let hedging_allowed = is_safe || force_hedge;

        if !is_safe && auto_idempotency && !headers.contains_key(IDEMPOTENCY_KEY) {
            if let Some(key) = idempotency_key() {
                headers.insert(IDEMPOTENCY_KEY, key);
            }
        }

        // One root per race; both branches are children so dropping the guard
        // on any exit path cancels whatever is still in flight.
        let root = match &signal {
            Some(signal) => signal.token().child_token(),
            None => CancellationToken::new(),
        };
        let _release = root.clone().drop_guard();
        let primary_cancel = root.child_token();
        let speculative_cancel = root.child_token();

        let timeout = timeout.or(self.cfg.default_timeout);
        let primary_failed = Notify::new();

        let attempt = |role: Role, headers: HeaderMap| AttemptRequest {
            role,
            method: method.clone(),
            url: url.clone(),
            headers,
            body: body.clone(),
        };

        let primary = async {
            debug!(%method, %url, "dispatching primary attempt");
            let dispatched = Instant::now();
            let outcome = self
                .transport
                .send(attempt(Role::Primary, headers.clone()), primary_cancel.clone())
                .await;

            if outcome.is_ok() {
                self.tracker
                    .add(dispatched.elapsed().as_secs_f64() * 1000.0);
            }

            let branch = classify(outcome);
            if matches!(branch, Branch::Failed(_)) {
                primary_failed.notify_one();
            }
            branch
        };

        let speculative = async {
            let delay = self.tracker.wait_time();
            tokio::select! {
                _ = time::sleep(delay) => debug!(?delay, "adaptive delay elapsed"),
                _ = primary_failed.notified() => debug!("primary failed, waking speculative attempt"),
            }

            if !self.budget.try_hedge().await {
                debug!("hedge budget exhausted, speculative attempt withdrawn");
                self.bump(|s| s.withdrawn += 1);
                return Branch::Withdrawn;
            }

            call_hook("on_hedge", || hooks.on_hedge());
            self.bump(|s| s.hedges += 1);

            let mut hedge_headers = headers.clone();
            hedge_headers.insert(HEDGE_REQUEST, HeaderValue::from_static("true"));

            debug!(%method, %url, "dispatching speculative attempt");
            let outcome = self
                .transport
                .send(attempt(Role::Speculative, hedge_headers), speculative_cancel.clone())
                .await;

            classify(outcome)
        };

        let deadline = time::sleep(timeout.unwrap_or_default());
        tokio::pin!(primary, speculative, deadline);

        let mut primary_live = true;
        let mut speculative_live = hedging_allowed;
        let mut failures = Vec::new();

        if !hedging_allowed {
            debug!(%method, "method not safe to hedge, racing primary only");
        }

        while primary_live || speculative_live {
            tokio::select! {
                biased;

                _ = &mut deadline, if timeout.is_some() => {
                    return Err(HedgedError::Timeout(timeout.unwrap_or_default()));
                }
                _ = root.cancelled() => {
                    let reason = signal.as_ref().map(AbortSignal::reason).unwrap_or_default();
                    return Err(HedgedError::Cancelled { reason });
                }
                branch = &mut primary, if primary_live => {
                    primary_live = false;
                    match branch {
                        Branch::Accepted(mut response) => {
                            speculative_cancel.cancel();
                            if response.status().is_success() {
                                self.reward().await;
                            }

                            let elapsed = start.elapsed();
                            call_hook("on_primary_win", || hooks.on_primary_win(elapsed));

                            response.extensions_mut().insert(Hedged(false));
                            return Ok((Settlement::PrimaryWin, response));
                        }
                        Branch::Failed(error) => {
                            attempt_failed(Role::Primary, error, &*hooks, &mut failures);
                        }
                        Branch::Withdrawn => {}
                    }
                }
                branch = &mut speculative, if speculative_live => {
                    speculative_live = false;
                    match branch {
                        Branch::Accepted(mut response) => {
                            primary_cancel.cancel();

                            let elapsed = start.elapsed();
                            call_hook("on_speculative_win", || hooks.on_speculative_win(elapsed));

                            response.extensions_mut().insert(Hedged(true));
                            return Ok((Settlement::SpeculativeWin, response));
                        }
                        Branch::Failed(error) => {
                            attempt_failed(Role::Speculative, error, &*hooks, &mut failures);
                        }
                        Branch::Withdrawn => {}
                    }
                }
            }
        }

        Err(HedgedError::ServiceUnavailable { failures })
    }

    /// Credits a primary success without holding the race on the budget.
    ///
    /// The credit is polled once in place; a budget that has not answered by
    /// then finishes on a detached task.
    async fn reward(&self) {
        let budget = Arc::clone(&self.budget);
        let mut credit = Box::pin(async move { budget.inc().await });
        tokio::select! {
            biased;

            _ = &mut credit => {}
            _ = future::ready(()) => {
                debug!("hedge budget still crediting, detaching from race");
                tokio::spawn(credit);
            }
        }
    }

    fn bump(&self, f: impl FnOnce(&mut HedgeStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    fn record(&self, settlement: Settlement, elapsed_ms: f64) {
        self.bump(|stats| match settlement {
            Settlement::PrimaryWin => {
                stats.primary_wins += 1;
                stats.total_latency_ms += elapsed_ms;
            }
            Settlement::SpeculativeWin => {
                stats.speculative_wins += 1;
                stats.total_latency_ms += elapsed_ms;
            }
            Settlement::BothFailed => stats.failures += 1,
            Settlement::TimedOut => stats.timeouts += 1,
            Settlement::UserCancelled => stats.cancellations += 1,
        });
    }
}

/// Fresh UUID v4 key shared by both attempts of a race.
///
/// Hyphenated lowercase hex always forms a valid header value, so `None` is
/// not expected in practice.
fn idempotency_key() -> Option<HeaderValue> {
    match HeaderValue::try_from(Uuid::new_v4().hyphenated().to_string()) {
        Ok(key) => Some(key),
        Err(error) => {
            warn!(%error, "generated idempotency key is not a valid header value");
            None
        }
    }
}

/// Splits an attempt's outcome into accepted (< 500) and retryable failures.
fn classify<B>(outcome: Result<http::Response<B>, TransportError>) -> Branch<B> {
    match outcome {
        Ok(response) if response.status().as_u16() >= 500 => {
            Branch::Failed(AttemptError::Status(response.status()))
        }
        Ok(response) => Branch::Accepted(response),
        Err(error) => Branch::Failed(error.into()),
    }
}

fn attempt_failed(
    role: Role,
    error: AttemptError,
    hooks: &dyn HedgeHooks,
    failures: &mut Vec<BranchFailure>,
) {
    warn!(%role, %error, "attempt failed");
    call_hook("on_attempt_failed", || hooks.on_attempt_failed(role, &error));
    failures.push(BranchFailure { role, error });
}

fn call_hook(name: &'static str, hook: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
        warn!(hook = name, "hedge hook panicked");
    }
}
