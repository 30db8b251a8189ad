#![allow(dead_code)]

use std::{
    collections::HashMap,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use hedged_http_client::{
    AttemptError, AttemptRequest, BudgetConfig, HedgeBudget, HedgeConfig, HedgeHooks,
    HedgedClient, LocalHedgeBudget, LocalLatencyTracker, Role, Transport, TransportError,
};
use http::{HeaderMap, StatusCode};
use tokio::time;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(u16),
    NetworkError,
}

/// What an attempt of a given role does: wait `delay`, then `reply`.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub delay: Duration,
    pub reply: Reply,
}

impl Step {
    pub fn status(ms: u64, code: u16) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            reply: Reply::Status(code),
        }
    }

    pub fn network_error(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            reply: Reply::NetworkError,
        }
    }

    /// Never answers on its own; only cancellation ends it.
    pub fn hang() -> Self {
        Self {
            delay: Duration::from_secs(3600),
            reply: Reply::Status(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub role: Role,
    pub headers: HeaderMap,
    pub cancel: CancellationToken,
}

/// Transport answering each role from a fixed script and recording attempts.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: HashMap<Role, Step>,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedTransport {
    pub fn new(primary: Step, speculative: Step) -> Self {
        let mut steps = HashMap::new();
        steps.insert(Role::Primary, primary);
        steps.insert(Role::Speculative, speculative);
        Self {
            steps,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_role(&self, role: Role) -> Option<Seen> {
        self.seen().into_iter().find(|s| s.role == role)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Body = String;

    async fn send(
        &self,
        request: AttemptRequest,
        cancel: CancellationToken,
    ) -> Result<http::Response<Self::Body>, TransportError> {
        let step = self
            .steps
            .get(&request.role)
            .copied()
            .unwrap_or_else(Step::hang);

        self.seen.lock().unwrap().push(Seen {
            role: request.role,
            headers: request.headers.clone(),
            cancel: cancel.clone(),
        });

        tokio::select! {
            _ = time::sleep(step.delay) => {}
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
        }

        match step.reply {
            Reply::Status(code) => Ok(http::Response::builder()
                .status(StatusCode::from_u16(code).unwrap())
                .body(request.role.to_string())
                .unwrap()),
            Reply::NetworkError => Err(TransportError::Network(Box::new(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )))),
        }
    }
}

pub struct Harness {
    pub client: HedgedClient<ScriptedTransport>,
    pub budget: Arc<LocalHedgeBudget>,
    pub tracker: Arc<LocalLatencyTracker>,
}

/// Client with a default tracker (150ms wait) and a budget at `tokens`.
pub fn harness(transport: ScriptedTransport, tokens: f64) -> Harness {
    let cfg = HedgeConfig::default();
    let budget = Arc::new(LocalHedgeBudget::with_tokens(BudgetConfig::default(), tokens));
    let tracker = Arc::new(LocalLatencyTracker::new(cfg.latency.clone()));
    let client = HedgedClient::new(transport, cfg)
        .with_budget(budget.clone())
        .with_tracker(tracker.clone());

    Harness {
        client,
        budget,
        tracker,
    }
}

/// Budget whose success credit lands only after `credit_delay`, like a
/// counter kept in a remote store.
#[derive(Debug)]
pub struct SlowCreditBudget {
    inner: LocalHedgeBudget,
    credit_delay: Duration,
}

impl SlowCreditBudget {
    pub fn new(tokens: f64, credit_delay: Duration) -> Self {
        Self {
            inner: LocalHedgeBudget::with_tokens(BudgetConfig::default(), tokens),
            credit_delay,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.inner.tokens()
    }
}

#[async_trait]
impl HedgeBudget for SlowCreditBudget {
    async fn can_hedge(&self) -> bool {
        self.inner.can_hedge().await
    }

    async fn consume_hedge(&self) {
        self.inner.consume_hedge().await
    }

    async fn inc(&self) {
        time::sleep(self.credit_delay).await;
        self.inner.inc().await
    }

    async fn try_hedge(&self) -> bool {
        self.inner.try_hedge().await
    }
}

#[derive(Debug, Default)]
struct Recorded {
    hedges: AtomicUsize,
    primary_wins: Mutex<Vec<Duration>>,
    speculative_wins: Mutex<Vec<Duration>>,
    failures: Mutex<Vec<Role>>,
}

/// Hooks that record every callback; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    inner: Arc<Recorded>,
    panic_on_hedge: bool,
}

impl RecordingHooks {
    pub fn panicking() -> Self {
        Self {
            panic_on_hedge: true,
            ..Self::default()
        }
    }

    pub fn hedges(&self) -> usize {
        self.inner.hedges.load(Ordering::SeqCst)
    }

    pub fn primary_wins(&self) -> Vec<Duration> {
        self.inner.primary_wins.lock().unwrap().clone()
    }

    pub fn speculative_wins(&self) -> Vec<Duration> {
        self.inner.speculative_wins.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<Role> {
        self.inner.failures.lock().unwrap().clone()
    }
}

impl HedgeHooks for RecordingHooks {
    fn on_hedge(&self) {
        self.inner.hedges.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_hedge {
            panic!("hook blew up");
        }
    }

    fn on_primary_win(&self, elapsed: Duration) {
        self.inner.primary_wins.lock().unwrap().push(elapsed);
    }

    fn on_speculative_win(&self, elapsed: Duration) {
        self.inner.speculative_wins.lock().unwrap().push(elapsed);
    }

    fn on_attempt_failed(&self, role: Role, _error: &AttemptError) {
        self.inner.failures.lock().unwrap().push(role);
    }
}
