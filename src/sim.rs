//! In-process backend with a configurable slow tail, for demos and the dashboard.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use rand::Rng;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::transport::{AttemptRequest, Transport, TransportError};

/// Latency and failure characteristics of the simulated backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SimProfile {
    /// Typical time to response.
    pub base_latency: Duration,
    /// Uniform jitter added on top of `base_latency`.
    pub jitter: Duration,
    /// Time to response of a request that lands in the slow tail.
    pub tail_latency: Duration,
    /// Probability of landing in the slow tail.
    pub tail_probability: f64,
    /// Probability of answering 503.
    pub error_probability: f64,
    /// Probability of a connection-level failure.
    pub network_error_probability: f64,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            base_latency: Duration::from_millis(40),
            jitter: Duration::from_millis(20),
            tail_latency: Duration::from_millis(800),
            tail_probability: 0.05,
            error_probability: 0.01,
            network_error_probability: 0.005,
        }
    }
}

#[derive(Debug)]
struct SimulatedFailure;

impl fmt::Display for SimulatedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simulated connection reset")
    }
}

impl std::error::Error for SimulatedFailure {}

enum Planned {
    Status(StatusCode),
    NetworkError,
}

/// Transport answering from a [`SimProfile`] instead of the network.
///
/// Clones share the profile and the attempt counter.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    profile: Arc<Mutex<SimProfile>>,
    attempts: Arc<AtomicU64>,
}

impl SimulatedTransport {
    pub fn new(profile: SimProfile) -> Self {
        Self {
            profile: Arc::new(Mutex::new(profile)),
            attempts: Arc::default(),
        }
    }

    pub fn profile(&self) -> SimProfile {
        self.profile
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_profile(&self, profile: SimProfile) {
        *self.profile.lock().unwrap_or_else(PoisonError::into_inner) = profile;
    }

    /// Physical attempts served so far, primaries and hedges alike.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn plan(&self) -> (Duration, Planned) {
        let profile = self.profile();
        let mut rng = rand::thread_rng();

        let delay = if rng.gen_bool(profile.tail_probability.clamp(0.0, 1.0)) {
            profile.tail_latency
        } else {
            let jitter_ms = profile.jitter.as_millis() as u64;
            profile.base_latency + Duration::from_millis(rng.gen_range(0..=jitter_ms))
        };

        let planned = if rng.gen_bool(profile.network_error_probability.clamp(0.0, 1.0)) {
            Planned::NetworkError
        } else if rng.gen_bool(profile.error_probability.clamp(0.0, 1.0)) {
            Planned::Status(StatusCode::SERVICE_UNAVAILABLE)
        } else {
            Planned::Status(StatusCode::OK)
        };

        (delay, planned)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    type Body = Bytes;

    async fn send(
        &self,
        request: AttemptRequest,
        cancel: CancellationToken,
    ) -> Result<http::Response<Self::Body>, TransportError> {
        let n = self.attempts.fetch_add(1, Ordering::Relaxed);
        let (delay, planned) = self.plan();

        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
        }

        match planned {
            Planned::NetworkError => Err(TransportError::Network(Box::new(SimulatedFailure))),
            Planned::Status(status) => {
                let body = format!(
                    "{{\"attempt\":{n},\"role\":\"{}\",\"path\":\"{}\"}}",
                    request.role, request.url
                );
                http::Response::builder()
                    .status(status)
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Bytes::from(body))
                    .map_err(|e| TransportError::Network(Box::new(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::transport::Role;

    fn attempt() -> AttemptRequest {
        AttemptRequest {
            role: Role::Primary,
            method: Method::GET,
            url: "/sim".to_string(),
            headers: Default::default(),
            body: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_profile_answers_ok() {
        let transport = SimulatedTransport::new(SimProfile {
            tail_probability: 0.0,
            error_probability: 0.0,
            network_error_probability: 0.0,
            ..SimProfile::default()
        });

        let response = transport
            .send(attempt(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_attempt() {
        let transport = SimulatedTransport::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport.send(attempt(), cancel).await.unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
    }
}
