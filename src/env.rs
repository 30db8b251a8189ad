//! Environment configuration for the dashboard backend.

use std::{env, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use color_eyre::{eyre::WrapErr, Result};
use hedged_http_client::{
    AttemptRequest, HedgeConfig, HedgedClient, LocalHedgeBudget, LocalLatencyTracker,
    ReqwestTransport, SimProfile, SimulatedTransport, Transport, TransportError,
};
use tokio_util::sync::CancellationToken;

/// Where dashboard calls go.
pub enum Backend {
    /// In-process backend with a tunable slow tail.
    Simulated(SimulatedTransport),
    /// A real HTTP endpoint.
    Http(ReqwestTransport),
}

/// Body of a [`Backend`] response.
///
/// HTTP bodies stay unread until the race is over, so the race settles on
/// the response head.
pub enum BackendBody {
    Buffered(Bytes),
    Streaming(reqwest::Response),
}

impl BackendBody {
    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Bytes, reqwest::Error> {
        match self {
            BackendBody::Buffered(bytes) => Ok(bytes),
            BackendBody::Streaming(response) => response.bytes().await,
        }
    }
}

#[async_trait]
impl Transport for Backend {
    type Body = BackendBody;

    async fn send(
        &self,
        request: AttemptRequest,
        cancel: CancellationToken,
    ) -> Result<http::Response<Self::Body>, TransportError> {
        let response = match self {
            Backend::Simulated(sim) => sim.send(request, cancel).await?.map(BackendBody::Buffered),
            Backend::Http(transport) => transport
                .send(request, cancel)
                .await?
                .map(BackendBody::Streaming),
        };
        Ok(response)
    }
}

/// Everything the dashboard needs to drive and observe hedged calls.
pub struct Setup {
    pub client: HedgedClient<Backend>,
    pub budget: Arc<LocalHedgeBudget>,
    pub tracker: Arc<LocalLatencyTracker>,
    pub sim: Option<SimulatedTransport>,
    pub target: String,
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

/// Builds the hedged client from environment variables.
///
/// Looks for the following environment variables:
/// - `HEDGE_TARGET_URL`: real endpoint; when unset a simulated backend is used
/// - `HEDGE_SIM_BASE_MS`, `HEDGE_SIM_TAIL_MS`: simulated latencies
/// - `HEDGE_SIM_TAIL_PROB`, `HEDGE_SIM_ERROR_PROB`: simulated tail and 503 rates
pub fn build_from_env() -> Result<Setup> {
    let cfg = HedgeConfig {
        default_timeout: Some(Duration::from_secs(2)),
        ..HedgeConfig::default()
    };

    let (backend, sim, target) = match env::var("HEDGE_TARGET_URL") {
        Ok(url) if !url.trim().is_empty() => {
            (Backend::Http(ReqwestTransport::default()), None, url)
        }
        _ => {
            let defaults = SimProfile::default();
            let profile = SimProfile {
                base_latency: Duration::from_millis(parse_env(
                    "HEDGE_SIM_BASE_MS",
                    defaults.base_latency.as_millis() as u64,
                )?),
                tail_latency: Duration::from_millis(parse_env(
                    "HEDGE_SIM_TAIL_MS",
                    defaults.tail_latency.as_millis() as u64,
                )?),
                tail_probability: parse_env("HEDGE_SIM_TAIL_PROB", defaults.tail_probability)?,
                error_probability: parse_env("HEDGE_SIM_ERROR_PROB", defaults.error_probability)?,
                ..defaults
            };

            if !(0.0..=1.0).contains(&profile.tail_probability)
                || !(0.0..=1.0).contains(&profile.error_probability)
            {
                color_eyre::eyre::bail!("HEDGE_SIM_*_PROB values must be within 0.0..=1.0");
            }

            let sim = SimulatedTransport::new(profile);
            (
                Backend::Simulated(sim.clone()),
                Some(sim),
                "sim://backend/items".to_string(),
            )
        }
    };

    let budget = Arc::new(LocalHedgeBudget::new(cfg.budget.clone()));
    let tracker = Arc::new(LocalLatencyTracker::new(cfg.latency.clone()));
    let client = HedgedClient::new(backend, cfg)
        .with_budget(budget.clone())
        .with_tracker(tracker.clone());

    Ok(Setup {
        client,
        budget,
        tracker,
        sim,
        target,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use hedged_http_client::{HedgedRequest, Role};
    use http::Method;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        time,
    };

    use super::*;

    const BODY_DELAY: Duration = Duration::from_millis(300);

    /// Serves `200` heads immediately and the body `BODY_DELAY` later.
    async fn slow_body_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let head = "HTTP/1.1 200 OK\r\ncontent-length: 5\r\nconnection: close\r\n\r\n";
                    socket.write_all(head.as_bytes()).await.unwrap();
                    socket.flush().await.unwrap();
                    time::sleep(BODY_DELAY).await;
                    let _ = socket.write_all(b"hello").await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}/items")
    }

    #[tokio::test]
    async fn http_backend_resolves_on_response_head() {
        let url = slow_body_server().await;
        let backend = Backend::Http(ReqwestTransport::default());

        let started = Instant::now();
        let request = AttemptRequest {
            role: Role::Primary,
            method: Method::GET,
            url,
            headers: Default::default(),
            body: None,
        };
        let response = backend.send(request, CancellationToken::new()).await.unwrap();
        assert!(started.elapsed() < BODY_DELAY);
        assert_eq!(response.status(), http::StatusCode::OK);

        let body = response.into_body().bytes().await.unwrap();
        assert_eq!(&body[..], b"hello");
        assert!(started.elapsed() >= BODY_DELAY);
    }

    #[tokio::test]
    async fn slow_bodies_are_not_learned_as_latency() {
        let url = slow_body_server().await;
        let tracker = Arc::new(LocalLatencyTracker::new(HedgeConfig::default().latency));
        let client = HedgedClient::new(Backend::Http(ReqwestTransport::default()), HedgeConfig::default())
            .with_tracker(tracker.clone());

        for _ in 0..5 {
            let response = client.race(HedgedRequest::get(url.as_str())).await.unwrap();
            let body = response.into_body().bytes().await.unwrap();
            assert_eq!(&body[..], b"hello");
        }

        assert_eq!(tracker.total_samples(), 5);
        assert!(tracker.estimate_ms() < 100.0, "estimate {}", tracker.estimate_ms());
        assert_eq!(client.stats().hedges, 0);
        assert!(client.wait_time() < BODY_DELAY);
    }
}
