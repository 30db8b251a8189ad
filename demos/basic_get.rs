//! Basic example demonstrating a hedged HTTP request.
//!
//! Fetches `HEDGE_TARGET_URL` a few times so the latency tracker warms up,
//! printing which attempt won each call and how the adaptive wait evolves.

use std::{
    env,
    time::{Duration, Instant},
};

use anyhow::Context;
use hedged_http_client::{
    HedgeConfig, HedgeHooks, HedgedClient, HedgedRequest, ReqwestTransport, ResponseExt,
};
use tracing_subscriber::EnvFilter;

struct PrintHooks;

impl HedgeHooks for PrintHooks {
    fn on_hedge(&self) {
        println!("  -> primary is late, hedging");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Ok(url) = env::var("HEDGE_TARGET_URL") else {
        eprintln!("No target configured.");
        eprintln!("Set HEDGE_TARGET_URL, e.g. HEDGE_TARGET_URL=https://example.com/");
        return Ok(());
    };

    let cfg = HedgeConfig {
        default_timeout: Some(Duration::from_secs(2)),
        ..HedgeConfig::default()
    };
    let client = HedgedClient::new(ReqwestTransport::default(), cfg);

    for i in 0..10 {
        println!("[call {i}] wait_time={:?}", client.wait_time());

        let t0 = Instant::now();
        let request = HedgedRequest::get(url.as_str()).hooks(PrintHooks);
        let response = client
            .race(request)
            .await
            .with_context(|| format!("hedged GET {url} failed"))?;
        let dt = t0.elapsed();

        let hedged = response.was_hedged();
        let status = response.status();
        let body = response.into_body().bytes().await?;

        println!(
            "[call {i}] status={} hedged={} latency={:?} body_len={}",
            status,
            hedged,
            dt,
            body.len(),
        );
    }

    let stats = client.stats();
    println!(
        "primary_wins={} speculative_wins={} avg_latency={:.1}ms",
        stats.primary_wins, stats.speculative_wins, stats.avg_latency_ms
    );

    Ok(())
}
