//! High-volume stress test for hedged requests against the simulated backend.
//!
//! This example performs 20,000 concurrent calls with rate limiting against a
//! backend whose slowest 5% take 800ms, then compares the latency distribution
//! and the extra load that hedging added.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use hedged_http_client::{
    HedgeConfig, HedgedClient, HedgedRequest, ResponseExt, SimProfile, SimulatedTransport,
};
use tokio::sync::{mpsc, Semaphore};
use tracing_subscriber::EnvFilter;

const NUM_CALLS: usize = 20_000;
const MAX_IN_FLIGHT: usize = 256;

#[derive(Debug)]
enum CallOutcome {
    Ok { hedged: bool, latency: Duration },
    Err { error: String, latency: Duration },
}

#[derive(Debug)]
struct CallResult {
    call_idx: usize,
    outcome: CallOutcome,
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64 * p).ceil() as usize).clamp(1, sorted.len()) - 1;
    sorted[idx]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let transport = SimulatedTransport::new(SimProfile {
        base_latency: Duration::from_millis(20),
        jitter: Duration::from_millis(10),
        tail_latency: Duration::from_millis(800),
        tail_probability: 0.05,
        error_probability: 0.01,
        network_error_probability: 0.0,
    });
    let client = HedgedClient::new(transport, HedgeConfig::default());

    let (tx, mut rx) = mpsc::channel::<CallResult>(MAX_IN_FLIGHT * 2);
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let consumer = tokio::spawn(async move {
        let mut results: Vec<CallResult> = Vec::with_capacity(NUM_CALLS);

        while let Some(res) = rx.recv().await {
            if let CallOutcome::Err { error, latency } = &res.outcome {
                println!(
                    "[call {:05}] ERR  latency={:?} error={}",
                    res.call_idx, latency, error
                );
            }
            results.push(res);
        }

        results
    });

    let started = Instant::now();
    for i in 0..NUM_CALLS {
        let client_clone = client.clone();
        let tx_clone = tx.clone();
        let sem = semaphore.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };

            let start = Instant::now();
            let res = client_clone
                .race(HedgedRequest::get(format!("/items/{i}")))
                .await;
            let latency = start.elapsed();

            let outcome = match res {
                Ok(response) => CallOutcome::Ok {
                    hedged: response.was_hedged(),
                    latency,
                },
                Err(e) => CallOutcome::Err {
                    error: e.to_string(),
                    latency,
                },
            };

            let _ = tx_clone
                .send(CallResult {
                    call_idx: i,
                    outcome,
                })
                .await;
        });
    }

    drop(tx);
    let results = consumer.await?;
    let wall = started.elapsed();

    let mut latencies: Vec<Duration> = Vec::with_capacity(results.len());
    let mut hedged_wins = 0usize;
    let mut error_count = 0usize;

    for r in &results {
        match &r.outcome {
            CallOutcome::Ok { hedged, latency } => {
                if *hedged {
                    hedged_wins += 1;
                }
                latencies.push(*latency);
            }
            CallOutcome::Err { .. } => error_count += 1,
        }
    }
    latencies.sort();

    let stats = client.stats();
    let attempts = client.transport().attempts();

    println!("\n=== summary ===");
    println!("total calls          : {}", NUM_CALLS);
    println!("wall time            : {:?}", wall);
    println!("successes            : {}", NUM_CALLS - error_count);
    println!("errors (any kind)    : {}", error_count);
    println!("speculative wins     : {}", hedged_wins);
    println!("hedges dispatched    : {}", stats.hedges);
    println!("hedges withdrawn     : {}", stats.withdrawn);
    println!(
        "extra load           : {:.2}%",
        (attempts as f64 / NUM_CALLS as f64 - 1.0) * 100.0
    );
    println!("final wait time      : {:?}", client.wait_time());
    for p in [0.50, 0.95, 0.99, 0.999] {
        println!(
            "p{:<5}               : {:?}",
            p * 100.0,
            percentile(&latencies, p)
        );
    }

    Ok(())
}
