//! Hedged call execution for the TUI dashboard.

use std::time::Instant;

use hedged_http_client::{HedgedRequest, ResponseExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::app::{App, AppEvent, CallOutcome};

/// Spawns a hedged call based on the current app configuration.
///
/// The call is executed in a background task and sends the result via the provided channel.
/// Latency covers the race alone; the body is read once the race has settled.
pub fn spawn_hedged_call(app: &App, tx: mpsc::UnboundedSender<AppEvent>) {
    let client = app.client.clone();
    let request = HedgedRequest::new(app.method.clone(), app.target.clone())
        .force_hedge(app.force_hedge)
        .auto_idempotency(app.auto_idempotency);

    tokio::spawn(async move {
        let start = Instant::now();
        let result = client.race(request).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let (outcome, message) = match result {
            Ok(response) => {
                let outcome = if response.was_hedged() {
                    CallOutcome::Speculative
                } else {
                    CallOutcome::Primary
                };
                let status = response.status();
                let message = match response.into_body().bytes().await {
                    Ok(body) => format!("{status} ({} bytes)", body.len()),
                    Err(e) => format!("{status} (body read failed: {e})"),
                };
                (outcome, message)
            }
            Err(e) => (CallOutcome::Failed, e.to_string()),
        };

        let event = AppEvent::CallFinished {
            outcome,
            latency_ms,
            message,
        };
        if tx.send(event).is_err() {
            debug!("dashboard closed before hedged call finished");
        }
    });
}
