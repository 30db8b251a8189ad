//! An HTTP client that hedges slow requests to cut tail latency.
//!
//! Each call starts a primary attempt. When the primary is statistically late,
//! or fails outright, a speculative second attempt is raced against it and the
//! first accepted response wins. How late is "late" is learned from recent
//! response times, and how often the client may hedge is bounded by a budget
//! that only refills as primaries succeed.
//!
//! # Quick Start
//!
//! ```no_run
//! use hedged_http_client::{HedgeConfig, HedgedClient, HedgedRequest, ReqwestTransport, ResponseExt};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HedgedClient::new(ReqwestTransport::default(), HedgeConfig::default());
//!
//! let request = HedgedRequest::get("https://api.example.com/items/42")
//!     .timeout(Duration::from_secs(2));
//! let response = client.race(request).await?;
//!
//! println!("{} (hedged: {})", response.status(), response.was_hedged());
//! # Ok(())
//! # }
//! ```
//!
//! # Hedging Strategy
//!
//! 1. The primary attempt is dispatched immediately.
//! 2. Safe methods (GET, HEAD, OPTIONS), or any method with `force_hedge`,
//!    arm a speculative attempt that fires after the tracker's wait time, or
//!    immediately when the primary fails.
//! 3. The speculative attempt only fires if the [`HedgeBudget`] admits it.
//! 4. The first accepted response (anything below 500) wins; the other
//!    attempt is cancelled.
//! 5. If every live attempt fails, the call fails with a single
//!    [`HedgedError::ServiceUnavailable`].
//!
//! # Preset Configurations
//!
//! Use `HedgeConfig::low_latency()`, `::conservative()`, or `::aggressive()` for
//! common hedging strategies, or create a custom configuration.

pub mod budget;
pub mod client;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod reqwest_transport;
pub mod request;
pub mod signal;
pub mod sim;
pub mod tracker;
pub mod transport;

pub use budget::{HedgeBudget, LocalHedgeBudget};
pub use client::{HedgeStatsSnapshot, HedgedClient, Settlement};
pub use config::{BudgetConfig, HedgeConfig, LatencyConfig};
pub use errors::{AttemptError, BranchFailure, HedgedError};
pub use hooks::{HedgeHooks, NoopHooks};
pub use reqwest_transport::ReqwestTransport;
pub use request::{is_safe_method, Hedged, HedgedRequest, ResponseExt, HEDGE_REQUEST, IDEMPOTENCY_KEY};
pub use signal::AbortSignal;
pub use sim::{SimProfile, SimulatedTransport};
pub use tracker::{LatencyTracker, LocalLatencyTracker};
pub use transport::{AttemptRequest, Role, Transport, TransportError};
