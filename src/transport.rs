//! The seam between the hedging engine and whatever performs an exchange.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use tokio_util::sync::CancellationToken;

/// Which branch of a race an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Dispatched immediately when the race starts.
    Primary,
    /// Dispatched after the adaptive delay or a primary failure.
    Speculative,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Speculative => write!(f, "speculative"),
        }
    }
}

/// One physical attempt handed to a [`Transport`].
#[derive(Debug, Clone)]
pub struct AttemptRequest {
    pub role: Role,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Failure of a single exchange below the HTTP status level.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The attempt's cancellation token fired before a response arrived.
    #[error("attempt cancelled")]
    Cancelled,
}

/// Performs a single request/response exchange.
///
/// `send` should resolve as soon as the response head is available; the body
/// type is left to the implementation so it can stay un-read. Implementations
/// must abort the exchange promptly once `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    type Body: Send + 'static;

    async fn send(
        &self,
        request: AttemptRequest,
        cancel: CancellationToken,
    ) -> Result<http::Response<Self::Body>, TransportError>;
}
