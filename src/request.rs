//! Request surface of a hedged call and the decoration on its result.

use std::{fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::{
    hooks::{HedgeHooks, NoopHooks},
    signal::AbortSignal,
};

/// Header carrying the idempotency key of a non-safe request.
pub const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");

/// Header marking the speculative attempt of a race.
pub const HEDGE_REQUEST: HeaderName = HeaderName::from_static("x-hedge-request");

/// Methods that may be duplicated without caller opt-in.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// One logical call to be raced.
///
/// # Example
/// ```
/// use hedged_http_client::{AbortSignal, HedgedRequest};
/// use std::time::Duration;
///
/// let signal = AbortSignal::new();
/// let request = HedgedRequest::post("https://api.example.com/orders")
///     .body("{\"sku\":42}")
///     .force_hedge(true)
///     .auto_idempotency(true)
///     .timeout(Duration::from_secs(2))
///     .signal(signal.clone());
/// # let _ = request;
/// ```
#[derive(Clone)]
pub struct HedgedRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
    pub(crate) signal: Option<AbortSignal>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) force_hedge: bool,
    pub(crate) auto_idempotency: bool,
    pub(crate) hooks: Arc<dyn HedgeHooks>,
}

impl HedgedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            signal: None,
            timeout: None,
            force_hedge: false,
            auto_idempotency: false,
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Caller cancellation; aborting it fails the race with its reason.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Deadline for the whole race, covering both attempts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Allows hedging a method that is not safe to duplicate.
    pub fn force_hedge(mut self, force: bool) -> Self {
        self.force_hedge = force;
        self
    }

    /// Attaches a generated idempotency key to non-safe requests that lack one.
    pub fn auto_idempotency(mut self, enabled: bool) -> Self {
        self.auto_idempotency = enabled;
        self
    }

    pub fn hooks(mut self, hooks: impl HedgeHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for HedgedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HedgedRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .field("timeout", &self.timeout)
            .field("force_hedge", &self.force_hedge)
            .field("auto_idempotency", &self.auto_idempotency)
            .finish_non_exhaustive()
    }
}

/// Response extension recording whether the speculative attempt produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hedged(pub bool);

/// Read access to the [`Hedged`] marker.
pub trait ResponseExt {
    fn was_hedged(&self) -> bool;
}

impl<B> ResponseExt for http::Response<B> {
    fn was_hedged(&self) -> bool {
        self.extensions()
            .get::<Hedged>()
            .map(|h| h.0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::PUT));
        assert!(!is_safe_method(&Method::DELETE));
    }

    #[test]
    fn builder_defaults_are_off() {
        let request = HedgedRequest::get("http://localhost/");
        assert!(!request.force_hedge);
        assert!(!request.auto_idempotency);
        assert!(request.timeout.is_none());
        assert!(request.signal.is_none());
    }

    #[test]
    fn marker_is_out_of_band() {
        let mut response = http::Response::new("payload");
        assert!(!response.was_hedged());

        response.extensions_mut().insert(Hedged(true));
        assert!(response.was_hedged());
        assert_eq!(*response.body(), "payload");
        assert!(response.headers().is_empty());
    }
}
