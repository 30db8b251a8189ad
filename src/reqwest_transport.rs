//! [`Transport`] over a shared `reqwest::Client`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::transport::{AttemptRequest, Transport, TransportError};

/// HTTP transport backed by `reqwest`.
///
/// Resolves once the response head arrives; the body is handed back un-read
/// as the `reqwest::Response` itself, so callers stream or buffer it as they
/// see fit.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    type Body = reqwest::Response;

    async fn send(
        &self,
        request: AttemptRequest,
        cancel: CancellationToken,
    ) -> Result<http::Response<Self::Body>, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = tokio::select! {
            res = builder.send() => res.map_err(|e| TransportError::Network(Box::new(e)))?,
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
        };

        let mut head = http::Response::builder()
            .status(response.status())
            .version(response.version());
        if let Some(headers) = head.headers_mut() {
            headers.extend(
                response
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
        }

        head.body(response)
            .map_err(|e| TransportError::Network(Box::new(e)))
    }
}
