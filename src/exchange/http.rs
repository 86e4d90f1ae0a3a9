// =============================================================================
// HTTP transport seam
// =============================================================================
//
// The exchange client only ever issues plain GETs with a per-request timeout.
// Keeping that behind a small object-safe trait lets the poller run against an
// in-memory transport in tests.
// =============================================================================

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The request never produced a response (connect, timeout, body read).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;

/// Minimal GET transport used by [`super::ExchangeClient`].
pub trait HttpTransport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> TransportFuture<'a>;
}

/// Production transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("ticker-feed/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> TransportFuture<'a> {
        Box::pin(async move {
            let resp = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        TransportError::new(format!("timed out after {}s", timeout.as_secs()))
                    } else if e.is_connect() {
                        TransportError::new(format!("connection failed: {e}"))
                    } else {
                        TransportError::new(format!("request failed: {e}"))
                    }
                })?;

            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| TransportError::new(format!("failed to read body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}
