//! HTTP transport seam.
//!
//! [`RequestExecutor`](super::RequestExecutor) owns retries, timeouts and
//! status classification. A [`Transport`] only moves one request over the
//! wire and hands back the raw status and body.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};

use crate::error::Error;
use crate::Result;

/// One outgoing request, fully resolved.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Serialized JSON body
    pub body: Option<String>,
}

/// Raw response: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait — swappable HTTP backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Any status code the server answers with is an
    /// `Ok`; network failures are [`Error::Transport`] and requests that
    /// cannot be sent at all are [`Error::Config`].
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production transport over `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        // Timeouts are enforced per attempt by the executor.
        let client = Client::builder()
            .user_agent(concat!("mastra-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                // A malformed URL can never succeed; anything else is the network.
                if e.is_builder() {
                    Error::Config(format!("Invalid request to {}: {}", request.url, e))
                } else {
                    Error::Transport(format!("Failed to reach {}: {}", request.url, e))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

/// Scripted transport for testing.
///
/// Replays outcomes in order and records every request with the (tokio)
/// instant it was sent. Once the script runs out every call fails.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: std::sync::Arc<std::sync::Mutex<std::collections::VecDeque<Outcome>>>,
    sent: std::sync::Arc<std::sync::Mutex<Vec<(tokio::time::Instant, HttpRequest)>>>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub enum Outcome {
    Respond(u16, String),
    Fail(String),
    /// Rejected before reaching the wire.
    Invalid(String),
    /// Never settles; only a timeout ends the attempt.
    Hang,
}

#[cfg(test)]
impl ScriptedTransport {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            script: std::sync::Arc::new(std::sync::Mutex::new(outcomes.into())),
            sent: Default::default(),
        }
    }

    /// Create with JSON bodies answered with 200.
    pub fn ok(bodies: Vec<serde_json::Value>) -> Self {
        Self::new(
            bodies
                .into_iter()
                .map(|b| Outcome::Respond(200, b.to_string()))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<tokio::time::Instant> {
        self.sent.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn attempts(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.sent
            .lock()
            .unwrap()
            .push((tokio::time::Instant::now(), request));

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Outcome::Respond(status, body)) => Ok(HttpResponse { status, body }),
            Some(Outcome::Fail(message)) => Err(Error::Transport(message)),
            Some(Outcome::Invalid(message)) => Err(Error::Config(message)),
            Some(Outcome::Hang) => std::future::pending().await,
            None => Err(Error::Transport("connection refused".to_string())),
        }
    }
}
