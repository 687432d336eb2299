//! Agent client - domain operations on top of the request executor.

use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::Result;

use super::executor::{RequestExecutor, RequestOptions};
use super::stream::{paced_snapshots, StreamHandler};
use super::transport::{ReqwestTransport, Transport};
use super::types::{Agent, AgentList, AgentResponse, GenerateRequest, Message};

const HEALTH_ENDPOINT: &str = "/api/health";
const AGENTS_ENDPOINT: &str = "/api/agents";

fn generate_endpoint(agent_id: &str) -> String {
    format!("{}/{}/generate", AGENTS_ENDPOINT, agent_id)
}

/// Client for a Mastra-style agent server.
///
/// Holds only immutable configuration, so one instance can serve concurrent
/// calls.
pub struct AgentClient<T: Transport = ReqwestTransport> {
    executor: RequestExecutor<T>,
    stream_delay: Duration,
}

impl AgentClient<ReqwestTransport> {
    /// Create a client backed by `reqwest`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_transport(config, ReqwestTransport::new()?)
    }
}

impl<T: Transport> AgentClient<T> {
    /// Create a client over a custom transport.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self> {
        Ok(Self {
            executor: RequestExecutor::with_transport(config, transport)?,
            stream_delay: config.stream_delay(),
        })
    }

    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    /// Probe the health endpoint. Never fails; exhausted retries mean `false`.
    pub async fn health_check(&self) -> bool {
        match self
            .executor
            .execute::<Value>(HEALTH_ENDPOINT, RequestOptions::get())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Fetch the agent catalogue.
    ///
    /// Falls back to an empty list when the field is missing or the request
    /// ultimately fails, so callers always have something to render.
    pub async fn list_agents(&self) -> Vec<Agent> {
        match self
            .executor
            .execute::<AgentList>(AGENTS_ENDPOINT, RequestOptions::get())
            .await
        {
            Ok(list) => list.agents.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to fetch agents: {}", e);
                Vec::new()
            }
        }
    }

    /// Send the conversation to `agent_id` and return its complete reply.
    ///
    /// Only role and content of each message are sent.
    pub async fn generate(&self, agent_id: &str, messages: &[Message]) -> Result<AgentResponse> {
        let body = serde_json::to_value(GenerateRequest::from_history(messages))?;
        info!("Generating with agent {} ({} messages)", agent_id, messages.len());
        self.executor
            .execute(&generate_endpoint(agent_id), RequestOptions::post(body))
            .await
    }

    /// Generate once, then reveal the reply word by word through `handler`.
    ///
    /// Failures go to [`StreamHandler::on_error`]; nothing is returned.
    /// After `cancel` fires no further chunk is emitted and
    /// [`StreamHandler::on_complete`] is skipped. Cancelling before the
    /// reply arrives ends the call without any callback.
    pub async fn stream_generate<H: StreamHandler>(
        &self,
        agent_id: &str,
        messages: &[Message],
        handler: &mut H,
        cancel: &CancellationToken,
    ) {
        let mut snapshots = match self.stream_snapshots(agent_id, messages, cancel).await {
            Ok(snapshots) => snapshots,
            Err(Error::Cancelled) => {
                info!("Request to agent {} cancelled", agent_id);
                return;
            }
            Err(e) => {
                error!("Stream error: {}", e);
                handler.on_error(&e);
                return;
            }
        };

        while let Some(chunk) = snapshots.next().await {
            handler.on_chunk(&chunk);
        }

        if cancel.is_cancelled() {
            info!("Stream from agent {} cancelled", agent_id);
            return;
        }
        handler.on_complete(&snapshots.response().text);
    }

    /// Pull-based form of [`stream_generate`](Self::stream_generate).
    ///
    /// The generate call happens here and its failure is returned; the
    /// resulting stream only paces the already-complete reply. If `cancel`
    /// fires while the call is in flight (retries and backoff included) the
    /// call is dropped and [`Error::Cancelled`] is returned.
    pub async fn stream_snapshots(
        &self,
        agent_id: &str,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<SnapshotStream> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.generate(agent_id, messages) => result?,
        };
        let inner = paced_snapshots(response.text.clone(), self.stream_delay, cancel.clone());
        Ok(SnapshotStream {
            response,
            inner: Box::pin(inner),
        })
    }
}

/// Finite, non-restartable stream of growing reply prefixes.
pub struct SnapshotStream {
    response: AgentResponse,
    inner: Pin<Box<dyn Stream<Item = String> + Send>>,
}

impl SnapshotStream {
    /// The complete response the snapshots are cut from.
    pub fn response(&self) -> &AgentResponse {
        &self.response
    }

    pub fn into_response(self) -> AgentResponse {
        self.response
    }
}

impl Stream for SnapshotStream {
    type Item = String;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
