//! Agent server client.
//!
//! This module provides:
//! - [`Transport`] trait for the HTTP backend, with [`ReqwestTransport`]
//! - [`RequestExecutor`] for retries, backoff and per-attempt timeouts
//! - [`AgentClient`] for the health, agents and generate endpoints
//! - Fabricated streaming over the generate endpoint
//!
//! # Example
//!
//! ```ignore
//! let client = AgentClient::new(&ClientConfig::new("http://localhost:4111"))?;
//! let agents = client.list_agents().await;
//! let reply = client.generate(&agents[0].id, &[Message::user("Hello!")]).await?;
//! ```

mod agent;
mod executor;
mod stream;
mod transport;
mod types;

pub use agent::{AgentClient, SnapshotStream};
pub use executor::{RequestExecutor, RequestOptions, RetryPolicy};
pub use stream::{paced_snapshots, StreamHandler, WordSnapshots};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{Agent, AgentResponse, FunctionCall, Message, Role, ToolCall, Usage};

#[cfg(test)]
pub(crate) use transport::{Outcome, ScriptedTransport};
