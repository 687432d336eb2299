//! mastra-chat - chat with agents on a Mastra server
//!
//! This library provides a retrying client for the agent server API,
//! word-by-word streaming of complete replies, and the chat session used by
//! the `mastra-chat` binary.

pub mod adapters;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod ui;

pub use error::{Error, Result};
