//! Adapters module — front-ends for a [`ChatSession`](crate::chat::ChatSession).
//!
//! - **CLI** — Interactive command line interface

pub mod cli;
