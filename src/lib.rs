//! TaskWing - AI-native project memory and planning for coding assistants
//!
//! A Rust implementation of:
//! - A content-addressed project memory store (nodes, edges, embeddings)
//!   over SQLite, with a derived JSON index and a markdown mirror.
//! - A staged planning pipeline (Clarify -> Decompose -> Expand -> Finalize)
//!   driven by a pluggable LLM provider abstraction.
//! - A line-delimited JSON-RPC 2.0 MCP server over stdio, exposing the
//!   above to AI coding assistants.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod mcp;
pub mod services;

pub use domain::error::{TaskWingError, TaskWingResult};
