//! Ports: traits implemented by `adapters` and consumed by `services`.

pub mod llm_provider;
pub mod memory_store;

pub use llm_provider::{ChatOptions, ChatProvider, EmbedOptions};
pub use memory_store::{EmbeddingStats, IntegrityIssue, IntegrityIssueKind, MemoryStore, NodeFilter};
