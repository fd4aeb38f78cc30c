//! Shared integration-test scaffolding: an in-memory migrated store and a
//! scripted `ChatProvider`, following the pattern established in
//! `services::bootstrap_orchestrator`'s own unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use taskwing::adapters::sqlite::migrations::Migrator;
use taskwing::adapters::sqlite::SqliteMemoryStore;
use taskwing::domain::error::TaskWingResult;
use taskwing::domain::ports::llm_provider::{ChatOptions, ChatProvider, EmbedOptions};
use taskwing::domain::ports::memory_store::MemoryStore;

#[allow(dead_code)]
pub async fn test_store() -> (Arc<dyn MemoryStore>, TempDir) {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    Migrator::new(pool.clone()).migrate().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    (Arc::new(SqliteMemoryStore::new(pool, dir.path())), dir)
}

/// A `ChatProvider` that replays canned JSON responses in order, falling
/// back to `default_response` once the script is exhausted.
pub struct ScriptedProvider {
    responses: Mutex<Vec<String>>,
    default_response: String,
    calls: AtomicUsize,
    embeds: Mutex<Vec<Vec<f32>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            default_response: "{}".to_string(),
            calls: AtomicUsize::new(0),
            embeds: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, _system: &str, _user: &str, _opts: &ChatOptions) -> TaskWingResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn supports_embed(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, _opts: &EmbedOptions) -> TaskWingResult<Vec<f32>> {
        let mut embeds = self.embeds.lock().unwrap();
        if let Some(vector) = embeds.pop() {
            return Ok(vector);
        }
        // Deterministic fallback: a 4-dim embedding derived from text length
        // so repeated calls with different text don't collide.
        let n = text.len() as f32;
        Ok(vec![n, n / 2.0, n / 3.0, 1.0])
    }
}
