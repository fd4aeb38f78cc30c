//! `taskwing serve` — build the adapter/service graph and run the MCP
//! stdio server: connect, migrate, build the store and services, hand off
//! to the server loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::llm::build_provider;
use crate::adapters::sqlite::{DatabaseConnection, SqliteMemoryStore};
use crate::domain::models::config::Config;
use crate::domain::ports::llm_provider::ChatProvider;
use crate::mcp::{McpServer, ToolContext};
use crate::services::hybrid_search::HybridSearcher;
use crate::services::planning_pipeline::PlanningPipeline;
use crate::services::session_state::{SessionStateConfig, SessionStateService};

pub async fn execute(config: Config) -> Result<()> {
    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::connect(&database_url)
        .await
        .context("failed to connect to the project database")?;
    db.migrate().await.context("failed to run migrations")?;

    let memory_root = PathBuf::from(&config.database.path)
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".taskwing/memory"));
    let store = Arc::new(SqliteMemoryStore::new(db.pool().clone(), memory_root));

    let provider: Arc<dyn ChatProvider> = match config.llm.provider {
        Some(provider) => build_provider(provider, &config.llm)?,
        None => build_provider(crate::domain::models::config::Provider::LocalD, &config.llm)?,
    };

    let embedder = provider.supports_embed().then(|| provider.clone());
    let searcher = Arc::new(HybridSearcher::new(store.clone(), embedder, Some(provider.clone())));
    let pipeline = Arc::new(PlanningPipeline::new(store.clone(), provider.clone(), config.clarify_max_rounds));
    let session_state = Arc::new(SessionStateService::new(SessionStateConfig {
        consecutive_start_threshold: config.circuit_breaker_threshold,
    }));

    let context = Arc::new(ToolContext {
        store,
        searcher,
        pipeline,
        session_state,
        provider,
        plans_root: PathBuf::from(".taskwing/plans"),
    });

    McpServer::new(context).run().await
}
