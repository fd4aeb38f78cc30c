//! `taskwing bootstrap` — one-shot scan of the current repository into an
//! empty project memory: connect, build services, run a single
//! `BootstrapOrchestrator` pass, print a report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::watch;

use crate::adapters::llm::build_provider;
use crate::adapters::sqlite::{DatabaseConnection, SqliteMemoryStore};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::config::Config;
use crate::services::agent_kernel::AgentInput;
use crate::services::bootstrap_orchestrator::{default_agent_count, BootstrapOrchestrator, BootstrapReport};

#[derive(Debug, Serialize)]
struct BootstrapOutput {
    nodes_created: usize,
    features: usize,
    patterns: usize,
    decisions: usize,
    constraints: usize,
    cancelled: bool,
}

impl From<BootstrapReport> for BootstrapOutput {
    fn from(report: BootstrapReport) -> Self {
        Self {
            nodes_created: report.nodes_created,
            features: report.features,
            patterns: report.patterns,
            decisions: report.decisions,
            constraints: report.constraints,
            cancelled: report.cancelled,
        }
    }
}

impl CommandOutput for BootstrapOutput {
    fn to_human(&self) -> String {
        format!(
            "Bootstrap complete: {} node(s) created ({} features, {} patterns, {} decisions, {} constraints){}",
            self.nodes_created,
            self.features,
            self.patterns,
            self.decisions,
            self.constraints,
            if self.cancelled { " [cancelled]" } else { "" },
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(config: Config, goal: String, json_mode: bool) -> Result<()> {
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

    let provider = match config.llm.provider {
        Some(provider) => build_provider(provider, &config.llm)?,
        None => build_provider(crate::domain::models::config::Provider::LocalD, &config.llm)?,
    };

    let orchestrator = BootstrapOrchestrator::new(store, provider, default_agent_count());
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let input = AgentInput {
        goal,
        context: None,
        history: Vec::new(),
    };

    let report = orchestrator.run(input, cancel_rx, None).await?;
    output(&BootstrapOutput::from(report), json_mode);
    Ok(())
}
