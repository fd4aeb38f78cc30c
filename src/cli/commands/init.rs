//! `taskwing init` — create the `.taskwing/` project layout and an empty,
//! migrated database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::DatabaseConnection;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::config::Config;

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub already_initialized: bool,
    pub database_path: String,
    pub directories_created: Vec<String>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        if self.already_initialized {
            return "Project memory already initialized.".to_string();
        }
        let mut lines = vec!["Project memory initialized.".to_string()];
        for dir in &self.directories_created {
            lines.push(format!("  created {dir}"));
        }
        lines.push(format!("  database at {}", self.database_path));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(force: bool, json_mode: bool) -> Result<()> {
    let config = Config::default();
    let root = PathBuf::from(".taskwing");

    if root.exists() && !force {
        output(
            &InitOutput {
                already_initialized: true,
                database_path: config.database.path.clone(),
                directories_created: vec![],
            },
            json_mode,
        );
        return Ok(());
    }

    let dirs = [root.join("memory"), root.join("plans"), root.join("policies")];
    let mut directories_created = Vec::new();
    for dir in &dirs {
        if !dir.exists() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
            directories_created.push(dir.display().to_string());
        }
    }

    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::connect(&database_url)
        .await
        .context("failed to initialize database")?;
    db.migrate().await.context("failed to run migrations")?;

    output(
        &InitOutput {
            already_initialized: false,
            database_path: config.database.path,
            directories_created,
        },
        json_mode,
    );
    Ok(())
}
