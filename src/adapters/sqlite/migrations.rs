//! Forward-only, idempotent SQLite migrations.

use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to execute migration {version}: {source}")]
    Execution {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to read schema version: {0}")]
    VersionCheck(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema",
            sql: include_str!("../../../migrations/001_initial_schema.sql"),
        },
        Migration {
            version: 2,
            description: "Circuit breaker counters",
            sql: include_str!("../../../migrations/002_circuit_breaker_counters.sql"),
        },
        Migration {
            version: 3,
            description: "Clarify session phases",
            sql: include_str!("../../../migrations/003_clarify_session_phases.sql"),
        },
        Migration {
            version: 4,
            description: "Node embedding recency",
            sql: include_str!("../../../migrations/004_node_embedding_recency.sql"),
        },
    ]
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bring the schema to the current version. Re-running after the
    /// current version is already applied is a no-op.
    pub async fn migrate(&self) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current = self.current_version().await?;
        let pending: Vec<_> = all_embedded_migrations()
            .into_iter()
            .filter(|m| m.version > current)
            .collect();

        for migration in &pending {
            self.apply(migration).await?;
        }
        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::Execution { version: 0, source: e })?;
        Ok(())
    }

    pub async fn current_version(&self) -> Result<i64, MigrationError> {
        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(MigrationError::VersionCheck)?;
        Ok(row.0)
    }

    async fn apply(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::Execution {
                version: migration.version,
                source: e,
            })?;

        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::Execution {
                version: migration.version,
                source: e,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let migrator = Migrator::new(pool);
        let applied_first = migrator.migrate().await.unwrap();
        assert!(applied_first > 0);
        let applied_second = migrator.migrate().await.unwrap();
        assert_eq!(applied_second, 0);
    }
}
