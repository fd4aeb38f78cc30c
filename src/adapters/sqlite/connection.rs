//! SQLite connection pool manager.
//!
//! WAL mode for concurrent readers with a single writer, matching the
//! "single writer per process, concurrent readers" resource policy in
//! SPEC_FULL.md §5.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};

use crate::adapters::sqlite::migrations::Migrator;
use crate::domain::error::{TaskWingError, TaskWingResult};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open (creating if missing) the SQLite database at `database_url`
    /// (e.g. `sqlite:.taskwing/memory/memory.db`).
    pub async fn connect(database_url: &str) -> TaskWingResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| TaskWingError::Fatal(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| TaskWingError::Fatal(format!("failed to connect to database: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> TaskWingResult<usize> {
        Migrator::new(self.pool.clone())
            .migrate()
            .await
            .map_err(|e| TaskWingError::Fatal(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
