//! Migrations apply cleanly to an empty database and are idempotent on a
//! second run: forward-only, idempotent schema migrations.

use sqlx::Row;

use taskwing::adapters::sqlite::migrations::Migrator;

#[tokio::test]
async fn migrations_apply_cleanly_and_rerun_is_a_no_op() {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let migrator = Migrator::new(pool.clone());

    let applied = migrator.migrate().await.unwrap();
    assert_eq!(applied, 4, "all four embedded migrations should apply to an empty db");

    let again = migrator.migrate().await.unwrap();
    assert_eq!(again, 0, "rerunning migrate on an already-current db is a no-op");

    for table in ["nodes", "edges", "plans", "tasks", "clarify_sessions", "schema_migrations"] {
        let row = sqlx::query(&format!("SELECT name FROM sqlite_master WHERE type='table' AND name='{table}'"))
            .fetch_optional(&pool)
            .await
            .unwrap();
        assert!(row.is_some(), "table {table} should exist after migration");
    }

    let version: i64 = sqlx::query("SELECT MAX(version) as v FROM schema_migrations")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("v");
    assert_eq!(version, 4);
}
