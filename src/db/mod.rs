mod models;
mod seeders;

pub use models::*;
pub use seeders::ensure_admin_profile;

use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("opsdesk.db");
    info!("Initializing database at {}", db_path.display());

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Open a private in-memory database with the full schema applied.
///
/// Every connection to `sqlite::memory:` is a separate database, so the pool
/// is pinned to a single connection that never expires.
pub async fn init_memory() -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: Profiles and sessions
    if !table_exists(pool, "profiles").await? {
        execute_sql(pool, include_str!("../../migrations/001_profiles.sql")).await?;
    }

    // Migration 002: Customers, team, work orders, schedule
    if !table_exists(pool, "work_orders").await? {
        execute_sql(pool, include_str!("../../migrations/002_operations.sql")).await?;
    }

    // Migration 003: Quality standards and checks
    if !table_exists(pool, "quality_checks").await? {
        execute_sql(pool, include_str!("../../migrations/003_quality.sql")).await?;
    }

    // Migration 004: Inventory and financial ledger
    if !table_exists(pool, "financial_transactions").await? {
        execute_sql(pool, include_str!("../../migrations/004_inventory_finance.sql")).await?;
    }

    // Migration 005: In-app notifications
    if !table_exists(pool, "notifications").await? {
        execute_sql(pool, include_str!("../../migrations/005_notifications.sql")).await?;
    }

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_all_tables() {
        let pool = init_memory().await.unwrap();
        for table in [
            "profiles",
            "sessions",
            "customers",
            "team_members",
            "work_orders",
            "schedule_items",
            "quality_standards",
            "quality_checks",
            "quality_check_standards",
            "inventory_items",
            "financial_transactions",
            "notifications",
        ] {
            assert!(table_exists(&pool, table).await.unwrap(), "missing {}", table);
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
    }
}
