//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary and
//! applied by [`Database::new`](crate::Database::new).
//!
//! ```text
//! 001_initial_schema.sql
//!   categories, suppliers, customers, products (version column for CAS)
//!   orders ──< order_items
//!   purchase_suppliers ──< purchase_expenses ──< purchase_products
//!   performa_customers ──< performa_performas ──< performa_products
//!   payment_logs (append-only: UPDATE and DELETE raise), order_logs
//! ```
//!
//! Applied files are tracked in `_sqlx_migrations`. Schema changes go into a
//! new `NNN_description.sql`; an applied file is never edited.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration not yet recorded. Each file runs in its
/// own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying pending migrations");
    MIGRATOR.run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

/// `(embedded, applied)` migration counts. An unmigrated database has no
/// `_sqlx_migrations` table and reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let embedded = MIGRATOR.migrations.len();

    let has_table: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !has_table {
        return Ok((embedded, 0));
    }

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;
    Ok((embedded, applied as usize))
}
