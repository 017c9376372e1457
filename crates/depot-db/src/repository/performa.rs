//! # Performa Repository
//!
//! Performa customers, performas and performa lines. Deleting a performa
//! removes its lines through `ON DELETE CASCADE`.

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use depot_core::{PerformaCustomer, PerformaPerforma, PerformaProduct};

/// Repository for performa reads.
#[derive(Debug, Clone)]
pub struct PerformaRepository {
    pool: SqlitePool,
}

impl PerformaRepository {
    /// Creates a new PerformaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PerformaRepository { pool }
    }

    pub async fn get_customer(&self, id: &str) -> DbResult<Option<PerformaCustomer>> {
        fetch_customer(&self.pool, id).await
    }

    pub async fn get_performas(&self, customer_id: &str) -> DbResult<Vec<PerformaPerforma>> {
        fetch_performas(&self.pool, customer_id).await
    }

    pub async fn get_lines(&self, performa_id: &str) -> DbResult<Vec<PerformaProduct>> {
        fetch_lines(&self.pool, performa_id).await
    }
}

// =============================================================================
// Customer Level
// =============================================================================

pub async fn fetch_customer<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
) -> DbResult<Option<PerformaCustomer>> {
    let customer = sqlx::query_as::<_, PerformaCustomer>(
        r#"
        SELECT id, customer_id, customer_name, total_amount, created_by, created_at, updated_at
        FROM performa_customers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(customer)
}

pub async fn insert_customer<'e, E: SqliteExecutor<'e>>(
    exec: E,
    customer: &PerformaCustomer,
) -> DbResult<()> {
    debug!(id = %customer.id, customer = ?customer.customer_name, "Inserting performa customer");

    sqlx::query(
        r#"
        INSERT INTO performa_customers (
            id, customer_id, customer_name, total_amount, created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.customer_id)
    .bind(&customer.customer_name)
    .bind(customer.total_amount)
    .bind(&customer.created_by)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn update_customer_total<'e, E: SqliteExecutor<'e>>(
    exec: E,
    customer: &PerformaCustomer,
) -> DbResult<()> {
    debug!(id = %customer.id, total = %customer.total_amount, "Updating performa customer");

    sqlx::query("UPDATE performa_customers SET total_amount = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(customer.total_amount)
        .bind(customer.updated_at)
        .bind(&customer.id)
        .execute(exec)
        .await?;

    Ok(())
}

// =============================================================================
// Performas
// =============================================================================

pub async fn fetch_performas<'e, E: SqliteExecutor<'e>>(
    exec: E,
    customer_id: &str,
) -> DbResult<Vec<PerformaPerforma>> {
    let performas = sqlx::query_as::<_, PerformaPerforma>(
        r#"
        SELECT
            id, customer_level_id, customer_name, receipt,
            sub_total, vat, total, created_by, issued_date, updated_at
        FROM performa_performas
        WHERE customer_level_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(customer_id)
    .fetch_all(exec)
    .await?;

    Ok(performas)
}

pub async fn insert_performa<'e, E: SqliteExecutor<'e>>(
    exec: E,
    performa: &PerformaPerforma,
) -> DbResult<()> {
    debug!(id = %performa.id, total = %performa.total, "Inserting performa");

    sqlx::query(
        r#"
        INSERT INTO performa_performas (
            id, customer_level_id, customer_name, receipt,
            sub_total, vat, total, created_by, issued_date, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&performa.id)
    .bind(&performa.customer_level_id)
    .bind(&performa.customer_name)
    .bind(performa.receipt)
    .bind(performa.sub_total)
    .bind(performa.vat)
    .bind(performa.total)
    .bind(&performa.created_by)
    .bind(performa.issued_date)
    .bind(performa.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn update_performa<'e, E: SqliteExecutor<'e>>(
    exec: E,
    performa: &PerformaPerforma,
) -> DbResult<()> {
    debug!(id = %performa.id, total = %performa.total, "Updating performa");

    sqlx::query(
        r#"
        UPDATE performa_performas
        SET receipt = ?1, sub_total = ?2, vat = ?3, total = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(performa.receipt)
    .bind(performa.sub_total)
    .bind(performa.vat)
    .bind(performa.total)
    .bind(performa.updated_at)
    .bind(&performa.id)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn delete_performa<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting performa");

    sqlx::query("DELETE FROM performa_performas WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(())
}

// =============================================================================
// Lines
// =============================================================================

pub async fn fetch_lines<'e, E: SqliteExecutor<'e>>(
    exec: E,
    performa_id: &str,
) -> DbResult<Vec<PerformaProduct>> {
    let lines = sqlx::query_as::<_, PerformaProduct>(
        r#"
        SELECT id, performa_id, product, unit, description, quantity, unit_price, total_price
        FROM performa_products
        WHERE performa_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(performa_id)
    .fetch_all(exec)
    .await?;

    Ok(lines)
}

pub async fn insert_line<'e, E: SqliteExecutor<'e>>(exec: E, line: &PerformaProduct) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO performa_products (
            id, performa_id, product, unit, description, quantity, unit_price, total_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&line.id)
    .bind(&line.performa_id)
    .bind(&line.product)
    .bind(&line.unit)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.total_price)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn update_line<'e, E: SqliteExecutor<'e>>(exec: E, line: &PerformaProduct) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE performa_products
        SET product = ?1, unit = ?2, description = ?3, quantity = ?4,
            unit_price = ?5, total_price = ?6
        WHERE id = ?7
        "#,
    )
    .bind(&line.product)
    .bind(&line.unit)
    .bind(&line.description)
    .bind(line.quantity)
    .bind(line.unit_price)
    .bind(line.total_price)
    .bind(&line.id)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn delete_line<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM performa_products WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(())
}
