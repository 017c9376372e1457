//! # Purchase Repository
//!
//! Supplier purchase records, their expenses and expense lines.

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use depot_core::{PurchaseExpense, PurchaseProduct, PurchaseSupplier};

/// Repository for purchase reads.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<PurchaseSupplier>> {
        fetch_supplier(&self.pool, id).await
    }

    pub async fn get_expense(&self, id: &str) -> DbResult<Option<PurchaseExpense>> {
        fetch_expense(&self.pool, id).await
    }

    pub async fn get_expenses(&self, supplier_id: &str) -> DbResult<Vec<PurchaseExpense>> {
        fetch_expenses(&self.pool, supplier_id).await
    }

    pub async fn get_lines(&self, expense_id: &str) -> DbResult<Vec<PurchaseProduct>> {
        fetch_lines(&self.pool, expense_id).await
    }
}

// =============================================================================
// Supplier Level
// =============================================================================

pub async fn fetch_supplier<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
) -> DbResult<Option<PurchaseSupplier>> {
    let supplier = sqlx::query_as::<_, PurchaseSupplier>(
        r#"
        SELECT
            id, supplier_id, supplier_name, total_amount,
            payment_status, paid_amount, unpaid_amount,
            created_by, created_at, updated_at
        FROM purchase_suppliers
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(supplier)
}

pub async fn insert_supplier<'e, E: SqliteExecutor<'e>>(
    exec: E,
    supplier: &PurchaseSupplier,
) -> DbResult<()> {
    debug!(id = %supplier.id, supplier = ?supplier.supplier_name, "Inserting purchase supplier");

    sqlx::query(
        r#"
        INSERT INTO purchase_suppliers (
            id, supplier_id, supplier_name, total_amount,
            payment_status, paid_amount, unpaid_amount,
            created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&supplier.id)
    .bind(&supplier.supplier_id)
    .bind(&supplier.supplier_name)
    .bind(supplier.total_amount)
    .bind(supplier.payment_status)
    .bind(supplier.paid_amount)
    .bind(supplier.unpaid_amount)
    .bind(&supplier.created_by)
    .bind(supplier.created_at)
    .bind(supplier.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn update_supplier<'e, E: SqliteExecutor<'e>>(
    exec: E,
    supplier: &PurchaseSupplier,
) -> DbResult<()> {
    debug!(
        id = %supplier.id,
        total = %supplier.total_amount,
        payment_status = %supplier.payment_status,
        "Updating purchase supplier"
    );

    sqlx::query(
        r#"
        UPDATE purchase_suppliers
        SET total_amount = ?1, payment_status = ?2, paid_amount = ?3,
            unpaid_amount = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(supplier.total_amount)
    .bind(supplier.payment_status)
    .bind(supplier.paid_amount)
    .bind(supplier.unpaid_amount)
    .bind(supplier.updated_at)
    .bind(&supplier.id)
    .execute(exec)
    .await?;

    Ok(())
}

// =============================================================================
// Expenses
// =============================================================================

pub async fn fetch_expense<'e, E: SqliteExecutor<'e>>(
    exec: E,
    id: &str,
) -> DbResult<Option<PurchaseExpense>> {
    let expense = sqlx::query_as::<_, PurchaseExpense>(
        r#"
        SELECT
            id, supplier_level_id, supplier_name, total,
            payment_status, paid_amount, unpaid_amount,
            created_by, purchase_date, updated_at
        FROM purchase_expenses
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(expense)
}

pub async fn fetch_expenses<'e, E: SqliteExecutor<'e>>(
    exec: E,
    supplier_id: &str,
) -> DbResult<Vec<PurchaseExpense>> {
    let expenses = sqlx::query_as::<_, PurchaseExpense>(
        r#"
        SELECT
            id, supplier_level_id, supplier_name, total,
            payment_status, paid_amount, unpaid_amount,
            created_by, purchase_date, updated_at
        FROM purchase_expenses
        WHERE supplier_level_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(supplier_id)
    .fetch_all(exec)
    .await?;

    Ok(expenses)
}

pub async fn insert_expense<'e, E: SqliteExecutor<'e>>(
    exec: E,
    expense: &PurchaseExpense,
) -> DbResult<()> {
    debug!(
        id = %expense.id,
        supplier_level_id = %expense.supplier_level_id,
        total = %expense.total,
        "Inserting purchase expense"
    );

    sqlx::query(
        r#"
        INSERT INTO purchase_expenses (
            id, supplier_level_id, supplier_name, total,
            payment_status, paid_amount, unpaid_amount,
            created_by, purchase_date, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&expense.id)
    .bind(&expense.supplier_level_id)
    .bind(&expense.supplier_name)
    .bind(expense.total)
    .bind(expense.payment_status)
    .bind(expense.paid_amount)
    .bind(expense.unpaid_amount)
    .bind(&expense.created_by)
    .bind(expense.purchase_date)
    .bind(expense.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn update_expense<'e, E: SqliteExecutor<'e>>(
    exec: E,
    expense: &PurchaseExpense,
) -> DbResult<()> {
    debug!(
        id = %expense.id,
        total = %expense.total,
        payment_status = %expense.payment_status,
        "Updating purchase expense"
    );

    sqlx::query(
        r#"
        UPDATE purchase_expenses
        SET total = ?1, payment_status = ?2, paid_amount = ?3,
            unpaid_amount = ?4, updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(expense.total)
    .bind(expense.payment_status)
    .bind(expense.paid_amount)
    .bind(expense.unpaid_amount)
    .bind(expense.updated_at)
    .bind(&expense.id)
    .execute(exec)
    .await?;

    Ok(())
}

// =============================================================================
// Lines
// =============================================================================

pub async fn fetch_lines<'e, E: SqliteExecutor<'e>>(
    exec: E,
    expense_id: &str,
) -> DbResult<Vec<PurchaseProduct>> {
    let lines = sqlx::query_as::<_, PurchaseProduct>(
        r#"
        SELECT id, expense_id, product, unit, description, quantity, unit_price, total_price
        FROM purchase_products
        WHERE expense_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(expense_id)
    .fetch_all(exec)
    .await?;

    Ok(lines)
}

pub async fn insert_line<'e, E: SqliteExecutor<'e>>(exec: E, line: &PurchaseProduct) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO purchase_products (
            id, expense_id, product, unit, description, quantity, unit_price, total_price
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&line.id)
    .bind(&line.expense_id)
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

pub async fn update_line<'e, E: SqliteExecutor<'e>>(exec: E, line: &PurchaseProduct) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE purchase_products
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
