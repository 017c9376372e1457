//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Storage Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders ◄──┬── order_items   (ON DELETE CASCADE)                        │
//! │            │                                                            │
//! │  An order row is inserted before its items and rewritten after they    │
//! │  are, so the stored totals are always the recomputed ones.            │
//! │  Deleting the last item deletes the order (ledger service).           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use depot_core::{Order, OrderItem, ReceiptMode};

/// Repository for order reads.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        fetch_order(&self.pool, id).await
    }

    /// Gets all items of an order, oldest first.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        fetch_items(&self.pool, order_id).await
    }

    pub async fn get_item(&self, id: &str) -> DbResult<Option<OrderItem>> {
        fetch_item(&self.pool, id).await
    }
}

// =============================================================================
// Orders
// =============================================================================

pub async fn fetch_order<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT
            id, customer_id, status, receipt, receipt_id,
            sub_total, vat, total_amount,
            payment_status, paid_amount, unpaid_amount, item_pending,
            created_by, created_by_email, created_by_role,
            order_date, updated_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(order)
}

/// Number of stored orders with the given receipt mode.
pub async fn count_by_receipt<'e, E: SqliteExecutor<'e>>(
    exec: E,
    receipt: ReceiptMode,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE receipt = ?1")
        .bind(receipt)
        .fetch_one(exec)
        .await?;

    Ok(count)
}

pub async fn insert_order<'e, E: SqliteExecutor<'e>>(exec: E, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, receipt_id = ?order.receipt_id, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, customer_id, status, receipt, receipt_id,
            sub_total, vat, total_amount,
            payment_status, paid_amount, unpaid_amount, item_pending,
            created_by, created_by_email, created_by_role,
            order_date, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8,
            ?9, ?10, ?11, ?12,
            ?13, ?14, ?15,
            ?16, ?17
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.customer_id)
    .bind(order.status)
    .bind(order.receipt)
    .bind(&order.receipt_id)
    .bind(order.sub_total)
    .bind(order.vat)
    .bind(order.total_amount)
    .bind(order.payment_status)
    .bind(order.paid_amount)
    .bind(order.unpaid_amount)
    .bind(order.item_pending)
    .bind(&order.created_by)
    .bind(&order.created_by_email)
    .bind(order.created_by_role)
    .bind(order.order_date)
    .bind(order.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Rewrites the mutable columns of an order.
pub async fn update_order<'e, E: SqliteExecutor<'e>>(exec: E, order: &Order) -> DbResult<()> {
    debug!(
        id = %order.id,
        status = %order.status,
        total = %order.total_amount,
        payment_status = %order.payment_status,
        "Updating order"
    );

    sqlx::query(
        r#"
        UPDATE orders
        SET customer_id = ?1, status = ?2,
            sub_total = ?3, vat = ?4, total_amount = ?5,
            payment_status = ?6, paid_amount = ?7, unpaid_amount = ?8,
            item_pending = ?9, updated_at = ?10
        WHERE id = ?11
        "#,
    )
    .bind(&order.customer_id)
    .bind(order.status)
    .bind(order.sub_total)
    .bind(order.vat)
    .bind(order.total_amount)
    .bind(order.payment_status)
    .bind(order.paid_amount)
    .bind(order.unpaid_amount)
    .bind(order.item_pending)
    .bind(order.updated_at)
    .bind(&order.id)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn delete_order<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting order");

    sqlx::query("DELETE FROM orders WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(())
}

// =============================================================================
// Order Items
// =============================================================================

pub async fn fetch_items<'e, E: SqliteExecutor<'e>>(exec: E, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT
            id, order_id, product_id, product_name, unit, quantity, package,
            unit_price, price, cost, item_receipt, status, created_at, updated_at
        FROM order_items
        WHERE order_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(order_id)
    .fetch_all(exec)
    .await?;

    Ok(items)
}

pub async fn fetch_item<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<Option<OrderItem>> {
    let item = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT
            id, order_id, product_id, product_name, unit, quantity, package,
            unit_price, price, cost, item_receipt, status, created_at, updated_at
        FROM order_items
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await?;

    Ok(item)
}

pub async fn insert_item<'e, E: SqliteExecutor<'e>>(exec: E, item: &OrderItem) -> DbResult<()> {
    debug!(
        id = %item.id,
        order_id = %item.order_id,
        quantity = item.quantity,
        package = ?item.package,
        "Inserting order item"
    );

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, product_name, unit, quantity, package,
            unit_price, price, cost, item_receipt, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(&item.unit)
    .bind(item.quantity)
    .bind(item.package)
    .bind(item.unit_price)
    .bind(item.price)
    .bind(item.cost)
    .bind(item.item_receipt)
    .bind(item.status)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn update_item<'e, E: SqliteExecutor<'e>>(exec: E, item: &OrderItem) -> DbResult<()> {
    debug!(id = %item.id, status = %item.status, quantity = item.quantity, "Updating order item");

    sqlx::query(
        r#"
        UPDATE order_items
        SET quantity = ?1, package = ?2, unit_price = ?3, price = ?4, cost = ?5,
            status = ?6, updated_at = ?7
        WHERE id = ?8
        "#,
    )
    .bind(item.quantity)
    .bind(item.package)
    .bind(item.unit_price)
    .bind(item.price)
    .bind(item.cost)
    .bind(item.status)
    .bind(item.updated_at)
    .bind(&item.id)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn delete_item<'e, E: SqliteExecutor<'e>>(exec: E, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting order item");

    sqlx::query("DELETE FROM order_items WHERE id = ?1")
        .bind(id)
        .execute(exec)
        .await?;

    Ok(())
}
