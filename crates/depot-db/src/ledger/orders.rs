//! # Order Operations
//!
//! Orders and their items: creation, order-level updates (cancel, payment,
//! item set replacement), single item updates and item deletion.
//!
//! ## Write Order Inside One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. read order, items, products (through the tx connection)            │
//! │  2. depot-core: create_item / update_item / cancel_order               │
//! │  3. ProductCache::flush        version-checked stock writes            │
//! │  4. item rows                                                          │
//! │  5. recompute_totals → payment status/delta → refresh_item_pending     │
//! │  6. order row                                                          │
//! │  7. payment log (creation or diff), order action log                   │
//! │                                                                         │
//! │  Any error in 2-7 rolls everything back; no product is left            │
//! │  partially decremented.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{
    append_payment_changes, customer_label, require_order, Committed, Ledger, ProductCache,
    TxContext,
};
use crate::error::{DbError, DbResult};
use crate::repository::{log, order as orders};
use depot_core::audit::{OrderLog, PaymentSnapshot};
use depot_core::item::{create_item, update_item, ItemOutcome};
use depot_core::order::{cancel_order, receipt_id, recompute_totals, refresh_item_pending};
use depot_core::policy::{Action, Decision, EntityKind};
use depot_core::request::{CreateOrder, ItemChanges, NewOrderItem, UpdateOrder};
use depot_core::settlement::{apply_paid_delta, set_status, settle};
use depot_core::validation::validate_order_items;
use depot_core::{
    Actor, CoreError, LogSubject, Money, Order, OrderAction, OrderItem, OrderLogEntry, OrderStatus,
    PaymentLogEntry, PaymentStatus, ReceiptMode, ValidationError,
};

const MODEL_ORDER: &str = "Order";
const MODEL_ITEM: &str = "OrderItem";

/// Result of deleting an order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDeletion {
    /// The item was the last one and took the order with it.
    pub order_deleted: bool,

    /// The recomputed order, unless it was deleted.
    pub order: Option<Order>,
}

impl Ledger {
    /// Creates an order and its items in one transaction.
    ///
    /// ## Errors
    /// - `Validation` for an empty or oversized item list
    /// - `InsufficientStock` / `InsufficientPackage` / `StockUnavailable`
    ///   for any item; the whole order is rolled back
    /// - `PaidAmountOutOfRange` for a Pending order paid beyond its total
    pub async fn create_order(&self, actor: &Actor, request: CreateOrder) -> DbResult<Order> {
        validate_order_items(request.items.len())?;
        let ctx = self.context(actor);

        let order = self
            .run("create_order", move |conn| {
                let ctx = ctx.clone();
                let request = request.clone();
                Box::pin(async move { create_order_tx(conn, &ctx, &request).await })
            })
            .await?;

        info!(
            id = %order.id,
            receipt_id = ?order.receipt_id,
            total = %order.total_amount,
            payment_status = %order.payment_status,
            "Order created"
        );
        Ok(order)
    }

    /// Updates an order.
    ///
    /// A cancellation takes precedence over everything else in the
    /// request. When `items` is present it replaces the item set: omitted
    /// items are deleted without restocking, entries with an id update that
    /// item, entries without one create a new item.
    ///
    /// ## Errors
    /// - `AlreadyCancelled` for a cancelled order
    /// - `UnauthorizedCancellation` after committing a cancellation request
    /// - `UnknownChild` for an item id from another order
    pub async fn update_order(
        &self,
        actor: &Actor,
        order_id: &str,
        request: UpdateOrder,
    ) -> DbResult<Order> {
        let ctx = self.context(actor);
        let order_id = order_id.to_string();

        let committed = self
            .run("update_order", move |conn| {
                let ctx = ctx.clone();
                let order_id = order_id.clone();
                let request = request.clone();
                Box::pin(async move { update_order_tx(conn, &ctx, &order_id, &request).await })
            })
            .await?;

        committed.finish().map(|order| {
            info!(
                id = %order.id,
                status = %order.status,
                total = %order.total_amount,
                payment_status = %order.payment_status,
                "Order updated"
            );
            order
        })
    }

    /// Updates one order item and recomputes its order.
    pub async fn update_order_item(
        &self,
        actor: &Actor,
        item_id: &str,
        changes: ItemChanges,
    ) -> DbResult<OrderItem> {
        let ctx = self.context(actor);
        let item_id = item_id.to_string();

        let committed = self
            .run("update_order_item", move |conn| {
                let ctx = ctx.clone();
                let item_id = item_id.clone();
                let changes = changes.clone();
                Box::pin(async move { update_item_tx(conn, &ctx, &item_id, &changes).await })
            })
            .await?;

        committed.finish().map(|item| {
            info!(id = %item.id, status = %item.status, quantity = item.quantity, "Order item updated");
            item
        })
    }

    /// Deletes an order item. Stock is not returned to the product; the
    /// order is deleted with its last item.
    pub async fn delete_order_item(&self, actor: &Actor, item_id: &str) -> DbResult<ItemDeletion> {
        let ctx = self.context(actor);
        let item_id = item_id.to_string();

        let deletion = self
            .run("delete_order_item", move |conn| {
                let ctx = ctx.clone();
                let item_id = item_id.clone();
                Box::pin(async move { delete_item_tx(conn, &ctx, &item_id).await })
            })
            .await?;

        info!(order_deleted = deletion.order_deleted, "Order item deleted");
        Ok(deletion)
    }

    pub async fn get_order(&self, id: &str) -> DbResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    pub async fn get_order_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        self.db.orders().get_items(order_id).await
    }

    pub async fn get_order_item(&self, id: &str) -> DbResult<OrderItem> {
        self.db
            .orders()
            .get_item(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order item", id))
    }

    /// Action history of an order or order item, newest first.
    pub async fn get_order_log(&self, object_id: &str) -> DbResult<Vec<OrderLogEntry>> {
        self.db.logs().order_history(object_id).await
    }

    /// Payment history of an order, newest first.
    pub async fn get_order_payment_log(&self, order_id: &str) -> DbResult<Vec<PaymentLogEntry>> {
        self.db.logs().payment_history(LogSubject::Order, order_id).await
    }
}

// =============================================================================
// Transactions
// =============================================================================

async fn create_order_tx(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    request: &CreateOrder,
) -> DbResult<Order> {
    let receipt_id = if request.receipt.is_receipt() {
        let existing = orders::count_by_receipt(&mut *conn, ReceiptMode::Receipt).await?;
        Some(receipt_id(existing))
    } else {
        None
    };
    let party = customer_label(conn, request.customer_id.as_deref()).await?;

    let mut order = Order::new(
        &ctx.actor,
        request.customer_id.clone(),
        request.receipt,
        request.payment_status,
        receipt_id,
    );
    orders::insert_order(&mut *conn, &order).await?;

    let mut cache = ProductCache::default();
    let mut items = Vec::with_capacity(request.items.len());
    for line in &request.items {
        let product = cache.require(conn, &line.product_id).await?;
        items.push(create_item(&order, product, line)?);
    }
    cache.flush(conn).await?;
    for item in &items {
        orders::insert_item(&mut *conn, item).await?;
    }

    recompute_totals(&mut order, &items, ctx.rate);
    if order.payment_status == PaymentStatus::Pending {
        let paid = request.paid_amount;
        if paid.is_negative() || paid > order.total_amount {
            return Err(CoreError::PaidAmountOutOfRange {
                paid,
                total: order.total_amount,
            }
            .into());
        }
        order.paid_amount = paid;
        settle(&mut order);
    }
    refresh_item_pending(&mut order, &items);
    orders::update_order(&mut *conn, &order).await?;

    let created = PaymentSnapshot::of(&order).creation_changes();
    append_payment_changes(conn, &ctx.actor, LogSubject::Order, &order.id, party.clone(), created)
        .await?;
    for item in &items {
        let entry = OrderLog::new(&ctx.actor, OrderAction::Create, MODEL_ORDER, &order.id)
            .customer(party.clone())
            .product(&item.product_name, item.quantity, item.price)
            .note("Created Order Item")
            .build();
        log::append_order(&mut *conn, &entry).await?;
    }

    Ok(order)
}

async fn update_order_tx(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    order_id: &str,
    request: &UpdateOrder,
) -> DbResult<Committed<Order>> {
    let mut order = require_order(conn, order_id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(CoreError::AlreadyCancelled {
            entity: "Order".to_string(),
            id: order.id.clone(),
        }
        .into());
    }
    let before = PaymentSnapshot::of(&order);
    let mut items = orders::fetch_items(&mut *conn, &order.id).await?;

    if let Some(customer_id) = request.customer_id.as_deref() {
        customer_label(conn, Some(customer_id)).await?;
        order.customer_id = Some(customer_id.to_string());
    }
    let party = customer_label(conn, order.customer_id.as_deref()).await?;

    if request.status == Some(OrderStatus::Cancelled) {
        return cancel_whole_order(conn, ctx, order, items, &before, party).await;
    }

    let mut refusal = None;
    if let Some(entries) = &request.items {
        validate_order_items(entries.len())?;
        for id in entries.iter().filter_map(|e| e.id.as_deref()) {
            if !items.iter().any(|i| i.id == id) {
                return Err(CoreError::UnknownChild {
                    entity: "Order item".to_string(),
                    id: id.to_string(),
                }
                .into());
            }
        }

        let keep: HashSet<&str> = entries.iter().filter_map(|e| e.id.as_deref()).collect();
        let (kept, omitted): (Vec<OrderItem>, Vec<OrderItem>) = items
            .into_iter()
            .partition(|i| keep.contains(i.id.as_str()));
        items = kept;

        for gone in &omitted {
            orders::delete_item(&mut *conn, &gone.id).await?;
            let entry = OrderLog::new(&ctx.actor, OrderAction::Delete, MODEL_ITEM, &gone.id)
                .customer(party.clone())
                .product(&gone.product_name, gone.quantity, gone.price)
                .note("Removed from order")
                .build();
            log::append_order(&mut *conn, &entry).await?;
        }

        let mut cache = ProductCache::default();
        let mut touched = Vec::new();
        let mut created = Vec::new();
        for entry in entries {
            match entry.id.as_deref() {
                Some(id) => {
                    let changes = entry.changes();
                    if changes.is_empty() {
                        continue;
                    }
                    if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                        let outcome =
                            change_item(conn, ctx, &mut cache, item, &changes, party.clone())
                                .await?;
                        if outcome.is_some() {
                            refusal = outcome;
                        }
                        touched.push(id.to_string());
                    }
                }
                None => {
                    let product_id = entry.product_id.clone().ok_or_else(|| {
                        ValidationError::Required {
                            field: "product_id".to_string(),
                        }
                    })?;
                    let line = NewOrderItem {
                        product_id,
                        quantity: entry.quantity,
                        package: entry.package,
                        unit_price: entry.unit_price,
                        unit: entry.unit.clone(),
                    };
                    let product = cache.require(conn, &line.product_id).await?;
                    created.push(create_item(&order, product, &line)?);
                }
            }
        }

        cache.flush(conn).await?;
        for item in items.iter().filter(|i| touched.contains(&i.id)) {
            orders::update_item(&mut *conn, item).await?;
        }
        for item in &created {
            orders::insert_item(&mut *conn, item).await?;
            let entry = OrderLog::new(&ctx.actor, OrderAction::Create, MODEL_ORDER, &order.id)
                .customer(party.clone())
                .product(&item.product_name, item.quantity, item.price)
                .note("Created Order Item")
                .build();
            log::append_order(&mut *conn, &entry).await?;
        }
        items.extend(created);
    }

    settle_order(
        conn,
        ctx,
        &mut order,
        &items,
        request.payment_status,
        request.paid_amount_delta,
        &before,
        party,
    )
    .await?;

    Ok(Committed::refused(order, refusal))
}

/// Cancels the order, or records a cancellation request when the actor
/// needs approval.
async fn cancel_whole_order(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    mut order: Order,
    mut items: Vec<OrderItem>,
    before: &PaymentSnapshot,
    party: Option<String>,
) -> DbResult<Committed<Order>> {
    match ctx.decide(Action::Cancel, EntityKind::Order) {
        Decision::RequireApproval => {
            order.status = OrderStatus::Pending;
            order.updated_at = chrono::Utc::now();
            orders::update_order(&mut *conn, &order).await?;

            let quantity: i64 = items.iter().map(|i| i.quantity).sum();
            let price: Money = items.iter().map(|i| i.price).sum();
            let entry = OrderLog::new(&ctx.actor, OrderAction::RequestCancel, MODEL_ORDER, &order.id)
                .customer(party)
                .product("Whole Order", quantity, price)
                .note("Salesman requested cancellation")
                .build();
            log::append_order(&mut *conn, &entry).await?;
            debug!(id = %order.id, user = %ctx.actor.name, "Order cancellation requested");

            let refusal = CoreError::UnauthorizedCancellation {
                entity: "Order".to_string(),
                id: order.id.clone(),
            };
            Ok(Committed::refused(order, Some(refusal)))
        }
        Decision::Allow => {
            let mut cache = ProductCache::default();
            for product_id in items.iter().filter_map(|i| i.product_id.clone()) {
                cache.load(conn, &product_id).await?;
            }
            let cancelled = cancel_order(&mut order, &mut items, cache.map_mut())?;
            cache.flush(conn).await?;

            for item in &items {
                orders::update_item(&mut *conn, item).await?;
            }
            orders::update_order(&mut *conn, &order).await?;

            let changes = before.diff(&PaymentSnapshot::of(&order));
            append_payment_changes(conn, &ctx.actor, LogSubject::Order, &order.id, party.clone(), changes)
                .await?;
            let entry = OrderLog::new(&ctx.actor, OrderAction::Update, MODEL_ORDER, &order.id)
                .customer(party)
                .changes(json!({ "status": OrderStatus::Cancelled, "items_cancelled": cancelled }))
                .build();
            log::append_order(&mut *conn, &entry).await?;
            debug!(id = %order.id, cancelled, "Order cancelled");

            Ok(Committed::ok(order))
        }
    }
}

async fn update_item_tx(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    item_id: &str,
    changes: &ItemChanges,
) -> DbResult<Committed<OrderItem>> {
    let mut item = orders::fetch_item(&mut *conn, item_id)
        .await?
        .ok_or_else(|| DbError::not_found("Order item", item_id))?;
    let mut order = require_order(conn, &item.order_id).await?;
    let before = PaymentSnapshot::of(&order);
    let party = customer_label(conn, order.customer_id.as_deref()).await?;

    let mut cache = ProductCache::default();
    let refusal = change_item(conn, ctx, &mut cache, &mut item, changes, party.clone()).await?;
    cache.flush(conn).await?;
    orders::update_item(&mut *conn, &item).await?;

    let items = orders::fetch_items(&mut *conn, &order.id).await?;
    settle_order(conn, ctx, &mut order, &items, None, None, &before, party).await?;

    Ok(Committed::refused(item, refusal))
}

async fn delete_item_tx(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    item_id: &str,
) -> DbResult<ItemDeletion> {
    let item = orders::fetch_item(&mut *conn, item_id)
        .await?
        .ok_or_else(|| DbError::not_found("Order item", item_id))?;
    let mut order = require_order(conn, &item.order_id).await?;
    let before = PaymentSnapshot::of(&order);
    let party = customer_label(conn, order.customer_id.as_deref()).await?;

    orders::delete_item(&mut *conn, &item.id).await?;
    let entry = OrderLog::new(&ctx.actor, OrderAction::Delete, MODEL_ITEM, &item.id)
        .customer(party.clone())
        .product(&item.product_name, item.quantity, item.price)
        .build();
    log::append_order(&mut *conn, &entry).await?;

    let items = orders::fetch_items(&mut *conn, &order.id).await?;
    if items.is_empty() {
        orders::delete_order(&mut *conn, &order.id).await?;
        let entry = OrderLog::new(&ctx.actor, OrderAction::Delete, MODEL_ORDER, &order.id)
            .customer(party)
            .note("Deleted with its last item")
            .build();
        log::append_order(&mut *conn, &entry).await?;
        debug!(id = %order.id, "Order deleted with its last item");
        return Ok(ItemDeletion {
            order_deleted: true,
            order: None,
        });
    }

    settle_order(conn, ctx, &mut order, &items, None, None, &before, party).await?;
    Ok(ItemDeletion {
        order_deleted: false,
        order: Some(order),
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Applies `changes` to `item` in memory and logs the action.
///
/// Returns the refusal to report once the transaction has committed, if
/// the cancellation was downgraded to a request.
async fn change_item(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    cache: &mut ProductCache,
    item: &mut OrderItem,
    changes: &ItemChanges,
    party: Option<String>,
) -> DbResult<Option<CoreError>> {
    let action = if changes.status == Some(OrderStatus::Cancelled) {
        Action::Cancel
    } else {
        Action::Update
    };
    let decision = ctx.decide(action, EntityKind::OrderItem);

    let before = item.clone();
    let receipt = item.item_receipt;
    let product = match item.product_id.clone() {
        Some(id) => cache.load(conn, &id).await?,
        None => None,
    };
    let outcome = update_item(item, product, receipt, changes, decision)?;

    let entry = match outcome {
        ItemOutcome::CancellationRequested => {
            OrderLog::new(&ctx.actor, OrderAction::RequestCancel, MODEL_ITEM, &item.id)
                .customer(party)
                .product(&item.product_name, item.quantity, item.price)
                .note("Salesman requested cancellation")
                .build()
        }
        ItemOutcome::Updated => OrderLog::new(&ctx.actor, OrderAction::Update, MODEL_ITEM, &item.id)
            .customer(party)
            .product(&item.product_name, item.quantity, item.price)
            .changes(item_diff(&before, item))
            .build(),
    };
    log::append_order(&mut *conn, &entry).await?;

    Ok(match outcome {
        ItemOutcome::CancellationRequested => Some(CoreError::UnauthorizedCancellation {
            entity: "Order item".to_string(),
            id: item.id.clone(),
        }),
        ItemOutcome::Updated => None,
    })
}

/// Recomputes the order from `items`, applies payment changes, stores it
/// and logs the payment diff against `before`.
#[allow(clippy::too_many_arguments)]
async fn settle_order(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    order: &mut Order,
    items: &[OrderItem],
    status: Option<PaymentStatus>,
    paid_delta: Option<Money>,
    before: &PaymentSnapshot,
    party: Option<String>,
) -> DbResult<()> {
    recompute_totals(order, items, ctx.rate);
    if let Some(status) = status {
        set_status(order, status);
    }
    if let Some(delta) = paid_delta {
        apply_paid_delta(order, delta)?;
    }
    refresh_item_pending(order, items);
    orders::update_order(&mut *conn, order).await?;

    let changes = before.diff(&PaymentSnapshot::of(&*order));
    append_payment_changes(conn, &ctx.actor, LogSubject::Order, &order.id, party, changes).await
}

/// Old/new pairs of the item fields that changed.
fn item_diff(before: &OrderItem, after: &OrderItem) -> Value {
    let mut changes = Map::new();
    if before.quantity != after.quantity {
        changes.insert("quantity".into(), json!({ "old": before.quantity, "new": after.quantity }));
    }
    if before.package != after.package {
        changes.insert("package".into(), json!({ "old": before.package, "new": after.package }));
    }
    if before.unit_price != after.unit_price {
        changes.insert(
            "unit_price".into(),
            json!({ "old": before.unit_price, "new": after.unit_price }),
        );
    }
    if before.price != after.price {
        changes.insert("price".into(), json!({ "old": before.price, "new": after.price }));
    }
    if before.status != after.status {
        changes.insert("status".into(), json!({ "old": before.status, "new": after.status }));
    }
    Value::Object(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerSettings;
    use crate::pool::{Database, DbConfig};
    use crate::testing::{actor, admin, customer, ledger, stocked_product};
    use depot_core::request::OrderItemEntry;
    use depot_core::{new_id, Role};

    fn by_quantity(product_id: &str, quantity: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: product_id.to_string(),
            quantity: Some(quantity),
            package: None,
            unit_price: None,
            unit: None,
        }
    }

    fn by_package(product_id: &str, package: i64) -> NewOrderItem {
        NewOrderItem {
            package: Some(package),
            quantity: None,
            ..by_quantity(product_id, 0)
        }
    }

    fn request(receipt: ReceiptMode, status: PaymentStatus, items: Vec<NewOrderItem>) -> CreateOrder {
        CreateOrder {
            customer_id: None,
            receipt,
            payment_status: status,
            paid_amount: Money::zero(),
            items,
        }
    }

    async fn order_count(ledger: &Ledger) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(ledger.database().pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_receipt_order_totals_with_vat() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Cement 50kg", 100, None, None, 500).await;

        let order = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::Receipt,
                    PaymentStatus::Unpaid,
                    vec![by_quantity(&product.id, 10)],
                ),
            )
            .await
            .unwrap();

        assert_eq!(order.sub_total, Money::from_cents(5000));
        assert_eq!(order.vat, Money::from_cents(750));
        assert_eq!(order.total_amount, Money::from_cents(5750));
        assert_eq!(order.unpaid_amount, Money::from_cents(5750));
        assert_eq!(order.receipt_id.as_deref(), Some("0000"));

        let stored = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(stored.total_amount, order.total_amount);
        assert_eq!(stored.receipt_id, order.receipt_id);
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(90));

        let log = ledger.get_order_payment_log(&order.id).await.unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|e| e.old_value.as_deref() == Some("0")));
    }

    #[tokio::test]
    async fn test_receipt_ids_count_receipted_orders_only() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Sand", 100, None, None, 100).await;

        let mut ids = Vec::new();
        for receipt in [ReceiptMode::Receipt, ReceiptMode::NoReceipt, ReceiptMode::Receipt] {
            let order = ledger
                .create_order(
                    &admin(),
                    request(receipt, PaymentStatus::Paid, vec![by_quantity(&product.id, 1)]),
                )
                .await
                .unwrap();
            ids.push(order.receipt_id);
        }
        assert_eq!(ids, vec![Some("0000".to_string()), None, Some("0001".to_string())]);
    }

    #[tokio::test]
    async fn test_negative_item_price_writes_nothing() {
        let ledger = ledger().await;
        let cement = stocked_product(&ledger, "Cement 50kg", 100, None, None, 500).await;
        let sand = stocked_product(&ledger, "Sand", 100, None, None, 100).await;

        let mut discounted = by_quantity(&sand.id, 10);
        discounted.unit_price = Some(Money::from_cents(-500));
        let err = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::NoReceipt,
                    PaymentStatus::Pending,
                    vec![by_quantity(&cement.id, 5), discounted],
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Ledger(CoreError::Validation(ValidationError::Negative { .. }))
        ));
        assert_eq!(order_count(&ledger).await, 0);
        assert_eq!(ledger.get_product(&cement.id).await.unwrap().stock, Some(100));
        assert_eq!(ledger.get_product(&sand.id).await.unwrap().stock, Some(100));
        let logs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_logs")
            .fetch_one(ledger.database().pool())
            .await
            .unwrap();
        assert_eq!(logs, 0);
    }

    #[tokio::test]
    async fn test_package_item_reserve_and_cancel() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Tiles", 100, Some(10), Some(10), 1200).await;

        let order = ledger
            .create_order(
                &admin(),
                request(ReceiptMode::NoReceipt, PaymentStatus::Paid, vec![by_package(&product.id, 3)]),
            )
            .await
            .unwrap();
        let reserved = ledger.get_product(&product.id).await.unwrap();
        assert_eq!((reserved.stock, reserved.package), (Some(70), Some(7)));

        let item = &ledger.get_order_items(&order.id).await.unwrap()[0];
        assert_eq!(item.quantity, 30);
        assert_eq!(item.package, Some(3));

        let cancelled = ledger
            .update_order_item(
                &admin(),
                &item.id,
                ItemChanges {
                    status: Some(OrderStatus::Cancelled),
                    ..ItemChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.price.is_zero());

        let released = ledger.get_product(&product.id).await.unwrap();
        assert_eq!((released.stock, released.package), (Some(100), Some(10)));

        // the only item is cancelled, so is the order
        let order = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.total_amount.is_zero());
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_nothing_behind() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Cement 50kg", 100, None, None, 500).await;

        let err = ledger
            .create_order(
                &admin(),
                request(ReceiptMode::Receipt, PaymentStatus::Paid, vec![by_quantity(&product.id, 150)]),
            )
            .await
            .unwrap_err();

        match err {
            DbError::Ledger(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 100);
                assert_eq!(requested, 150);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(100));
        assert_eq!(order_count(&ledger).await, 0);
    }

    #[tokio::test]
    async fn test_multi_item_order_is_atomic() {
        let ledger = ledger().await;
        let plenty = stocked_product(&ledger, "Sand", 50, None, None, 100).await;
        let scarce = stocked_product(&ledger, "Gravel", 2, None, None, 100).await;

        let err = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::NoReceipt,
                    PaymentStatus::Paid,
                    vec![by_quantity(&plenty.id, 10), by_quantity(&scarce.id, 5)],
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Ledger(CoreError::InsufficientStock { .. })));
        assert_eq!(ledger.get_product(&plenty.id).await.unwrap().stock, Some(50));
        assert_eq!(ledger.get_product(&scarce.id).await.unwrap().stock, Some(2));
        assert_eq!(order_count(&ledger).await, 0);
    }

    #[tokio::test]
    async fn test_salesman_cancel_becomes_request() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Paint 4L", 20, None, None, 2500).await;
        let order = ledger
            .create_order(
                &admin(),
                request(ReceiptMode::NoReceipt, PaymentStatus::Paid, vec![by_quantity(&product.id, 2)]),
            )
            .await
            .unwrap();
        let item = ledger.get_order_items(&order.id).await.unwrap().remove(0);

        let err = ledger
            .update_order_item(
                &actor(Role::Salesman),
                &item.id,
                ItemChanges {
                    status: Some(OrderStatus::Cancelled),
                    ..ItemChanges::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(CoreError::UnauthorizedCancellation { .. })
        ));

        // the downgrade was committed
        let stored = ledger.get_order_item(&item.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(18));

        let log = ledger.get_order_log(&item.id).await.unwrap();
        let requests: Vec<_> = log
            .iter()
            .filter(|e| e.action == OrderAction::RequestCancel)
            .collect();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model_name, MODEL_ITEM);
        assert_eq!(requests[0].user_name, "Dawit");

        // a manager can then cancel it
        let cancelled = ledger
            .update_order_item(
                &actor(Role::Manager),
                &item.id,
                ItemChanges {
                    status: Some(OrderStatus::Cancelled),
                    ..ItemChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(20));
    }

    #[tokio::test]
    async fn test_cancelled_item_rejects_changes() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Paint 4L", 20, None, None, 2500).await;
        let other = stocked_product(&ledger, "Brush", 20, None, None, 300).await;
        let order = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::NoReceipt,
                    PaymentStatus::Paid,
                    vec![by_quantity(&product.id, 2), by_quantity(&other.id, 1)],
                ),
            )
            .await
            .unwrap();
        let item = ledger.get_order_items(&order.id).await.unwrap().remove(0);
        let cancel = ItemChanges {
            status: Some(OrderStatus::Cancelled),
            ..ItemChanges::default()
        };
        ledger.update_order_item(&admin(), &item.id, cancel.clone()).await.unwrap();

        let err = ledger
            .update_order_item(&admin(), &item.id, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::AlreadyCancelled { .. })));
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(20));

        let order = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(order.total_amount, Money::from_cents(300));
        assert_eq!(order.status, OrderStatus::Done);
    }

    #[tokio::test]
    async fn test_pending_payment_promotes_to_paid() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Rebar 12mm", 50, None, None, 1000).await;

        let order = ledger
            .create_order(
                &admin(),
                CreateOrder {
                    paid_amount: Money::from_cents(4000),
                    ..request(
                        ReceiptMode::NoReceipt,
                        PaymentStatus::Pending,
                        vec![by_quantity(&product.id, 10)],
                    )
                },
            )
            .await
            .unwrap();
        assert_eq!(order.total_amount, Money::from_cents(10000));
        assert_eq!(order.unpaid_amount, Money::from_cents(6000));
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let paid = ledger
            .update_order(
                &admin(),
                &order.id,
                UpdateOrder {
                    paid_amount_delta: Some(Money::from_cents(6000)),
                    ..UpdateOrder::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.paid_amount, Money::from_cents(10000));
        assert!(paid.unpaid_amount.is_zero());
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        // newest first: the update's entries precede the creation entries
        let log = ledger.get_order_payment_log(&order.id).await.unwrap();
        assert_eq!(log.len(), 6);
        assert_eq!(log[0].field_name, "unpaid_amount");
        assert_eq!(log[0].new_value.as_deref(), Some("0.00"));
        assert_eq!(log[2].field_name, "payment_status");
        assert_eq!(log[2].new_value.as_deref(), Some("Paid"));
        assert_eq!(log[5].field_name, "payment_status");
        assert_eq!(log[5].old_value.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_overpaid_pending_order_is_rejected() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Rebar 12mm", 50, None, None, 1000).await;

        let err = ledger
            .create_order(
                &admin(),
                CreateOrder {
                    paid_amount: Money::from_cents(20000),
                    ..request(
                        ReceiptMode::NoReceipt,
                        PaymentStatus::Pending,
                        vec![by_quantity(&product.id, 10)],
                    )
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::PaidAmountOutOfRange { .. })));
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(50));
    }

    #[tokio::test]
    async fn test_delete_items_without_restock() {
        let ledger = ledger().await;
        let first = stocked_product(&ledger, "Cement 50kg", 10, None, None, 1000).await;
        let second = stocked_product(&ledger, "Sand", 10, None, None, 400).await;
        let order = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::NoReceipt,
                    PaymentStatus::Unpaid,
                    vec![by_quantity(&first.id, 2), by_quantity(&second.id, 1)],
                ),
            )
            .await
            .unwrap();
        let items = ledger.get_order_items(&order.id).await.unwrap();

        let deletion = ledger.delete_order_item(&admin(), &items[0].id).await.unwrap();
        assert!(!deletion.order_deleted);
        let remaining = deletion.order.unwrap();
        assert_eq!(remaining.total_amount, Money::from_cents(400));
        assert_eq!(remaining.unpaid_amount, Money::from_cents(400));
        assert_eq!(ledger.get_product(&first.id).await.unwrap().stock, Some(8));

        let deletion = ledger.delete_order_item(&admin(), &items[1].id).await.unwrap();
        assert!(deletion.order_deleted);
        assert!(deletion.order.is_none());
        assert!(matches!(
            ledger.get_order(&order.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(ledger.get_product(&second.id).await.unwrap().stock, Some(9));
    }

    #[tokio::test]
    async fn test_whole_order_cancel_by_manager_restocks() {
        let ledger = ledger().await;
        let cement = stocked_product(&ledger, "Cement 50kg", 40, None, None, 1000).await;
        let tiles = stocked_product(&ledger, "Tiles", 100, Some(10), Some(10), 1200).await;
        let order = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::Receipt,
                    PaymentStatus::Paid,
                    vec![by_quantity(&cement.id, 5), by_package(&tiles.id, 2)],
                ),
            )
            .await
            .unwrap();

        let cancel = UpdateOrder {
            status: Some(OrderStatus::Cancelled),
            ..UpdateOrder::default()
        };
        let cancelled = ledger
            .update_order(&actor(Role::Manager), &order.id, cancel.clone())
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Unpaid);
        assert!(cancelled.total_amount.is_zero());
        assert_eq!(ledger.get_product(&cement.id).await.unwrap().stock, Some(40));
        let tiles = ledger.get_product(&tiles.id).await.unwrap();
        assert_eq!((tiles.stock, tiles.package), (Some(100), Some(10)));
        assert!(ledger
            .get_order_items(&order.id)
            .await
            .unwrap()
            .iter()
            .all(|i| i.status == OrderStatus::Cancelled && i.quantity == 0));

        let err = ledger
            .update_order(&actor(Role::Manager), &order.id, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::AlreadyCancelled { .. })));
    }

    #[tokio::test]
    async fn test_whole_order_cancel_request() {
        let ledger = ledger().await;
        let buyer = customer(&ledger, "Kebede Construction").await;
        let product = stocked_product(&ledger, "Cement 50kg", 40, None, None, 1000).await;
        let order = ledger
            .create_order(
                &admin(),
                CreateOrder {
                    customer_id: Some(buyer.id.clone()),
                    ..request(
                        ReceiptMode::NoReceipt,
                        PaymentStatus::Paid,
                        vec![by_quantity(&product.id, 4)],
                    )
                },
            )
            .await
            .unwrap();

        let err = ledger
            .update_order(
                &actor(Role::SalesManager),
                &order.id,
                UpdateOrder {
                    status: Some(OrderStatus::Cancelled),
                    ..UpdateOrder::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(CoreError::UnauthorizedCancellation { .. })
        ));

        let stored = ledger.get_order(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.total_amount, Money::from_cents(4000));
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(36));

        let log = ledger.get_order_log(&order.id).await.unwrap();
        let request = &log[0];
        assert_eq!(request.action, OrderAction::RequestCancel);
        assert_eq!(request.product_name.as_deref(), Some("Whole Order"));
        assert_eq!(request.quantity, Some(4));
        assert_eq!(request.customer_info.as_deref(), Some("Kebede Construction"));
    }

    #[tokio::test]
    async fn test_item_set_replacement() {
        let ledger = ledger().await;
        let cement = stocked_product(&ledger, "Cement 50kg", 40, None, None, 1000).await;
        let sand = stocked_product(&ledger, "Sand", 40, None, None, 200).await;
        let gravel = stocked_product(&ledger, "Gravel", 40, None, None, 300).await;
        let order = ledger
            .create_order(
                &admin(),
                request(
                    ReceiptMode::NoReceipt,
                    PaymentStatus::Unpaid,
                    vec![by_quantity(&cement.id, 4), by_quantity(&sand.id, 5)],
                ),
            )
            .await
            .unwrap();
        let items = ledger.get_order_items(&order.id).await.unwrap();

        let updated = ledger
            .update_order(
                &admin(),
                &order.id,
                UpdateOrder {
                    items: Some(vec![
                        OrderItemEntry {
                            id: Some(items[0].id.clone()),
                            quantity: Some(6),
                            ..OrderItemEntry::default()
                        },
                        OrderItemEntry {
                            product_id: Some(gravel.id.clone()),
                            quantity: Some(2),
                            ..OrderItemEntry::default()
                        },
                    ]),
                    ..UpdateOrder::default()
                },
            )
            .await
            .unwrap();

        // 6 × 10.00 + 2 × 3.00
        assert_eq!(updated.total_amount, Money::from_cents(6600));
        assert_eq!(updated.unpaid_amount, Money::from_cents(6600));
        assert_eq!(ledger.get_product(&cement.id).await.unwrap().stock, Some(34));
        assert_eq!(ledger.get_product(&gravel.id).await.unwrap().stock, Some(38));
        // removed without restock
        assert_eq!(ledger.get_product(&sand.id).await.unwrap().stock, Some(35));

        let names: Vec<_> = ledger
            .get_order_items(&order.id)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.product_name)
            .collect();
        assert_eq!(names, vec!["Cement 50kg", "Gravel"]);
    }

    #[tokio::test]
    async fn test_foreign_item_id_is_rejected() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Sand", 40, None, None, 200).await;
        let make = || request(ReceiptMode::NoReceipt, PaymentStatus::Paid, vec![by_quantity(&product.id, 1)]);
        let first = ledger.create_order(&admin(), make()).await.unwrap();
        let second = ledger.create_order(&admin(), make()).await.unwrap();
        let foreign = ledger.get_order_items(&second.id).await.unwrap().remove(0);

        let err = ledger
            .update_order(
                &admin(),
                &first.id,
                UpdateOrder {
                    items: Some(vec![OrderItemEntry {
                        id: Some(foreign.id.clone()),
                        quantity: Some(3),
                        ..OrderItemEntry::default()
                    }]),
                    ..UpdateOrder::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::UnknownChild { .. })));
        assert_eq!(ledger.get_order_items(&first.id).await.unwrap().len(), 1);
        assert_eq!(ledger.get_product(&product.id).await.unwrap().stock, Some(38));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let path = std::env::temp_dir().join(format!("depot-oversell-{}.db", new_id()));
        let db = Database::new(DbConfig::new(path.clone()).max_connections(8))
            .await
            .unwrap();
        let settings = LedgerSettings {
            max_attempts: 50,
            retry_backoff_ms: 2,
            ..LedgerSettings::default()
        };
        let ledger = Ledger::new(db, settings);
        let product = stocked_product(&ledger, "Cement 50kg", 20, None, None, 1000).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let ledger = ledger.clone();
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .create_order(
                        &admin(),
                        request(
                            ReceiptMode::NoReceipt,
                            PaymentStatus::Paid,
                            vec![by_quantity(&product_id, 3)],
                        ),
                    )
                    .await
            }));
        }

        let mut sold = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => sold += 3,
                Err(DbError::Ledger(CoreError::InsufficientStock { .. }))
                | Err(DbError::ConcurrencyConflict { .. }) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        let stock = ledger.get_product(&product.id).await.unwrap().stock.unwrap();
        assert!(stock >= 0);
        assert_eq!(stock, 20 - sold);
        assert_eq!(order_count(&ledger).await, i64::from(sold / 3));

        ledger.database().close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
