//! # Order Item Engine
//!
//! Creates and updates order items against their product, driving the stock
//! ledger and computing `price` and `cost`.
//!
//! ## Item State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │      create ──► Done ◄──────── Pending                                  │
//! │                  │   cancel by      ▲  │                                │
//! │                  │   approval role  │  │                                │
//! │                  ├──────────────────┘  │                                │
//! │                  │                     │                                │
//! │                  ▼   cancel (allowed)  ▼                                │
//! │              Cancelled ◄───────────────┘   terminal, stock released     │
//! │                                                                         │
//! │  Done ──► Pending directly is rejected (InvalidTransition).             │
//! │  Quantity and package only change while the item is Done.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## All-or-nothing
//! `update_item` works on clones of the item and product and writes them
//! back only when every step succeeded.

use chrono::Utc;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{line_total, Money};
use crate::policy::Decision;
use crate::request::{ItemChanges, NewOrderItem};
use crate::stock::{self, StockRequest};
use crate::types::{new_id, Order, OrderItem, OrderStatus, Product, ReceiptMode};

/// What `update_item` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Updated,

    /// The item was moved to Pending instead of Cancelled; the caller owes
    /// the actor an `UnauthorizedCancellation` once this is persisted.
    CancellationRequested,
}

// =============================================================================
// Create
// =============================================================================

/// Builds a new Done item for `order`, reserving its stock.
///
/// ## Pricing
/// - `unit_price` = given, else the product's selling price, else zero
/// - `price` = `unit_price × quantity`
/// - `cost` = buying price × units, zero when the buying price is unset
///
/// ## Errors
/// A negative `unit_price`, a price or cost past `Money::LIMIT`, or any
/// stock failure. The product is unchanged on error.
pub fn create_item(
    order: &Order,
    product: &mut Product,
    request: &NewOrderItem,
) -> CoreResult<OrderItem> {
    if product.stock.is_none() {
        return Err(CoreError::StockUnavailable(product.name.clone()));
    }
    if request.unit_price.is_some_and(|price| price.is_negative()) {
        return Err(ValidationError::Negative {
            field: "unit_price".to_string(),
        }
        .into());
    }
    let stock_request = StockRequest::from_parts(request.quantity, request.package)?;

    let unit_price = request
        .unit_price
        .or(product.selling_price)
        .unwrap_or_default();

    // written back to `product` only once price and cost are known
    let mut next_product = product.clone();
    let reservation = stock::reserve(&mut next_product, order.receipt, stock_request)?;
    let price = line_total(unit_price, reservation.quantity, "price")?;

    let now = Utc::now();
    let mut item = OrderItem {
        id: new_id(),
        order_id: order.id.clone(),
        product_id: Some(product.id.clone()),
        product_name: product.name.clone(),
        unit: request.unit.clone().or_else(|| product.unit.clone()),
        quantity: reservation.quantity,
        package: reservation.package,
        unit_price,
        price,
        cost: Money::zero(),
        item_receipt: order.receipt,
        status: OrderStatus::Done,
        created_at: now,
        updated_at: now,
    };
    item.cost = cost_of(&item, &next_product)?;
    *product = next_product;
    Ok(item)
}

// =============================================================================
// Update
// =============================================================================

/// Applies `changes` to an existing item.
///
/// `product` is required for quantity or package edits; a cancel without
/// one zeroes the item and restocks nothing. `decision` is the policy
/// verdict for a cancellation.
///
/// ## Order of checks
/// 1. Cancelled items accept no change
/// 2. A cancel needing approval downgrades the item to Pending
/// 3. `quantity` and `package` together, or non-positive, are rejected
/// 4. Cancel releases stock and zeroes the item
/// 5. Done marks the item Done; Done → Pending is rejected
/// 6. Quantity/package edits need a Done item
/// 7. Price and cost are recomputed
pub fn update_item(
    item: &mut OrderItem,
    product: Option<&mut Product>,
    receipt: ReceiptMode,
    changes: &ItemChanges,
    decision: Decision,
) -> CoreResult<ItemOutcome> {
    if item.status == OrderStatus::Cancelled {
        return Err(CoreError::already_cancelled("Order item", &item.id));
    }

    if changes.status == Some(OrderStatus::Cancelled) && decision == Decision::RequireApproval {
        item.status = OrderStatus::Pending;
        item.updated_at = Utc::now();
        return Ok(ItemOutcome::CancellationRequested);
    }

    validate_changes(changes)?;

    let mut next = item.clone();
    let mut next_product = product.as_deref().cloned();

    match changes.status {
        Some(OrderStatus::Cancelled) => match next_product.as_mut() {
            Some(p) => cancel_onto(&mut next, p, receipt),
            // product deleted from the catalog: nothing to restock
            None => zero_cancelled(&mut next),
        },
        Some(OrderStatus::Done) => next.status = OrderStatus::Done,
        Some(OrderStatus::Pending) if next.status == OrderStatus::Done => {
            return Err(CoreError::InvalidTransition {
                entity: "Order item".to_string(),
                from: OrderStatus::Done.to_string(),
                to: OrderStatus::Pending.to_string(),
            });
        }
        Some(OrderStatus::Pending) | None => {}
    }

    if next.status != OrderStatus::Cancelled {
        let resized = changes.quantity.is_some() || changes.package.is_some();
        if resized {
            if next.status != OrderStatus::Done {
                return Err(CoreError::ItemPending(item.id.clone()));
            }
            let p = next_product
                .as_mut()
                .ok_or_else(|| missing_product(item))?;

            if let Some(quantity) = changes.quantity {
                stock::adjust_for_quantity_change(p, receipt, next.quantity, quantity)?;
                next.quantity = quantity;
                next.package = None;
            } else if let Some(package) = changes.package {
                next.quantity = stock::adjust_for_package_change(
                    p,
                    receipt,
                    next.package,
                    next.quantity,
                    package,
                )?;
                next.package = Some(package);
            }
        }

        if resized || changes.unit_price.is_some() {
            let unit_price = changes
                .unit_price
                .or_else(|| Some(next.unit_price).filter(Money::is_positive))
                .or_else(|| next_product.as_ref().and_then(|p| p.selling_price))
                .unwrap_or_default();
            next.unit_price = unit_price;
            next.price = line_total(unit_price, next.quantity, "price")?;
            if let Some(p) = next_product.as_ref() {
                next.cost = cost_of(&next, p)?;
            }
        }
    }

    next.updated_at = Utc::now();
    *item = next;
    if let (Some(target), Some(updated)) = (product, next_product) {
        *target = updated;
    }
    Ok(ItemOutcome::Updated)
}

/// Releases the item's stock and zeroes it as Cancelled.
///
/// Used by order-level cancellation on every non-cancelled item.
pub fn cancel_onto(item: &mut OrderItem, product: &mut Product, receipt: ReceiptMode) {
    stock::release(product, receipt, item.package, item.quantity);
    zero_cancelled(item);
}

pub(crate) fn zero_cancelled(item: &mut OrderItem) {
    item.quantity = 0;
    item.package = item.package.map(|_| 0);
    item.unit_price = Money::zero();
    item.price = Money::zero();
    item.cost = Money::zero();
    item.status = OrderStatus::Cancelled;
    item.updated_at = Utc::now();
}

// =============================================================================
// Helpers
// =============================================================================

/// Buying price × units, where units are `package × piece` for package
/// items.
pub fn cost_of(item: &OrderItem, product: &Product) -> CoreResult<Money> {
    let Some(buying) = product.buying_price else {
        return Ok(Money::zero());
    };
    let units = match (item.package, product.piece_size()) {
        (Some(package), Some(piece)) => stock::units_of(package, piece)?,
        _ => item.quantity,
    };
    line_total(buying, units, "cost")
}

fn validate_changes(changes: &ItemChanges) -> CoreResult<()> {
    if changes.quantity.is_some() && changes.package.is_some() {
        return Err(ValidationError::MutuallyExclusive {
            first: "quantity".to_string(),
            second: "package".to_string(),
        }
        .into());
    }
    if let Some(q) = changes.quantity.filter(|q| *q <= 0) {
        return Err(CoreError::InvalidQuantity(q));
    }
    if let Some(p) = changes.package.filter(|p| *p <= 0) {
        return Err(CoreError::InvalidPackage(p));
    }
    if changes.unit_price.is_some_and(|price| price.is_negative()) {
        return Err(ValidationError::Negative {
            field: "unit_price".to_string(),
        }
        .into());
    }
    Ok(())
}

fn missing_product(item: &OrderItem) -> CoreError {
    CoreError::ProductNotFound(
        item.product_id
            .clone()
            .unwrap_or_else(|| item.product_name.clone()),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
