//! # Order Aggregate
//!
//! Order-level figures derived from the items: totals, VAT, the paid/unpaid
//! split, the item-pending counter and order-wide cancellation.
//!
//! ## Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sub_total    = Σ item.price                                            │
//! │  vat          = sub_total × rate   (Receipt only, banker's rounding)    │
//! │  total_amount = sub_total + vat                                         │
//! │  paid/unpaid  = settlement::settle(order)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::item;
use crate::money::Money;
use crate::settlement;
use crate::types::{Order, OrderItem, OrderStatus, PaymentStatus, Product, TaxRate};
use crate::RECEIPT_ID_WIDTH;

/// Recomputes sub-total, VAT and total from `items`, then settles.
pub fn recompute_totals(order: &mut Order, items: &[OrderItem], rate: TaxRate) {
    let sub_total: Money = items.iter().map(|i| i.price).sum();
    let vat = if order.receipt.is_receipt() {
        sub_total.calculate_tax(rate)
    } else {
        Money::zero()
    };

    order.sub_total = sub_total;
    order.vat = vat;
    order.total_amount = sub_total + vat;
    settlement::settle(order);
    order.updated_at = Utc::now();
}

/// Cancels the order and every item that is not already cancelled.
///
/// A single pass: each live item releases its stock into `products` (keyed
/// by product id) and is zeroed. Items whose product no longer exists are
/// zeroed without a restock.
///
/// ## Returns
/// The number of items cancelled by this call.
pub fn cancel_order(
    order: &mut Order,
    items: &mut [OrderItem],
    products: &mut HashMap<String, Product>,
) -> CoreResult<usize> {
    if order.status == OrderStatus::Cancelled {
        return Err(CoreError::already_cancelled("Order", &order.id));
    }

    let mut cancelled = 0;
    for it in items.iter_mut().filter(|i| i.status != OrderStatus::Cancelled) {
        let receipt = it.item_receipt;
        match it.product_id.as_ref().and_then(|id| products.get_mut(id)) {
            Some(p) => item::cancel_onto(it, p, receipt),
            None => item::zero_cancelled(it),
        }
        cancelled += 1;
    }

    mark_cancelled(order);
    Ok(cancelled)
}

/// Refreshes `item_pending` and the order status from the item statuses.
///
/// ## Rules
/// ```text
/// one item, Pending                     → item_pending = 0, order Pending
/// several items, some Done              → item_pending = count(Pending)
/// several items, none Done, all Pending → item_pending = 0, order Pending
/// several items, none Done, mixed       → unchanged
/// no items / one non-Pending item       → item_pending = 0
/// non-empty and all Cancelled           → order Cancelled, totals zeroed
/// ```
pub fn refresh_item_pending(order: &mut Order, items: &[OrderItem]) {
    let pending = items
        .iter()
        .filter(|i| i.status == OrderStatus::Pending)
        .count() as i64;
    let done_exists = items.iter().any(|i| i.status == OrderStatus::Done);

    match items.len() {
        1 if pending == 1 => {
            order.item_pending = 0;
            order.status = OrderStatus::Pending;
        }
        n if n > 1 => {
            if done_exists {
                order.item_pending = pending;
            } else if pending == n as i64 {
                order.item_pending = 0;
                order.status = OrderStatus::Pending;
            }
        }
        _ => order.item_pending = 0,
    }

    let all_cancelled =
        !items.is_empty() && items.iter().all(|i| i.status == OrderStatus::Cancelled);
    if all_cancelled && order.status != OrderStatus::Cancelled {
        mark_cancelled(order);
    }
}

/// Receipt id for a new Receipt order, given how many receipted orders
/// existed before it.
///
/// ```rust
/// use depot_core::order::receipt_id;
///
/// assert_eq!(receipt_id(0), "0000");
/// assert_eq!(receipt_id(42), "0042");
/// ```
pub fn receipt_id(existing_receipted: i64) -> String {
    format!("{:0width$}", existing_receipted, width = RECEIPT_ID_WIDTH)
}

fn mark_cancelled(order: &mut Order) {
    order.status = OrderStatus::Cancelled;
    order.item_pending = 0;
    order.sub_total = Money::zero();
    order.vat = Money::zero();
    order.total_amount = Money::zero();
    order.payment_status = PaymentStatus::Unpaid;
    order.paid_amount = Money::zero();
    order.unpaid_amount = Money::zero();
    order.updated_at = Utc::now();
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::create_item;
    use crate::request::NewOrderItem;
    use crate::testing::{order, priced, product};
    use crate::types::ReceiptMode;

    fn item_for(o: &Order, p: &mut Product, quantity: Option<i64>, package: Option<i64>) -> OrderItem {
        let req = NewOrderItem {
            product_id: p.id.clone(),
            quantity,
            package,
            unit_price: None,
            unit: None,
        };
        create_item(o, p, &req).unwrap()
    }

    #[test]
    fn test_receipt_order_totals() {
        // 10 × 5.00 with VAT: 50.00 + 7.50 = 57.50, Paid
        let mut o = order(ReceiptMode::Receipt, PaymentStatus::Paid);
        let mut p = priced(product(100, None, None), 500, None);
        let items = vec![item_for(&o, &mut p, Some(10), None)];

        recompute_totals(&mut o, &items, TaxRate::default());

        assert_eq!(o.sub_total.cents(), 5000);
        assert_eq!(o.vat.cents(), 750);
        assert_eq!(o.total_amount.cents(), 5750);
        assert_eq!(o.paid_amount.cents(), 5750);
        assert!(o.unpaid_amount.is_zero());
        assert_eq!(p.stock, Some(90));
    }

    #[test]
    fn test_no_receipt_order_has_no_vat() {
        let mut o = order(ReceiptMode::NoReceipt, PaymentStatus::Unpaid);
        let mut p = priced(product(100, None, None), 500, None);
        let items = vec![item_for(&o, &mut p, Some(10), None)];

        recompute_totals(&mut o, &items, TaxRate::default());
        assert!(o.vat.is_zero());
        assert_eq!(o.total_amount, o.sub_total);
        assert_eq!(o.unpaid_amount.cents(), 5000);
    }

    #[test]
    fn test_totals_invariant() {
        let mut o = order(ReceiptMode::Receipt, PaymentStatus::Pending);
        o.paid_amount = Money::from_cents(1234);
        let mut p = priced(product(1000, None, None), 333, None);
        let items: Vec<_> = (1..=5).map(|q| item_for(&o, &mut p, Some(q), None)).collect();

        recompute_totals(&mut o, &items, TaxRate::default());
        assert_eq!(o.total_amount, o.sub_total + o.vat);
        assert_eq!(o.paid_amount + o.unpaid_amount, o.total_amount);
    }

    #[test]
    fn test_cancel_order_restores_every_product() {
        let mut o = order(ReceiptMode::Receipt, PaymentStatus::Paid);
        let mut a = priced(product(100, Some(10), Some(10)), 500, None);
        let mut b = priced(product(40, None, None), 200, None);
        a.receipt_no = Some(100);
        let (a_before, b_before) = (a.clone(), b.clone());

        let mut items = vec![
            item_for(&o, &mut a, None, Some(2)),
            item_for(&o, &mut b, Some(7), None),
            item_for(&o, &mut a, Some(5), None),
        ];
        recompute_totals(&mut o, &items, TaxRate::default());

        let mut products = HashMap::from([(a.id.clone(), a), (b.id.clone(), b)]);
        let cancelled = cancel_order(&mut o, &mut items, &mut products).unwrap();

        assert_eq!(cancelled, 3);
        let a = &products[&a_before.id];
        let b = &products[&b_before.id];
        assert_eq!((a.stock, a.package, a.receipt_no), (a_before.stock, a_before.package, a_before.receipt_no));
        assert_eq!(b.stock, b_before.stock);
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert_eq!(o.payment_status, PaymentStatus::Unpaid);
        assert!(o.total_amount.is_zero() && o.paid_amount.is_zero() && o.unpaid_amount.is_zero());
        assert!(items.iter().all(|i| i.status == OrderStatus::Cancelled && i.price.is_zero()));

        assert!(matches!(
            cancel_order(&mut o, &mut items, &mut products),
            Err(CoreError::AlreadyCancelled { .. })
        ));
    }

    #[test]
    fn test_cancel_order_skips_already_cancelled_items() {
        let mut o = order(ReceiptMode::NoReceipt, PaymentStatus::Paid);
        let mut p = priced(product(100, None, None), 100, None);
        let mut items = vec![
            item_for(&o, &mut p, Some(10), None),
            item_for(&o, &mut p, Some(5), None),
        ];
        item::cancel_onto(&mut items[0], &mut p, ReceiptMode::NoReceipt);
        assert_eq!(p.stock, Some(95));

        let mut products = HashMap::from([(p.id.clone(), p)]);
        assert_eq!(cancel_order(&mut o, &mut items, &mut products).unwrap(), 1);
        assert_eq!(products.values().next().unwrap().stock, Some(100));
    }

    fn with_statuses(statuses: &[OrderStatus]) -> (Order, Vec<OrderItem>) {
        let o = order(ReceiptMode::NoReceipt, PaymentStatus::Paid);
        let mut p = priced(product(100, None, None), 100, None);
        let items = statuses
            .iter()
            .map(|s| {
                let mut i = item_for(&o, &mut p, Some(1), None);
                i.status = *s;
                i
            })
            .collect();
        (o, items)
    }

    #[test]
    fn test_item_pending_single_pending_item() {
        let (mut o, items) = with_statuses(&[OrderStatus::Pending]);
        refresh_item_pending(&mut o, &items);
        assert_eq!(o.item_pending, 0);
        assert_eq!(o.status, OrderStatus::Pending);
    }

    #[test]
    fn test_item_pending_counts_when_some_done() {
        let (mut o, items) = with_statuses(&[
            OrderStatus::Done,
            OrderStatus::Pending,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
        ]);
        refresh_item_pending(&mut o, &items);
        assert_eq!(o.item_pending, 2);
        assert_eq!(o.status, OrderStatus::Done);
    }

    #[test]
    fn test_item_pending_all_pending() {
        let (mut o, items) = with_statuses(&[OrderStatus::Pending, OrderStatus::Pending]);
        o.item_pending = 5;
        refresh_item_pending(&mut o, &items);
        assert_eq!(o.item_pending, 0);
        assert_eq!(o.status, OrderStatus::Pending);
    }

    #[test]
    fn test_item_pending_mixed_without_done_is_unchanged() {
        let (mut o, items) = with_statuses(&[OrderStatus::Pending, OrderStatus::Cancelled]);
        o.item_pending = 3;
        refresh_item_pending(&mut o, &items);
        assert_eq!(o.item_pending, 3);
        assert_eq!(o.status, OrderStatus::Done);
    }

    #[test]
    fn test_all_cancelled_items_cancel_the_order() {
        let (mut o, items) = with_statuses(&[OrderStatus::Cancelled, OrderStatus::Cancelled]);
        o.total_amount = Money::from_cents(500);
        refresh_item_pending(&mut o, &items);
        assert_eq!(o.status, OrderStatus::Cancelled);
        assert!(o.total_amount.is_zero());
        assert_eq!(o.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_no_items() {
        let (mut o, _) = with_statuses(&[]);
        o.item_pending = 2;
        refresh_item_pending(&mut o, &[]);
        assert_eq!(o.item_pending, 0);
        assert_eq!(o.status, OrderStatus::Done);
    }

    #[test]
    fn test_receipt_id_padding() {
        assert_eq!(receipt_id(0), "0000");
        assert_eq!(receipt_id(7), "0007");
        assert_eq!(receipt_id(12345), "12345");
    }
}
