//! # Settlement
//!
//! The payment-status state machine shared by orders, purchase expenses and
//! purchase suppliers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  status    │ paid_amount          │ unpaid_amount                       │
//! │────────────┼──────────────────────┼─────────────────────────────────────│
//! │  Paid      │ total                │ 0                                   │
//! │  Unpaid    │ 0                    │ total                               │
//! │  Pending   │ as recorded          │ max(total - paid, 0)                │
//! │            │                      │   == 0  ──► promoted to Paid        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! After `settle`, `paid + unpaid == total` holds whenever `paid <= total`.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Order, PaymentStatus, PurchaseExpense, PurchaseSupplier};

/// Anything with a total and a running paid/unpaid balance.
pub trait Payable {
    fn payable_total(&self) -> Money;
    fn payment_status(&self) -> PaymentStatus;
    fn paid_amount(&self) -> Money;
    fn unpaid_amount(&self) -> Money;
    fn set_payment(&mut self, status: PaymentStatus, paid: Money, unpaid: Money);
}

/// Recomputes paid/unpaid from the current status and total.
pub fn settle<P: Payable + ?Sized>(payable: &mut P) {
    let total = payable.payable_total();

    match payable.payment_status() {
        PaymentStatus::Paid => payable.set_payment(PaymentStatus::Paid, total, Money::zero()),
        PaymentStatus::Unpaid => payable.set_payment(PaymentStatus::Unpaid, Money::zero(), total),
        PaymentStatus::Pending => {
            let paid = payable.paid_amount();
            let unpaid = (total - paid).non_negative();
            if unpaid.is_zero() {
                payable.set_payment(PaymentStatus::Paid, total, Money::zero());
            } else {
                payable.set_payment(PaymentStatus::Pending, paid, unpaid);
            }
        }
    }
}

/// Sets an explicit status and settles.
pub fn set_status<P: Payable + ?Sized>(payable: &mut P, status: PaymentStatus) {
    let paid = payable.paid_amount();
    let unpaid = payable.unpaid_amount();
    payable.set_payment(status, paid, unpaid);
    settle(payable);
}

/// Adds `delta` to the paid amount.
///
/// ## Rules
/// - The new paid amount must stay within `[0, total]`
/// - A non-zero delta on an Unpaid balance moves it to Pending
/// - A negative delta on a Paid balance moves it to Pending
///
/// ## Example
/// ```text
/// total=100.00 Unpaid  + 40.00  ──► Pending paid=40.00 unpaid=60.00
///                      + 60.00  ──► Paid    paid=100.00 unpaid=0.00
/// ```
pub fn apply_paid_delta<P: Payable + ?Sized>(payable: &mut P, delta: Money) -> CoreResult<()> {
    let total = payable.payable_total();
    let paid = payable.paid_amount() + delta;
    if paid.is_negative() || paid > total {
        return Err(CoreError::PaidAmountOutOfRange { paid, total });
    }

    let status = match payable.payment_status() {
        PaymentStatus::Unpaid if !delta.is_zero() => PaymentStatus::Pending,
        PaymentStatus::Paid if delta.is_negative() => PaymentStatus::Pending,
        other => other,
    };

    let unpaid = payable.unpaid_amount();
    payable.set_payment(status, paid, unpaid);
    settle(payable);
    Ok(())
}

// =============================================================================
// Implementations
// =============================================================================

impl Payable for Order {
    fn payable_total(&self) -> Money {
        self.total_amount
    }

    fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    fn unpaid_amount(&self) -> Money {
        self.unpaid_amount
    }

    fn set_payment(&mut self, status: PaymentStatus, paid: Money, unpaid: Money) {
        self.payment_status = status;
        self.paid_amount = paid;
        self.unpaid_amount = unpaid;
    }
}

impl Payable for PurchaseExpense {
    fn payable_total(&self) -> Money {
        self.total
    }

    fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    fn unpaid_amount(&self) -> Money {
        self.unpaid_amount
    }

    fn set_payment(&mut self, status: PaymentStatus, paid: Money, unpaid: Money) {
        self.payment_status = status;
        self.paid_amount = paid;
        self.unpaid_amount = unpaid;
    }
}

impl Payable for PurchaseSupplier {
    fn payable_total(&self) -> Money {
        self.total_amount
    }

    fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    fn unpaid_amount(&self) -> Money {
        self.unpaid_amount
    }

    fn set_payment(&mut self, status: PaymentStatus, paid: Money, unpaid: Money) {
        self.payment_status = status;
        self.paid_amount = paid;
        self.unpaid_amount = unpaid;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;
    use crate::types::ReceiptMode;

    fn order_with_total(status: PaymentStatus, cents: i64) -> Order {
        let mut o = order(ReceiptMode::NoReceipt, status);
        o.sub_total = Money::from_cents(cents);
        o.total_amount = Money::from_cents(cents);
        settle(&mut o);
        o
    }

    #[test]
    fn test_settle_paid_and_unpaid() {
        let o = order_with_total(PaymentStatus::Paid, 5750);
        assert_eq!((o.paid_amount.cents(), o.unpaid_amount.cents()), (5750, 0));

        let o = order_with_total(PaymentStatus::Unpaid, 5750);
        assert_eq!((o.paid_amount.cents(), o.unpaid_amount.cents()), (0, 5750));
    }

    #[test]
    fn test_pending_promotes_when_fully_paid() {
        let mut o = order_with_total(PaymentStatus::Unpaid, 10000);

        apply_paid_delta(&mut o, Money::from_cents(4000)).unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Pending);
        assert_eq!(o.unpaid_amount.cents(), 6000);

        apply_paid_delta(&mut o, Money::from_cents(6000)).unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert_eq!(o.paid_amount.cents(), 10000);
        assert_eq!(o.unpaid_amount, Money::zero());
    }

    #[test]
    fn test_paid_delta_out_of_range_leaves_balance() {
        let mut o = order_with_total(PaymentStatus::Unpaid, 10000);
        let before = o.clone();

        let err = apply_paid_delta(&mut o, Money::from_cents(12000)).unwrap_err();
        assert_eq!(
            err,
            CoreError::PaidAmountOutOfRange {
                paid: Money::from_cents(12000),
                total: Money::from_cents(10000),
            }
        );
        assert_eq!(o, before);

        assert!(apply_paid_delta(&mut o, Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_refund_on_paid_moves_to_pending() {
        let mut o = order_with_total(PaymentStatus::Paid, 10000);
        apply_paid_delta(&mut o, Money::from_cents(-2500)).unwrap();
        assert_eq!(o.payment_status, PaymentStatus::Pending);
        assert_eq!((o.paid_amount.cents(), o.unpaid_amount.cents()), (7500, 2500));
    }

    #[test]
    fn test_total_drop_below_paid_promotes() {
        let mut o = order_with_total(PaymentStatus::Unpaid, 10000);
        apply_paid_delta(&mut o, Money::from_cents(8000)).unwrap();

        o.total_amount = Money::from_cents(6000);
        settle(&mut o);
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert_eq!(o.paid_amount.cents(), 6000);
    }

    #[test]
    fn test_balance_invariant_holds_after_settle() {
        for status in [PaymentStatus::Paid, PaymentStatus::Unpaid, PaymentStatus::Pending] {
            for paid in [0, 1, 2500, 9999] {
                let mut o = order(ReceiptMode::NoReceipt, status);
                o.total_amount = Money::from_cents(10000);
                o.paid_amount = Money::from_cents(paid);
                settle(&mut o);
                assert_eq!(o.paid_amount + o.unpaid_amount, o.total_amount);
                if o.payment_status == PaymentStatus::Paid {
                    assert!(o.unpaid_amount.is_zero());
                }
            }
        }
    }

    #[test]
    fn test_set_status() {
        let mut o = order_with_total(PaymentStatus::Unpaid, 3000);
        set_status(&mut o, PaymentStatus::Paid);
        assert_eq!(o.paid_amount.cents(), 3000);
        set_status(&mut o, PaymentStatus::Unpaid);
        assert_eq!(o.unpaid_amount.cents(), 3000);
        assert!(o.paid_amount.is_zero());
    }
}
