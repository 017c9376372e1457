//! # Purchase Aggregate
//!
//! Supplier purchases: a supplier record owns expenses, an expense owns
//! line products. No stock linkage.
//!
//! ## Rollup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PurchaseProduct.total_price = quantity × unit_price                    │
//! │           │                                                             │
//! │           ▼  Σ                                                          │
//! │  PurchaseExpense.total        (no VAT) ──► settle(expense)              │
//! │           │                                                             │
//! │           ▼  Σ total, Σ paid, Σ unpaid                                  │
//! │  PurchaseSupplier             ──► settle(supplier)                      │
//! │                                   all expenses Paid ──► supplier Paid   │
//! │                                                                         │
//! │  Supplier Paid ──► cascade: every expense Paid, paid = total            │
//! │  New expense / new lines on a Paid parent ──► parent back to Pending   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::money::{line_total, Money};
use crate::request::{LineInput, NewExpense};
use crate::settlement::{self, Payable};
use crate::types::{
    new_id, Actor, PaymentStatus, PerformaProduct, PurchaseExpense, PurchaseProduct,
    PurchaseSupplier,
};
use crate::validation::validate_line;

// =============================================================================
// Lines
// =============================================================================

/// A priced line owned by an expense or a performa.
pub trait Line: Sized {
    /// Entity name used in errors.
    const ENTITY: &'static str;

    fn build(parent_id: &str, input: &LineInput) -> CoreResult<Self>;
    fn id(&self) -> &str;
    fn apply(&mut self, input: &LineInput) -> CoreResult<()>;
    fn total_price(&self) -> Money;
}

/// Ids touched by [`merge_lines`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMerge {
    pub created: Vec<String>,
    pub updated: Vec<String>,

    /// Existing lines the input did not mention.
    pub omitted: Vec<String>,
}

impl LineMerge {
    pub fn added_lines(&self) -> bool {
        !self.created.is_empty()
    }
}

/// Merges `inputs` into `lines`: inputs with an id update that line, inputs
/// without one append a new line. Every input is validated first.
pub fn merge_lines<L: Line>(
    parent_id: &str,
    lines: &mut Vec<L>,
    inputs: &[LineInput],
) -> CoreResult<LineMerge> {
    for input in inputs {
        validate_line(input)?;
        line_total(input.unit_price, input.quantity, "total_price")?;
        if let Some(id) = input.id.as_deref() {
            if !lines.iter().any(|l| l.id() == id) {
                return Err(CoreError::UnknownChild {
                    entity: L::ENTITY.to_string(),
                    id: id.to_string(),
                });
            }
        }
    }

    let mut merge = LineMerge::default();
    for input in inputs {
        match input.id.as_deref() {
            Some(id) => {
                if let Some(line) = lines.iter_mut().find(|l| l.id() == id) {
                    line.apply(input)?;
                    merge.updated.push(id.to_string());
                }
            }
            None => {
                let line = L::build(parent_id, input)?;
                merge.created.push(line.id().to_string());
                lines.push(line);
            }
        }
    }

    merge.omitted = lines
        .iter()
        .map(|l| l.id().to_string())
        .filter(|id| !merge.created.contains(id) && !merge.updated.contains(id))
        .collect();
    Ok(merge)
}

impl Line for PurchaseProduct {
    const ENTITY: &'static str = "Purchase product";

    fn build(parent_id: &str, input: &LineInput) -> CoreResult<Self> {
        Ok(PurchaseProduct {
            id: new_id(),
            expense_id: parent_id.to_string(),
            product: input.product.trim().to_string(),
            unit: input.unit.clone(),
            description: input.description.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_price: line_total(input.unit_price, input.quantity, "total_price")?,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, input: &LineInput) -> CoreResult<()> {
        self.total_price = line_total(input.unit_price, input.quantity, "total_price")?;
        self.product = input.product.trim().to_string();
        self.unit = input.unit.clone().or_else(|| self.unit.take());
        self.description = input.description.clone().or_else(|| self.description.take());
        self.quantity = input.quantity;
        self.unit_price = input.unit_price;
        Ok(())
    }

    fn total_price(&self) -> Money {
        self.total_price
    }
}

impl Line for PerformaProduct {
    const ENTITY: &'static str = "Performa product";

    fn build(parent_id: &str, input: &LineInput) -> CoreResult<Self> {
        Ok(PerformaProduct {
            id: new_id(),
            performa_id: parent_id.to_string(),
            product: input.product.trim().to_string(),
            unit: input.unit.clone(),
            description: input.description.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            total_price: line_total(input.unit_price, input.quantity, "total_price")?,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, input: &LineInput) -> CoreResult<()> {
        self.total_price = line_total(input.unit_price, input.quantity, "total_price")?;
        self.product = input.product.trim().to_string();
        self.unit = input.unit.clone().or_else(|| self.unit.take());
        self.description = input.description.clone().or_else(|| self.description.take());
        self.quantity = input.quantity;
        self.unit_price = input.unit_price;
        Ok(())
    }

    fn total_price(&self) -> Money {
        self.total_price
    }
}

// =============================================================================
// Supplier / Expense Construction
// =============================================================================

/// A new, empty supplier purchase record.
pub fn new_supplier(
    actor: &Actor,
    supplier_id: Option<String>,
    supplier_name: Option<String>,
    payment_status: PaymentStatus,
) -> PurchaseSupplier {
    let now = Utc::now();
    PurchaseSupplier {
        id: new_id(),
        supplier_id,
        supplier_name,
        total_amount: Money::zero(),
        payment_status,
        paid_amount: Money::zero(),
        unpaid_amount: Money::zero(),
        created_by: actor.name.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Builds a settled expense and its lines under `supplier`.
///
/// ## Errors
/// `PaidAmountOutOfRange` when the requested paid amount exceeds the
/// expense total or is negative.
pub fn new_expense(
    actor: &Actor,
    supplier: &PurchaseSupplier,
    request: &NewExpense,
) -> CoreResult<(PurchaseExpense, Vec<PurchaseProduct>)> {
    let now = Utc::now();
    let mut expense = PurchaseExpense {
        id: new_id(),
        supplier_level_id: supplier.id.clone(),
        supplier_name: supplier.supplier_name.clone(),
        total: Money::zero(),
        payment_status: request.payment_status,
        paid_amount: Money::zero(),
        unpaid_amount: Money::zero(),
        created_by: actor.name.clone(),
        purchase_date: now,
        updated_at: now,
    };

    let mut lines: Vec<PurchaseProduct> = Vec::with_capacity(request.lines.len());
    merge_lines(&expense.id, &mut lines, &request.lines)?;
    expense.total = lines.iter().map(|l| l.total_price).sum();

    let paid = request.paid_amount;
    if paid.is_negative() || paid > expense.total {
        return Err(CoreError::PaidAmountOutOfRange {
            paid,
            total: expense.total,
        });
    }
    if expense.payment_status == PaymentStatus::Pending {
        expense.paid_amount = paid;
    }
    settlement::settle(&mut expense);
    Ok((expense, lines))
}

// =============================================================================
// Expense Updates
// =============================================================================

/// Applies an expense update after its lines were merged.
///
/// ## Steps
/// 1. An explicit status replaces the current one
/// 2. New lines on a Paid expense move it back to Pending
/// 3. `total` = Σ line totals
/// 4. A paid delta is applied unless the expense is Paid
/// 5. Settlement
pub fn update_expense(
    expense: &mut PurchaseExpense,
    lines: &[PurchaseProduct],
    status: Option<PaymentStatus>,
    paid_delta: Option<Money>,
    added_lines: bool,
) -> CoreResult<()> {
    let mut next = expense.clone();

    if let Some(status) = status {
        next.payment_status = status;
    }
    if added_lines && next.payment_status == PaymentStatus::Paid {
        next.payment_status = PaymentStatus::Pending;
    }
    next.total = lines.iter().map(|l| l.total_price).sum();

    match paid_delta {
        Some(delta) if next.payment_status != PaymentStatus::Paid => {
            settlement::apply_paid_delta(&mut next, delta)?;
        }
        _ => settlement::settle(&mut next),
    }

    next.updated_at = Utc::now();
    *expense = next;
    Ok(())
}

/// Moves Paid parents back to Pending when they gain unpaid content.
///
/// The supplier's unpaid amount becomes `total - paid`.
pub fn invalidate_paid(supplier: &mut PurchaseSupplier, expense: Option<&mut PurchaseExpense>) {
    if let Some(expense) = expense {
        if expense.payment_status == PaymentStatus::Paid {
            expense.payment_status = PaymentStatus::Pending;
        }
    }

    if supplier.payment_status == PaymentStatus::Paid {
        supplier.payment_status = PaymentStatus::Pending;
        supplier.unpaid_amount = supplier.total_amount - supplier.paid_amount;
    }
}

// =============================================================================
// Supplier Rollup
// =============================================================================

/// Sums the expenses into the supplier and settles it.
///
/// A supplier whose (non-empty) expenses are all Paid becomes Paid.
pub fn rollup_supplier(supplier: &mut PurchaseSupplier, expenses: &[PurchaseExpense]) {
    supplier.total_amount = expenses.iter().map(|e| e.total).sum();
    supplier.paid_amount = expenses.iter().map(|e| e.paid_amount).sum();
    supplier.unpaid_amount = expenses.iter().map(|e| e.unpaid_amount).sum();

    let all_paid = !expenses.is_empty()
        && expenses
            .iter()
            .all(|e| e.payment_status == PaymentStatus::Paid);
    if all_paid {
        supplier.payment_status = PaymentStatus::Paid;
    }

    settlement::settle(supplier);
    supplier.updated_at = Utc::now();
}

/// Forces every expense of a Paid supplier to Paid.
///
/// ## Returns
/// Ids of the expenses that changed.
pub fn cascade_paid(supplier: &PurchaseSupplier, expenses: &mut [PurchaseExpense]) -> Vec<String> {
    if supplier.payment_status != PaymentStatus::Paid {
        return Vec::new();
    }

    let mut changed = Vec::new();
    for expense in expenses.iter_mut() {
        let already = expense.payment_status == PaymentStatus::Paid
            && expense.paid_amount == expense.total
            && expense.unpaid_amount.is_zero();
        if !already {
            let total = expense.payable_total();
            expense.set_payment(PaymentStatus::Paid, total, Money::zero());
            expense.updated_at = Utc::now();
            changed.push(expense.id.clone());
        }
    }
    changed
}

/// Rollup, then the Paid cascade, then a second rollup so the supplier sums
/// reflect the cascaded expenses.
///
/// ## Returns
/// Ids of the expenses changed by the cascade.
pub fn reconcile_supplier(
    supplier: &mut PurchaseSupplier,
    expenses: &mut [PurchaseExpense],
) -> Vec<String> {
    rollup_supplier(supplier, expenses);
    let changed = cascade_paid(supplier, expenses);
    if !changed.is_empty() {
        rollup_supplier(supplier, expenses);
    }
    changed
}

// =============================================================================
// Unit Tests
// =============================================================================
