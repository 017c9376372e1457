//! # Request Payloads
//!
//! Inputs of the ledger operations. Everything deserializes from the JSON an
//! HTTP layer would forward; optional fields mean "leave unchanged" on
//! updates.
//!
//! ## Quantity or Package
//! Item payloads carry `quantity` and `package` as two optional fields.
//! Exactly one must be set when creating an item and at most one when
//! updating; see [`crate::stock::StockRequest::from_parts`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{OrderStatus, PaymentStatus, ReceiptMode};

// =============================================================================
// Orders
// =============================================================================

/// One line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrderItem {
    pub product_id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub package: Option<i64>,

    /// Overrides the product's selling price.
    #[serde(default)]
    pub unit_price: Option<Money>,

    /// Overrides the product's unit label.
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateOrder {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub receipt: ReceiptMode,
    pub payment_status: PaymentStatus,

    /// Initial paid amount, only meaningful for Pending orders.
    #[serde(default)]
    pub paid_amount: Money,

    pub items: Vec<NewOrderItem>,
}

/// Changes to one existing order item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemChanges {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub package: Option<i64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub unit_price: Option<Money>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.package.is_none()
            && self.status.is_none()
            && self.unit_price.is_none()
    }
}

/// Entry of an order's replacement item set.
///
/// With an `id` it updates that item, without one it creates a new item
/// from `product_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub package: Option<i64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub unit_price: Option<Money>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl OrderItemEntry {
    pub fn changes(&self) -> ItemChanges {
        ItemChanges {
            quantity: self.quantity,
            package: self.package,
            status: self.status,
            unit_price: self.unit_price,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdateOrder {
    /// Only `Cancelled` has an effect on the order itself.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,

    /// Added to the current paid amount.
    #[serde(default)]
    pub paid_amount_delta: Option<Money>,

    /// Replaces the item set when present.
    #[serde(default)]
    pub items: Option<Vec<OrderItemEntry>>,
}

// =============================================================================
// Purchases
// =============================================================================

/// A purchase or performa line. `id` selects an existing line on updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineInput {
    #[serde(default)]
    pub id: Option<String>,
    pub product: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewExpense {
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub paid_amount: Money,
    pub lines: Vec<LineInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreatePurchaseSupplier {
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub expenses: Vec<NewExpense>,
}

/// Expense entry of a supplier update.
///
/// New expenses (no `id`) take `paid_amount` as their initial paid amount;
/// existing ones add it to what was already paid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpenseEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub paid_amount: Option<Money>,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdatePurchaseSupplier {
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub expenses: Vec<ExpenseEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdatePurchaseExpense {
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub paid_amount_delta: Option<Money>,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

// =============================================================================
// Performas
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PerformaEntry {
    #[serde(default)]
    pub id: Option<String>,

    /// Defaults to Receipt for new performas.
    #[serde(default)]
    pub receipt: Option<ReceiptMode>,

    #[serde(default)]
    pub lines: Vec<LineInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreatePerformaCustomer {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub performas: Vec<PerformaEntry>,
}

/// Replaces the customer's performas; omitted performas and lines are
/// deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UpdatePerformaCustomer {
    pub performas: Vec<PerformaEntry>,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub color_code: Option<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub package: Option<i64>,
    #[serde(default)]
    pub piece: Option<i64>,
    #[serde(default)]
    pub buying_price: Option<Money>,
    #[serde(default)]
    pub selling_price: Option<Money>,
    #[serde(default)]
    pub receipt_no: Option<i64>,
}

/// Catalog stock correction: whole packages or loose units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Restock {
    Packages(i64),
    Units(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub tin_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tin_number: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub fs_number: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub sub_city: Option<String>,
}
