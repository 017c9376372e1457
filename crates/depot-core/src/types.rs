//! # Domain Types
//!
//! Core domain types used throughout the ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  stock          │   │  sub_total      │   │  quantity       │       │
//! │  │  package        │◄──│  vat            │──►│  package        │       │
//! │  │  piece          │   │  total_amount   │   │  unit_price     │       │
//! │  │  receipt_no     │   │  paid / unpaid  │   │  price, cost    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  PurchaseSupplier ──► PurchaseExpense ──► PurchaseProduct               │
//! │  PerformaCustomer ──► PerformaPerforma ──► PerformaProduct              │
//! │                                                                         │
//! │  PaymentLogEntry (Order / Expense / Supplier)   OrderLogEntry           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Names
//! Enum variants serialize to the exact strings the records carry
//! ("No Receipt", "Sales Manager", "Request Cancel"), both over serde and,
//! with the `sqlx` feature, in TEXT columns. Entity field names equal their
//! column names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (the VAT applied to receipted orders and performas)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_VAT_BPS)
    }
}

// =============================================================================
// Status Enums
// =============================================================================

/// Whether VAT applies and whether `receipt_no` moves with stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum ReceiptMode {
    Receipt,
    #[serde(rename = "No Receipt")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "No Receipt"))]
    NoReceipt,
}

impl ReceiptMode {
    #[inline]
    pub fn is_receipt(&self) -> bool {
        matches!(self, ReceiptMode::Receipt)
    }
}

impl Default for ReceiptMode {
    fn default() -> Self {
        ReceiptMode::NoReceipt
    }
}

/// Fulfilment status, shared by orders and order items.
///
/// ```text
/// Pending ──► Done
///    │          │
///    └────┬─────┘
///         ▼
///     Cancelled   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum OrderStatus {
    Pending,
    Done,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Done => "Done",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Done
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of an order, expense or supplier purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Pending => "Pending",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Role of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum Role {
    Admin,
    Manager,
    #[serde(rename = "Sales Manager")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Sales Manager"))]
    SalesManager,
    Salesman,
}

/// The authenticated actor injected into every mutating call.
///
/// Used for log attribution and the cancellation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Actor {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Actor {
            name: name.into(),
            email: email.into(),
            role,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product category. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Goods supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_info: Option<String>,
    pub tin_number: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Customer record referenced by orders and performas.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub tin_number: Option<String>,
    pub vat_number: Option<String>,
    pub fs_number: Option<String>,
    pub zone: Option<String>,
    pub city: Option<String>,
    pub sub_city: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
///
/// ## Stock Representation
/// ```text
/// stock = package × piece + remainder
///
///   stock=105, piece=10  →  package=10 (5 loose units)
/// ```
/// `stock` is `None` for products that were never stocked; the ledger
/// refuses to sell them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, also used in error messages.
    pub name: String,

    pub category_id: Option<String>,
    pub supplier_id: Option<String>,
    pub description: Option<String>,

    /// Default unit for new items ("Pcs", "Box", ...).
    pub unit: Option<String>,

    pub color_code: Option<String>,

    /// Units on hand.
    pub stock: Option<i64>,

    /// Unreserved package count.
    pub package: Option<i64>,

    /// Units per package.
    pub piece: Option<i64>,

    pub buying_price: Option<Money>,
    pub selling_price: Option<Money>,

    /// Receipted-unit counter, moves with Receipt order items only.
    pub receipt_no: Option<i64>,

    /// Optimistic concurrency counter, bumped on every stock write.
    pub version: i64,

    pub created_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Units per package, if the product is sold in packages.
    ///
    /// A zero or negative `piece` is treated as "no packaging".
    #[inline]
    pub fn piece_size(&self) -> Option<i64> {
        self.piece.filter(|p| *p > 0)
    }

    /// Whether `package` is kept in step with `stock`.
    #[inline]
    pub fn tracks_packages(&self) -> bool {
        self.piece_size().is_some() && self.package.is_some()
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: OrderStatus,
    pub receipt: ReceiptMode,

    /// Zero-padded sequence, only for Receipt orders.
    pub receipt_id: Option<String>,

    pub sub_total: Money,
    pub vat: Money,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub paid_amount: Money,
    pub unpaid_amount: Money,

    /// Number of Pending items while at least one item is Done.
    pub item_pending: i64,

    pub created_by: String,
    pub created_by_email: String,
    pub created_by_role: Role,

    #[ts(as = "String")]
    pub order_date: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates an empty order with zeroed totals.
    pub fn new(
        actor: &Actor,
        customer_id: Option<String>,
        receipt: ReceiptMode,
        payment_status: PaymentStatus,
        receipt_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Order {
            id: new_id(),
            customer_id,
            status: OrderStatus::Done,
            receipt,
            receipt_id,
            sub_total: Money::zero(),
            vat: Money::zero(),
            total_amount: Money::zero(),
            payment_status,
            paid_amount: Money::zero(),
            unpaid_amount: Money::zero(),
            item_pending: 0,
            created_by: actor.name.clone(),
            created_by_email: actor.email.clone(),
            created_by_role: actor.role,
            order_date: now,
            updated_at: now,
        }
    }
}

/// A line of an order, always owned by exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,

    /// Nullable: the product may be removed from the catalog later.
    pub product_id: Option<String>,

    /// Product name at the time the item was created.
    pub product_name: String,

    pub unit: Option<String>,
    pub quantity: i64,

    /// Set when the item was ordered by the package.
    pub package: Option<i64>,

    pub unit_price: Money,

    /// `unit_price × quantity`, persisted.
    pub price: Money,

    pub cost: Money,
    pub item_receipt: ReceiptMode,
    pub status: OrderStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Purchases
// =============================================================================

/// Supplier-level purchase aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseSupplier {
    pub id: String,
    pub supplier_id: Option<String>,
    pub supplier_name: Option<String>,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub paid_amount: Money,
    pub unpaid_amount: Money,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One purchase from a supplier, made of product lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseExpense {
    pub id: String,
    pub supplier_level_id: String,
    pub supplier_name: Option<String>,
    pub total: Money,
    pub payment_status: PaymentStatus,
    pub paid_amount: Money,
    pub unpaid_amount: Money,
    pub created_by: String,
    #[ts(as = "String")]
    pub purchase_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Purchase line. Free-text product, no stock linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseProduct {
    pub id: String,
    pub expense_id: String,
    pub product: String,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

// =============================================================================
// Performas
// =============================================================================

/// Customer-level quotation aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PerformaCustomer {
    pub id: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,

    /// Σ performa totals.
    pub total_amount: Money,

    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A non-binding price quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PerformaPerforma {
    pub id: String,
    pub customer_level_id: String,
    pub customer_name: Option<String>,
    pub receipt: ReceiptMode,
    pub sub_total: Money,
    pub vat: Money,
    pub total: Money,
    pub created_by: String,
    #[ts(as = "String")]
    pub issued_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Performa line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PerformaProduct {
    pub id: String,
    pub performa_id: String,
    pub product: String,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

// =============================================================================
// Logs
// =============================================================================

/// Which aggregate a payment log entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum LogSubject {
    Order,
    Expense,
    Supplier,
}

/// Kind of payment log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum ChangeType {
    #[serde(rename = "Status Create")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Status Create"))]
    StatusCreate,
    #[serde(rename = "Payment Create")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Payment Create"))]
    PaymentCreate,
    #[serde(rename = "Status Change")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Status Change"))]
    StatusChange,
    #[serde(rename = "Payment Update")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Payment Update"))]
    PaymentUpdate,
}

/// Immutable record of one watched payment field changing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentLogEntry {
    pub id: String,
    pub subject: LogSubject,
    pub subject_id: String,

    /// Customer or supplier label at the time of the change.
    pub party: Option<String>,

    pub change_type: ChangeType,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub user_name: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Action recorded in the order action log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum OrderAction {
    Create,
    Update,
    Delete,
    #[serde(rename = "Request Cancel")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Request Cancel"))]
    RequestCancel,
}

/// Item- and order-level action history (not payment related).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLogEntry {
    pub id: String,
    pub user_name: String,
    pub action: OrderAction,

    /// "Order" or "OrderItem".
    pub model_name: String,

    pub object_id: String,
    pub customer_info: Option<String>,
    pub product_name: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<Money>,

    /// JSON description of what changed.
    pub changes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
