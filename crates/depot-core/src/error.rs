//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → API layer               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is recoverable. Nothing in the ledger aborts the process.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
///
/// Raised before anything is written: a failing operation never leaves a
/// partially decremented product or a half-recomputed order behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Reservation exceeds the units on hand.
    ///
    /// ## When This Occurs
    /// - Creating an item with `quantity > product.stock`
    /// - Reserving packages whose unit count exceeds stock
    /// - Raising an item quantity beyond what is left
    ///
    /// ## User Workflow
    /// ```text
    /// Order item (qty: 150)
    ///      │
    ///      ▼
    /// Check stock: available=100
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Cement 50kg", available: 100, requested: 150 }
    ///      │
    ///      ▼
    /// Whole order mutation rolled back
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Reservation exceeds the unreserved package count.
    #[error("Insufficient package for {product}: available {available}, requested {requested}")]
    InsufficientPackage {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Non-positive quantity supplied.
    #[error("Quantity must be greater than zero, got {0}")]
    InvalidQuantity(i64),

    /// Non-positive package count supplied.
    #[error("Package must be greater than zero, got {0}")]
    InvalidPackage(i64),

    /// The product has no stock figure at all.
    #[error("Product {0} stock is not available")]
    StockUnavailable(String),

    /// A package operation on a product without `piece`.
    #[error("Product {0} has no package size defined")]
    PackagingUndefined(String),

    /// Product referenced by an item no longer exists.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Mutation attempted on a Cancelled item or order.
    ///
    /// ## When This Occurs
    /// - Changing quantity, package or price of a cancelled item
    /// - Cancelling an item or order a second time
    #[error("{entity} {id} is already cancelled")]
    AlreadyCancelled { entity: String, id: String },

    /// Direct cancellation by a role that needs approval.
    ///
    /// The item or order has been moved to Pending and a "Request Cancel"
    /// log entry exists by the time the caller sees this.
    #[error("{entity} {id}: cancellation is pending manager/admin approval")]
    UnauthorizedCancellation { entity: String, id: String },

    /// Quantity or package edits on an item that is not Done.
    #[error("Order item {0} is pending; only Done items can change quantity or package")]
    ItemPending(String),

    /// Status change the item state machine does not allow.
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// Paid amount would leave `[0, total]`.
    #[error("Paid amount {paid} must be between 0.00 and {total}")]
    PaidAmountOutOfRange { paid: Money, total: Money },

    /// Duplicate unique key.
    ///
    /// ## When This Occurs
    /// - Category name already taken
    /// - Product with the same name, category and color code exists
    #[error("A {entity} with this {key} already exists")]
    IntegrityConflict { entity: String, key: String },

    /// A line, expense or performa id that is not part of the record being
    /// updated.
    #[error("{entity} {id} does not belong to this record")]
    UnknownChild { entity: String, id: String },

    /// Retries exhausted on a contended write.
    #[error("{operation} did not complete after {attempts} attempts")]
    ConcurrencyConflict { operation: String, attempts: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub(crate) fn already_cancelled(entity: &str, id: &str) -> Self {
        CoreError::AlreadyCancelled {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request payloads don't meet requirements.
/// Used for early validation before any stock is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} can't be negative")]
    Negative { field: String },

    /// Two fields that must not be given together.
    #[error("{first} and {second} cannot both be set")]
    MutuallyExclusive { first: String, second: String },

    /// Collection exceeds its allowed size.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    /// `OutOfRange` for a value that must stay within `0..=max`.
    pub(crate) fn too_large(field: &str, max: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
