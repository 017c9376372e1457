//! # Validation Module
//!
//! Payload checks run before a ledger operation touches any row.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  └── Shapes and types of request payloads                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Names, line quantities, prices, item counts                       │
//! │  └── Fails before the transaction writes anything                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledger rules (stock, item, settlement)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite (UNIQUE, CHECK, foreign keys)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::request::{LineInput, NewProduct};
use crate::MAX_ORDER_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted name for catalog entries.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required display name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most [`MAX_NAME_LEN`] characters
///
/// ## Example
/// ```rust
/// use depot_core::validation::validate_name;
///
/// assert!(validate_name("name", "Cement 50kg").is_ok());
/// assert!(validate_name("name", "   ").is_err());
/// ```
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Rejects negative money amounts.
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

fn validate_optional_count(field: &str, value: Option<i64>) -> ValidationResult<()> {
    match value {
        Some(v) if v < 0 => Err(ValidationError::Negative {
            field: field.to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Payload Validators
// =============================================================================

/// Validates the item list of a new order.
///
/// ## Rules
/// - At least one item
/// - At most [`MAX_ORDER_ITEMS`]
pub fn validate_order_items(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::required("items"));
    }

    if count > MAX_ORDER_ITEMS {
        return Err(ValidationError::TooMany {
            field: "items".to_string(),
            max: MAX_ORDER_ITEMS,
        });
    }

    Ok(())
}

/// Validates a purchase or performa line.
///
/// ## Rules
/// - `product` is required
/// - `quantity` must be positive
/// - `unit_price` must not be negative
pub fn validate_line(line: &LineInput) -> ValidationResult<()> {
    validate_name("product", &line.product)?;

    if line.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    validate_amount("unit_price", line.unit_price)
}

/// Validates a new catalog product.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_name("name", &product.name)?;
    validate_optional_count("stock", product.stock)?;
    validate_optional_count("package", product.package)?;

    if let Some(piece) = product.piece {
        if piece <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "piece".to_string(),
            });
        }
    }

    if let Some(price) = product.buying_price {
        validate_amount("buying_price", price)?;
    }
    if let Some(price) = product.selling_price {
        validate_amount("selling_price", price)?;
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "vat_bps".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
