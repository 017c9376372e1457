//! # Stock Ledger
//!
//! Package ⇄ unit conversion and the reserve/release arithmetic on
//! `Product.stock`, `.package` and `.receipt_no`.
//!
//! ## Conversion Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Reserving against a product                         │
//! │                                                                         │
//! │  product: stock=100, piece=10, package=10                               │
//! │                                                                         │
//! │  reserve(package=3)                                                     │
//! │       │  quantity = 3 × 10 = 30                                         │
//! │       ▼                                                                 │
//! │  stock=70, package=7                                                    │
//! │                                                                         │
//! │  reserve(quantity=15)                                                   │
//! │       │  remaining = 70 - 15 = 55                                       │
//! │       ▼                                                                 │
//! │  stock=55, package=55 div 10 = 5        (floor division, always)        │
//! │                                                                         │
//! │  Receipt orders move receipt_no by the same unit count.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## All-or-nothing
//! Every function computes the new figures into locals, checks them and only
//! then writes the product. A returned error means the product is untouched.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Product, ReceiptMode};

// =============================================================================
// Requests
// =============================================================================

/// What a caller asks to take from a product: loose units or whole packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockRequest {
    Quantity(i64),
    Package(i64),
}

impl StockRequest {
    /// Builds a request from the optional `quantity`/`package` pair of a
    /// payload. Exactly one of them must be given.
    pub fn from_parts(quantity: Option<i64>, package: Option<i64>) -> CoreResult<Self> {
        match (quantity, package) {
            (Some(_), Some(_)) => Err(ValidationError::MutuallyExclusive {
                first: "quantity".to_string(),
                second: "package".to_string(),
            }
            .into()),
            (Some(q), None) => Ok(StockRequest::Quantity(q)),
            (None, Some(p)) => Ok(StockRequest::Package(p)),
            (None, None) => Err(ValidationError::required("quantity or package").into()),
        }
    }
}

/// Result of a successful reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Units taken from stock.
    pub quantity: i64,

    /// Packages taken, when reserved by the package.
    pub package: Option<i64>,
}

// =============================================================================
// Reserve / Release
// =============================================================================

/// Takes units or packages out of stock.
///
/// ## Errors
/// - `InvalidQuantity` / `InvalidPackage` for non-positive requests
/// - `StockUnavailable` when the product has no stock figure
/// - `PackagingUndefined` for package requests without `piece`
/// - `InsufficientPackage` / `InsufficientStock` when the product runs short
pub fn reserve(
    product: &mut Product,
    receipt: ReceiptMode,
    request: StockRequest,
) -> CoreResult<Reservation> {
    let stock = current_stock(product)?;

    let reservation = match request {
        StockRequest::Package(package) => {
            if package <= 0 {
                return Err(CoreError::InvalidPackage(package));
            }
            let piece = product
                .piece_size()
                .ok_or_else(|| CoreError::PackagingUndefined(product.name.clone()))?;
            let available = product.package.unwrap_or(0);
            if available < package {
                return Err(CoreError::InsufficientPackage {
                    product: product.name.clone(),
                    available,
                    requested: package,
                });
            }
            let quantity = units_of(package, piece)?;
            if quantity > stock {
                return Err(insufficient(product, stock, quantity));
            }

            product.package = Some(available - package);
            product.stock = Some(stock - quantity);
            Reservation {
                quantity,
                package: Some(package),
            }
        }
        StockRequest::Quantity(quantity) => {
            if quantity <= 0 {
                return Err(CoreError::InvalidQuantity(quantity));
            }
            if quantity > stock {
                return Err(insufficient(product, stock, quantity));
            }

            set_stock(product, stock - quantity);
            Reservation {
                quantity,
                package: None,
            }
        }
    };

    move_receipt_counter(product, receipt, -reservation.quantity);
    Ok(reservation)
}

/// Puts units (and packages, for package items) back into stock.
///
/// Used on cancellation. Quantity-based items re-derive the package count
/// from the restored stock.
pub fn release(product: &mut Product, receipt: ReceiptMode, package: Option<i64>, quantity: i64) {
    let stock = product.stock.unwrap_or(0).saturating_add(quantity);

    match (package, product.package) {
        (Some(returned), Some(available)) => {
            product.stock = Some(stock);
            product.package = Some(available + returned);
        }
        _ => set_stock(product, stock),
    }

    move_receipt_counter(product, receipt, quantity);
}

// =============================================================================
// Adjustments
// =============================================================================

/// Applies an item's quantity edit to the product.
///
/// A positive difference reserves more units, a negative one returns units.
/// The package count is re-derived as `remaining_stock div piece`.
///
/// ## Returns
/// The unit difference that was applied (`new - old`).
pub fn adjust_for_quantity_change(
    product: &mut Product,
    receipt: ReceiptMode,
    old_quantity: i64,
    new_quantity: i64,
) -> CoreResult<i64> {
    if new_quantity <= 0 {
        return Err(CoreError::InvalidQuantity(new_quantity));
    }
    let stock = current_stock(product)?;
    let difference = new_quantity - old_quantity;
    if difference > stock {
        return Err(insufficient(product, stock, difference));
    }
    if difference == 0 {
        return Ok(0);
    }

    set_stock(product, stock - difference);
    move_receipt_counter(product, receipt, -difference);
    Ok(difference)
}

/// Applies an item's package edit to the product.
///
/// Package items move `product.package` by the package difference; items
/// that were ordered by the unit re-derive it from stock instead.
///
/// ## Returns
/// The item's new unit quantity (`new_package × piece`).
pub fn adjust_for_package_change(
    product: &mut Product,
    receipt: ReceiptMode,
    old_package: Option<i64>,
    old_quantity: i64,
    new_package: i64,
) -> CoreResult<i64> {
    if new_package <= 0 {
        return Err(CoreError::InvalidPackage(new_package));
    }
    let piece = product
        .piece_size()
        .ok_or_else(|| CoreError::PackagingUndefined(product.name.clone()))?;
    let stock = current_stock(product)?;

    let new_quantity = units_of(new_package, piece)?;
    let unit_difference = new_quantity - old_quantity;
    if unit_difference > stock {
        return Err(insufficient(product, stock, unit_difference));
    }

    match (old_package, product.package) {
        (Some(old), Some(available)) => {
            let package_difference = new_package - old;
            if package_difference > available {
                return Err(CoreError::InsufficientPackage {
                    product: product.name.clone(),
                    available,
                    requested: package_difference,
                });
            }
            product.package = Some(available - package_difference);
            product.stock = Some(stock - unit_difference);
        }
        _ => set_stock(product, stock - unit_difference),
    }

    move_receipt_counter(product, receipt, -unit_difference);
    Ok(new_quantity)
}

// =============================================================================
// Catalog Restock
// =============================================================================

/// Adds (or with a negative count removes) whole packages.
///
/// Loose units survive: `stock = piece × packages + stock mod piece`.
pub fn restock_packages(product: &mut Product, packages: i64) -> CoreResult<()> {
    let piece = product
        .piece_size()
        .ok_or_else(|| CoreError::PackagingUndefined(product.name.clone()))?;
    let available = product.package.unwrap_or(0);
    let loose = product.stock.unwrap_or(0).rem_euclid(piece);

    let total_packages = available
        .checked_add(packages)
        .ok_or_else(stock_overflow)?;
    let stock = units_of(total_packages, piece)?
        .checked_add(loose)
        .ok_or_else(stock_overflow)?;
    if total_packages < 0 || stock < 0 {
        return Err(CoreError::InsufficientPackage {
            product: product.name.clone(),
            available,
            requested: -packages,
        });
    }

    product.stock = Some(stock);
    product.package = Some(stock.div_euclid(piece));
    Ok(())
}

/// Adds (or with a negative count removes) loose units.
pub fn restock_units(product: &mut Product, units: i64) -> CoreResult<()> {
    let current = product.stock.unwrap_or(0);
    let stock = current.checked_add(units).ok_or_else(stock_overflow)?;
    if stock < 0 {
        return Err(insufficient(product, current, -units));
    }

    set_stock(product, stock);
    Ok(())
}

/// Stock for a newly created product.
///
/// When both `package` and `piece` are given the stock is derived from them
/// and any explicit `stock` is ignored.
pub fn initial_stock(
    package: Option<i64>,
    piece: Option<i64>,
    stock: Option<i64>,
) -> CoreResult<Option<i64>> {
    let stock = match (package, piece) {
        (Some(package), Some(piece)) => Some(units_of(package, piece)?),
        _ => stock,
    };

    match stock {
        Some(s) if s < 0 => Err(ValidationError::Negative {
            field: "stock".to_string(),
        }
        .into()),
        other => Ok(other),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn current_stock(product: &Product) -> CoreResult<i64> {
    product
        .stock
        .ok_or_else(|| CoreError::StockUnavailable(product.name.clone()))
}

/// Units in `packages` whole packages of `piece`.
pub(crate) fn units_of(packages: i64, piece: i64) -> CoreResult<i64> {
    packages.checked_mul(piece).ok_or_else(stock_overflow)
}

fn stock_overflow() -> CoreError {
    ValidationError::too_large("stock", i64::MAX).into()
}

fn insufficient(product: &Product, available: i64, requested: i64) -> CoreError {
    CoreError::InsufficientStock {
        product: product.name.clone(),
        available,
        requested,
    }
}

/// Writes stock and, for package-tracked products, the floor-derived
/// package count.
fn set_stock(product: &mut Product, stock: i64) {
    if let (Some(piece), Some(_)) = (product.piece_size(), product.package) {
        product.package = Some(stock.div_euclid(piece));
    }
    product.stock = Some(stock);
}

fn move_receipt_counter(product: &mut Product, receipt: ReceiptMode, delta: i64) {
    if receipt.is_receipt() {
        if let Some(no) = product.receipt_no {
            product.receipt_no = Some(no + delta);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
