//! # Money
//!
//! Exact cent arithmetic for prices, totals, VAT and payment balances.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every amount in the ledger is an i64 count of cents.                   │
//! │                                                                         │
//! │    sub_total 5000 × 1500 bps / 10000   = 750 VAT                        │
//! │    paid + unpaid == total_amount       (integer equality, no epsilon)   │
//! │    recompute(recompute(order))         == recompute(order)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use depot_core::money::Money;
//!
//! let unit_price = Money::from_cents(500); // 5.00
//! let line = unit_price.checked_multiply(10).unwrap();
//! assert_eq!(line.to_string(), "50.00");
//! assert_eq!(unit_price.checked_multiply(i64::MAX), None);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │  Product.selling_price ──► OrderItem.unit_price ──► OrderItem.price     │
/// │                                                                         │
/// │  Σ OrderItem.price ──► Order.sub_total ──► VAT ──► Order.total_amount   │
/// │                                                                         │
/// │  Order.total_amount ──► paid_amount / unpaid_amount ──► payment log     │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
///
/// Stored as an INTEGER column through `sqlx(transparent)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Ceiling for any single price, line or cost: 10^15 cents. Order and
    /// expense totals sum such values and stay well inside `i64`.
    pub const LIMIT: Money = Money(1_000_000_000_000_000);

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole currency units, truncated toward zero.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Cents past the whole unit, 0-99.
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// Used for `unpaid = max(total - paid, 0)`.
    #[inline]
    pub fn non_negative(self) -> Self {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }

    /// VAT on this amount at `rate`, rounded to the nearest cent.
    ///
    /// A tie (exactly half a cent) goes to the even cent: 1.5 becomes 2,
    /// 4.5 becomes 4. Recomputing an order therefore never drifts upward.
    ///
    /// ## Example
    /// ```rust
    /// use depot_core::money::Money;
    /// use depot_core::types::TaxRate;
    ///
    /// let sub_total = Money::from_cents(5000);
    /// let vat = sub_total.calculate_tax(TaxRate::from_bps(1500));
    /// assert_eq!(vat.cents(), 750);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 so large totals cannot overflow before the division
        let scaled = self.0 as i128 * rate.bps() as i128;
        let quotient = scaled.div_euclid(10_000);
        let remainder = scaled.rem_euclid(10_000);

        let rounded = match remainder.cmp(&5_000) {
            Ordering::Less => quotient,
            Ordering::Greater => quotient + 1,
            Ordering::Equal if quotient % 2 == 0 => quotient,
            Ordering::Equal => quotient + 1,
        };

        Money::from_cents(rounded as i64)
    }

    /// `self × qty`, or `None` past ±[`Money::LIMIT`].
    pub fn checked_multiply(&self, qty: i64) -> Option<Money> {
        self.0
            .checked_mul(qty)
            .filter(|cents| (-Self::LIMIT.0..=Self::LIMIT.0).contains(cents))
            .map(Money)
    }
}

/// Price of `quantity` units at `unit_price`.
///
/// ## Errors
/// `OutOfRange` on `field` when the product exceeds [`Money::LIMIT`].
pub fn line_total(unit_price: Money, quantity: i64, field: &str) -> CoreResult<Money> {
    unit_price
        .checked_multiply(quantity)
        .ok_or_else(|| ValidationError::too_large(field, Money::LIMIT.cents()).into())
}

// =============================================================================
// Operators
// =============================================================================

/// Plain two-decimal rendering, the form written into payment log values.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
