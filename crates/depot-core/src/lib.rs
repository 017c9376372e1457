//! # depot-core: Pure Ledger Logic for Depot
//!
//! This crate holds every stock and money rule of the depot backend as pure
//! functions over plain structs. It never touches a database; `depot-db`
//! loads rows, calls in here and writes the results back.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Depot Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP / admin UI (external collaborators)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ request DTOs                           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          depot-db::ledger (one SQLite transaction each)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────────────┐   │   │
//! │  │   │  stock  │◄─│  item   │◄─│  order  │  │ purchase        │   │   │
//! │  │   │ reserve │  │ create  │  │ totals  │  │ performa        │   │   │
//! │  │   │ release │  │ update  │  │ cancel  │  │ (no stock)      │   │   │
//! │  │   └─────────┘  └─────────┘  └────┬────┘  └────────┬────────┘   │   │
//! │  │                                  ▼                ▼            │   │
//! │  │                         ┌──────────────────────────────┐       │   │
//! │  │                         │ settlement ──► audit (diffs) │       │   │
//! │  │                         └──────────────────────────────┘       │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, OrderItem, purchases, logs)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Payload checks run before any stock moves
//! - [`stock`] - Package ⇄ unit conversion, reserve and release
//! - [`item`] - Order item state machine
//! - [`order`] - Order totals, cancellation, item-pending counter
//! - [`settlement`] - Payment status state machine shared by orders,
//!   expenses and suppliers
//! - [`purchase`] / [`performa`] - Supplier purchases and customer quotes
//! - [`audit`] - Payment field snapshots and diffs
//! - [`policy`] - Role-based approval gate
//! - [`rollup`] - Dirty set of parents to recompute before commit
//! - [`request`] - Service input payloads
//!
//! ## Example Usage
//!
//! ```rust
//! use depot_core::money::Money;
//! use depot_core::types::TaxRate;
//!
//! let sub_total = Money::from_cents(5000);
//! let vat = sub_total.calculate_tax(TaxRate::default());
//! assert_eq!(vat.cents(), 750);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod error;
pub mod item;
pub mod money;
pub mod order;
pub mod performa;
pub mod policy;
pub mod purchase;
pub mod request;
pub mod rollup;
pub mod settlement;
pub mod stock;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use settlement::Payable;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// VAT applied to Receipt orders and performas, in basis points (15%).
pub const DEFAULT_VAT_BPS: u32 = 1500;

/// Maximum items accepted in a single order payload.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Digits in a zero-padded order receipt id ("0007").
pub const RECEIPT_ID_WIDTH: usize = 4;
