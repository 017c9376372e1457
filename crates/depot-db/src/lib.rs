//! # depot-db: Storage and Ledger Services for the Depot Ledger
//!
//! This crate owns the SQLite database and every transaction boundary.
//! The rules live in `depot-core`; this crate loads rows, hands them to the
//! core, and writes the result back atomically.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Depot Ledger Data Flow                           │
//! │                                                                         │
//! │  API layer (outside this workspace)                                    │
//! │       │  Ledger::create_order(actor, request)                          │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Ledger     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger/)    │───►│ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ tx::with_retry│    │ catalog.rs    │    │ 001_initial_ │  │   │
//! │  │   │ ProductCache  │    │ order.rs      │    │   schema.sql │  │   │
//! │  │   │ AccessPolicy  │    │ purchase.rs   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                SQLite Database (WAL, busy_timeout)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Layered configuration (defaults, `depot.toml`, `DEPOT__*`)
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`tx`] - Transactions retried on lost races
//! - [`repository`] - Row access for every table
//! - [`ledger`] - The operations: orders, purchases, performas, catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Ledger, LedgerConfig};
//!
//! let config = LedgerConfig::load(None)?;
//! let ledger = Ledger::open(&config).await?;
//!
//! let order = ledger.create_order(&actor, request).await?;
//! let history = ledger.get_order_payment_log(&order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DatabaseSettings, LedgerConfig, LedgerSettings};
pub use error::{DbError, DbResult};
pub use ledger::{ItemDeletion, Ledger};
pub use pool::{Database, DbConfig};
pub use tx::RetryPolicy;
