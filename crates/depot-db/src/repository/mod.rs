//! # Repository Module
//!
//! Database repository implementations for the depot ledger.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads                         Transactional writes                    │
//! │  ─────                         ────────────────────                    │
//! │  db.orders().get_by_id(id)     order::insert_item(&mut *conn, &item)   │
//! │       │                             │                                  │
//! │       ▼                             ▼                                  │
//! │  XRepository { pool }          free fns over any SqliteExecutor        │
//! │       │                             │                                  │
//! │       └──────────┬──────────────────┘                                  │
//! │                  ▼                                                      │
//! │          same SQL, one place                                           │
//! │                                                                         │
//! │  The ledger services pass the connection of their transaction; the    │
//! │  repository structs pass the pool.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Categories, suppliers, customers, products
//! - [`OrderRepository`](order::OrderRepository) - Orders and order items
//! - [`PurchaseRepository`](purchase::PurchaseRepository) - Supplier purchases
//! - [`PerformaRepository`](performa::PerformaRepository) - Performa quotes
//! - [`LogRepository`](log::LogRepository) - Payment and order action logs

pub mod catalog;
pub mod log;
pub mod order;
pub mod performa;
pub mod purchase;
