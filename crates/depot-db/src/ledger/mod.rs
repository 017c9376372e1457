//! # Ledger Services
//!
//! The operations callers use: every mutation is one SQLite transaction,
//! retried as a whole when it loses a race.
//!
//! ## One Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Ledger::create_order(actor, request)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  with_retry ─► BEGIN                                                    │
//! │                 │ load rows through the transaction connection          │
//! │                 │ depot-core computes the new state (pure)              │
//! │                 │ ProductCache::flush   version-checked stock writes    │
//! │                 │ row writes + payment / order log appends              │
//! │                COMMIT                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Committed { value, refusal }                                           │
//! │       refusal = Some(UnauthorizedCancellation) ──► Err after commit     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing inside a transaction goes back to the pool: an in-memory
//! database has a single connection, and reads must see the transaction's
//! own writes anyway.

mod catalog;
mod orders;
mod performas;
mod purchases;

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqliteConnection;
use tracing::debug;

use crate::config::{LedgerConfig, LedgerSettings};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::catalog as products;
use crate::repository::log;
use crate::tx::{with_retry, TxFuture};
use depot_core::audit::PaymentChange;
use depot_core::policy::{AccessPolicy, Action, Decision, EntityKind};
use depot_core::{Actor, CoreError, LogSubject, Order, Product, TaxRate};

pub use orders::ItemDeletion;

/// Handle to the ledger operations.
///
/// Cheap to clone; clones share the pool and the policy.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    settings: LedgerSettings,
    policy: Arc<dyn AccessPolicy + Send + Sync>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("db", &self.db)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Ledger over `db` with the role policy from `settings`.
    pub fn new(db: Database, settings: LedgerSettings) -> Self {
        let policy = Arc::new(settings.role_policy());
        Ledger {
            db,
            settings,
            policy,
        }
    }

    /// Opens the configured database and builds a ledger over it.
    pub async fn open(config: &LedgerConfig) -> DbResult<Self> {
        let db = Database::new(config.database.db_config()).await?;
        Ok(Ledger::new(db, config.ledger.clone()))
    }

    /// Replaces the access policy.
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy + Send + Sync>) -> Self {
        self.policy = policy;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    fn context(&self, actor: &Actor) -> TxContext {
        TxContext {
            actor: actor.clone(),
            rate: self.settings.vat_rate(),
            policy: self.policy.clone(),
        }
    }

    async fn run<T, F>(&self, operation: &str, work: F) -> DbResult<T>
    where
        F: for<'c> FnMut(&'c mut SqliteConnection) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        with_retry(self.db.pool(), operation, self.settings.retry_policy(), work).await
    }
}

// =============================================================================
// Transaction Context
// =============================================================================

/// What every attempt of an operation needs besides its request.
#[derive(Clone)]
pub(crate) struct TxContext {
    pub actor: Actor,
    pub rate: TaxRate,
    pub policy: Arc<dyn AccessPolicy + Send + Sync>,
}

impl TxContext {
    pub fn decide(&self, action: Action, entity: EntityKind) -> Decision {
        self.policy.check(&self.actor, action, entity)
    }
}

/// Result of a committed transaction.
///
/// A refusal is returned to the caller only after the transaction that
/// recorded the downgrade has committed.
#[derive(Debug)]
pub(crate) struct Committed<T> {
    value: T,
    refusal: Option<CoreError>,
}

impl<T> Committed<T> {
    pub fn ok(value: T) -> Self {
        Committed {
            value,
            refusal: None,
        }
    }

    pub fn refused(value: T, refusal: Option<CoreError>) -> Self {
        Committed { value, refusal }
    }

    pub fn finish(self) -> DbResult<T> {
        match self.refusal {
            Some(err) => Err(err.into()),
            None => Ok(self.value),
        }
    }
}

// =============================================================================
// Product Cache
// =============================================================================

/// Products touched by one transaction.
///
/// Each product is read once; [`ProductCache::flush`] writes the ones whose
/// stock figures changed, each with a version check.
#[derive(Debug, Default)]
pub(crate) struct ProductCache {
    products: HashMap<String, Product>,
    loaded: HashMap<String, Product>,
}

impl ProductCache {
    /// The product, read on first use. `None` if it no longer exists.
    pub async fn load(
        &mut self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<&mut Product>> {
        if !self.products.contains_key(id) {
            match products::fetch_product(&mut *conn, id).await? {
                Some(product) => {
                    self.loaded.insert(id.to_string(), product.clone());
                    self.products.insert(id.to_string(), product);
                }
                None => return Ok(None),
            }
        }
        Ok(self.products.get_mut(id))
    }

    /// Like [`load`](Self::load) but a missing product is `ProductNotFound`.
    pub async fn require(
        &mut self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<&mut Product> {
        self.load(conn, id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    pub fn map_mut(&mut self) -> &mut HashMap<String, Product> {
        &mut self.products
    }

    /// Writes every product whose stock, package or receipt_no moved.
    ///
    /// ## Errors
    /// `StaleWrite` when another transaction updated a product since it was
    /// read; the operation is then retried from the start.
    pub async fn flush(&mut self, conn: &mut SqliteConnection) -> DbResult<usize> {
        let mut written = 0;
        for (id, product) in self.products.iter_mut() {
            let changed = self.loaded.get(id).map_or(true, |before| {
                before.stock != product.stock
                    || before.package != product.package
                    || before.receipt_no != product.receipt_no
            });
            if changed {
                products::update_product_stock(&mut *conn, product).await?;
                self.loaded.insert(id.clone(), product.clone());
                written += 1;
            }
        }

        if written > 0 {
            debug!(written, "Product stock flushed");
        }
        Ok(written)
    }
}

// =============================================================================
// Shared Lookups
// =============================================================================

/// Name of the referenced customer, verifying it exists.
pub(crate) async fn customer_label(
    conn: &mut SqliteConnection,
    customer_id: Option<&str>,
) -> DbResult<Option<String>> {
    let Some(id) = customer_id else {
        return Ok(None);
    };
    let customer = products::fetch_customer(&mut *conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", id))?;
    Ok(Some(customer.name))
}

/// Name of the referenced supplier, verifying it exists.
pub(crate) async fn supplier_label(
    conn: &mut SqliteConnection,
    supplier_id: Option<&str>,
) -> DbResult<Option<String>> {
    let Some(id) = supplier_id else {
        return Ok(None);
    };
    let supplier = products::fetch_supplier(&mut *conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Supplier", id))?;
    Ok(Some(supplier.name))
}

pub(crate) async fn require_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Order> {
    crate::repository::order::fetch_order(&mut *conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
}

/// Appends one payment log entry per change.
pub(crate) async fn append_payment_changes(
    conn: &mut SqliteConnection,
    actor: &Actor,
    subject: LogSubject,
    subject_id: &str,
    party: Option<String>,
    changes: Vec<PaymentChange>,
) -> DbResult<()> {
    for change in changes {
        let entry = change.into_entry(subject, subject_id, party.clone(), actor);
        log::append_payment(&mut *conn, &entry).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ledger, stocked_product};

    #[tokio::test]
    async fn test_cache_writes_only_changed_products() {
        let ledger = ledger().await;
        let moved = stocked_product(&ledger, "Cement 50kg", 10, None, None, 1000).await;
        let untouched = stocked_product(&ledger, "Sand", 10, None, None, 500).await;

        let mut conn = ledger.database().pool().acquire().await.unwrap();
        let mut cache = ProductCache::default();
        cache.require(&mut conn, &moved.id).await.unwrap().stock = Some(7);
        cache.require(&mut conn, &untouched.id).await.unwrap();

        assert_eq!(cache.flush(&mut conn).await.unwrap(), 1);
        assert_eq!(cache.flush(&mut conn).await.unwrap(), 0);
        drop(conn);

        let stored = ledger.get_product(&moved.id).await.unwrap();
        assert_eq!(stored.stock, Some(7));
        assert_eq!(stored.version, moved.version + 1);
        let other = ledger.get_product(&untouched.id).await.unwrap();
        assert_eq!(other.version, untouched.version);
    }

    #[tokio::test]
    async fn test_cache_reports_missing_product() {
        let ledger = ledger().await;
        let mut conn = ledger.database().pool().acquire().await.unwrap();
        let mut cache = ProductCache::default();

        assert!(cache.load(&mut conn, "nope").await.unwrap().is_none());
        let err = cache.require(&mut conn, "nope").await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Ledger(CoreError::ProductNotFound(ref id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn test_stale_product_write_is_rejected() {
        let ledger = ledger().await;
        let product = stocked_product(&ledger, "Paint 4L", 5, None, None, 2500).await;

        let mut conn = ledger.database().pool().acquire().await.unwrap();
        let mut first = ProductCache::default();
        let mut second = ProductCache::default();
        first.require(&mut conn, &product.id).await.unwrap().stock = Some(4);
        second.require(&mut conn, &product.id).await.unwrap().stock = Some(3);

        first.flush(&mut conn).await.unwrap();
        let err = second.flush(&mut conn).await.unwrap_err();
        assert!(matches!(err, DbError::StaleWrite { .. }));
    }
}
