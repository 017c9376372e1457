//! # Performa Operations
//!
//! Pro-forma quotes grouped under a performa customer. No stock and no
//! payment state: a performa is priced, taxed on Receipt, and summed into
//! its customer.

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{customer_label, Ledger, TxContext};
use crate::error::{DbError, DbResult};
use crate::repository::performa as performas;
use depot_core::performa::{new_customer, new_performa, recompute_performa, rollup_customer};
use depot_core::purchase::merge_lines;
use depot_core::request::{CreatePerformaCustomer, PerformaEntry, UpdatePerformaCustomer};
use depot_core::rollup::{DirtySet, ParentKind};
use depot_core::validation::validate_line;
use depot_core::{Actor, CoreError, PerformaCustomer, PerformaPerforma, PerformaProduct};

impl Ledger {
    /// Creates a performa customer with its performas.
    pub async fn create_performa_customer(
        &self,
        actor: &Actor,
        request: CreatePerformaCustomer,
    ) -> DbResult<PerformaCustomer> {
        let ctx = self.context(actor);

        let customer = self
            .run("create_performa_customer", move |conn| {
                let ctx = ctx.clone();
                let request = request.clone();
                Box::pin(async move {
                    let name = customer_label(conn, request.customer_id.as_deref()).await?;
                    let mut customer = new_customer(&ctx.actor, request.customer_id.clone(), name);
                    performas::insert_customer(&mut *conn, &customer).await?;

                    let mut written = Vec::with_capacity(request.performas.len());
                    for entry in &request.performas {
                        written.push(insert_performa(conn, &ctx, &customer, entry).await?);
                    }

                    rollup_customer(&mut customer, &written);
                    performas::update_customer_total(&mut *conn, &customer).await?;
                    Ok(customer)
                })
            })
            .await?;

        info!(
            id = %customer.id,
            customer = ?customer.customer_name,
            total = %customer.total_amount,
            "Performa customer created"
        );
        Ok(customer)
    }

    /// Replaces the customer's performas.
    ///
    /// Entries with an id update that performa and replace its lines (lines
    /// left out are deleted); entries without one add a performa. Performas
    /// left out are deleted.
    ///
    /// ## Errors
    /// `UnknownChild` for a performa or line id that belongs elsewhere.
    pub async fn update_performa_customer(
        &self,
        actor: &Actor,
        customer_id: &str,
        request: UpdatePerformaCustomer,
    ) -> DbResult<PerformaCustomer> {
        let ctx = self.context(actor);
        let customer_id = customer_id.to_string();

        let customer = self
            .run("update_performa_customer", move |conn| {
                let ctx = ctx.clone();
                let customer_id = customer_id.clone();
                let request = request.clone();
                Box::pin(async move { update_customer_tx(conn, &ctx, &customer_id, &request).await })
            })
            .await?;

        info!(
            id = %customer.id,
            total = %customer.total_amount,
            "Performa customer updated"
        );
        Ok(customer)
    }

    pub async fn get_performa_customer(&self, id: &str) -> DbResult<PerformaCustomer> {
        self.db
            .performas()
            .get_customer(id)
            .await?
            .ok_or_else(|| DbError::not_found("Performa customer", id))
    }

    pub async fn get_performas(&self, customer_id: &str) -> DbResult<Vec<PerformaPerforma>> {
        self.db.performas().get_performas(customer_id).await
    }

    pub async fn get_performa_lines(&self, performa_id: &str) -> DbResult<Vec<PerformaProduct>> {
        self.db.performas().get_lines(performa_id).await
    }
}

async fn insert_performa(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    customer: &PerformaCustomer,
    entry: &PerformaEntry,
) -> DbResult<PerformaPerforma> {
    let (performa, lines) = new_performa(&ctx.actor, customer, entry, ctx.rate)?;
    performas::insert_performa(&mut *conn, &performa).await?;
    for line in &lines {
        performas::insert_line(&mut *conn, line).await?;
    }
    Ok(performa)
}

async fn update_customer_tx(
    conn: &mut SqliteConnection,
    ctx: &TxContext,
    customer_id: &str,
    request: &UpdatePerformaCustomer,
) -> DbResult<PerformaCustomer> {
    let mut customer = performas::fetch_customer(&mut *conn, customer_id)
        .await?
        .ok_or_else(|| DbError::not_found("Performa customer", customer_id))?;
    let existing = performas::fetch_performas(&mut *conn, customer_id).await?;

    for entry in &request.performas {
        for line in &entry.lines {
            validate_line(line)?;
        }
        if let Some(id) = entry.id.as_deref() {
            if !existing.iter().any(|p| p.id == id) {
                return Err(CoreError::UnknownChild {
                    entity: "Performa".to_string(),
                    id: id.to_string(),
                }
                .into());
            }
        }
    }

    let (kept, removed): (Vec<_>, Vec<_>) = existing
        .into_iter()
        .partition(|p| request.performas.iter().any(|e| e.id.as_deref() == Some(p.id.as_str())));
    let mut existing = kept;
    for performa in &removed {
        performas::delete_performa(&mut *conn, &performa.id).await?;
    }

    let mut dirty = DirtySet::new();
    for entry in &request.performas {
        match entry.id.as_deref() {
            Some(id) => {
                let Some(performa) = existing.iter_mut().find(|p| p.id == id) else {
                    continue;
                };
                replace_lines(conn, performa, entry).await?;
                if let Some(receipt) = entry.receipt {
                    performa.receipt = receipt;
                }
                dirty.mark(ParentKind::Performa, id);
            }
            None => {
                existing.push(insert_performa(conn, ctx, &customer, entry).await?);
            }
        }
    }
    dirty.mark(ParentKind::PerformaCustomer, customer.id.clone());

    for (kind, id) in dirty.drain() {
        match kind {
            ParentKind::Performa => {
                let Some(performa) = existing.iter_mut().find(|p| p.id == id) else {
                    continue;
                };
                let lines = performas::fetch_lines(&mut *conn, &id).await?;
                recompute_performa(performa, &lines, ctx.rate);
                performas::update_performa(&mut *conn, performa).await?;
            }
            ParentKind::PerformaCustomer => {
                rollup_customer(&mut customer, &existing);
                performas::update_customer_total(&mut *conn, &customer).await?;
            }
            ParentKind::PurchaseExpense | ParentKind::PurchaseSupplier => {}
        }
    }

    debug!(
        id = %customer.id,
        performas = existing.len(),
        removed = removed.len(),
        "Performa customer reconciled"
    );
    Ok(customer)
}

/// Merges the entry's lines into the performa, deleting the ones left out.
async fn replace_lines(
    conn: &mut SqliteConnection,
    performa: &PerformaPerforma,
    entry: &PerformaEntry,
) -> DbResult<()> {
    let mut lines = performas::fetch_lines(&mut *conn, &performa.id).await?;
    let merge = merge_lines(&performa.id, &mut lines, &entry.lines)?;

    for id in &merge.omitted {
        performas::delete_line(&mut *conn, id).await?;
    }
    for line in &lines {
        if merge.created.contains(&line.id) {
            performas::insert_line(&mut *conn, line).await?;
        } else if merge.updated.contains(&line.id) {
            performas::update_line(&mut *conn, line).await?;
        }
    }
    Ok(())
}
