//! # Purchase Operations
//!
//! Supplier purchases and their expenses. Every operation stages its
//! changes in a [`PurchaseState`] and writes them in one flush:
//!
//! ```text
//!   explicit status ─► merge lines / add expenses ─► invalidate stale Paid
//!                                                          │
//!   flush:  reconcile_supplier (rollup ─► Paid cascade ─► rollup)
//!           expenses (insert or update, payment log)
//!           new lines
//!           supplier row + supplier payment log
//! ```

use std::collections::{HashMap, HashSet};

use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::{append_payment_changes, supplier_label, Ledger, TxContext};
use crate::error::{DbError, DbResult};
use crate::repository::purchase as purchases;
use depot_core::audit::PaymentSnapshot;
use depot_core::purchase::{
    invalidate_paid, merge_lines, new_expense, new_supplier, reconcile_supplier, update_expense,
};
use depot_core::request::{
    CreatePurchaseSupplier, LineInput, NewExpense, UpdatePurchaseExpense, UpdatePurchaseSupplier,
};
use depot_core::rollup::{DirtySet, ParentKind};
use depot_core::settlement::set_status;
use depot_core::{
    Actor, CoreError, LogSubject, Money, PaymentLogEntry, PaymentStatus, PurchaseExpense,
    PurchaseProduct, PurchaseSupplier,
};

impl Ledger {
    /// Records a supplier purchase with its expenses.
    ///
    /// ## Errors
    /// - `NotFound` for an unknown catalog supplier
    /// - `PaidAmountOutOfRange` for an expense paid beyond its total
    pub async fn create_purchase_supplier(
        &self,
        actor: &Actor,
        request: CreatePurchaseSupplier,
    ) -> DbResult<PurchaseSupplier> {
        let ctx = self.context(actor);

        let supplier = self
            .run("create_purchase_supplier", move |conn| {
                let ctx = ctx.clone();
                let request = request.clone();
                Box::pin(async move {
                    let name = supplier_label(conn, request.supplier_id.as_deref()).await?;
                    let supplier = new_supplier(
                        &ctx.actor,
                        request.supplier_id.clone(),
                        name,
                        request.payment_status,
                    );
                    purchases::insert_supplier(&mut *conn, &supplier).await?;

                    let mut state = PurchaseState::fresh(supplier);
                    for expense in &request.expenses {
                        state.add_expense(&ctx.actor, expense)?;
                    }
                    state.flush(conn, &ctx).await
                })
            })
            .await?;

        info!(
            id = %supplier.id,
            supplier = ?supplier.supplier_name,
            total = %supplier.total_amount,
            payment_status = %supplier.payment_status,
            "Purchase supplier created"
        );
        Ok(supplier)
    }

    /// Updates a supplier purchase.
    ///
    /// An explicit status is applied first. Expense entries with an id
    /// update that expense (their `paid_amount` is a delta), entries without
    /// one add an expense, which moves a Paid supplier back to Pending.
    pub async fn update_purchase_supplier(
        &self,
        actor: &Actor,
        supplier_id: &str,
        request: UpdatePurchaseSupplier,
    ) -> DbResult<PurchaseSupplier> {
        let ctx = self.context(actor);
        let supplier_id = supplier_id.to_string();

        let supplier = self
            .run("update_purchase_supplier", move |conn| {
                let ctx = ctx.clone();
                let supplier_id = supplier_id.clone();
                let request = request.clone();
                Box::pin(async move {
                    let mut state = PurchaseState::load(conn, &supplier_id).await?;
                    if let Some(status) = request.payment_status {
                        set_status(&mut state.supplier, status);
                    }

                    for entry in &request.expenses {
                        match entry.id.as_deref() {
                            Some(id) => {
                                state
                                    .update_existing(
                                        conn,
                                        id,
                                        entry.payment_status,
                                        entry.paid_amount,
                                        &entry.lines,
                                    )
                                    .await?
                            }
                            None => {
                                let expense = NewExpense {
                                    payment_status: entry
                                        .payment_status
                                        .unwrap_or(PaymentStatus::Unpaid),
                                    paid_amount: entry.paid_amount.unwrap_or_default(),
                                    lines: entry.lines.clone(),
                                };
                                state.add_expense(&ctx.actor, &expense)?;
                            }
                        }
                    }
                    state.flush(conn, &ctx).await
                })
            })
            .await?;

        info!(
            id = %supplier.id,
            total = %supplier.total_amount,
            payment_status = %supplier.payment_status,
            "Purchase supplier updated"
        );
        Ok(supplier)
    }

    /// Updates one expense and rolls its supplier up.
    pub async fn update_purchase_expense(
        &self,
        actor: &Actor,
        expense_id: &str,
        request: UpdatePurchaseExpense,
    ) -> DbResult<PurchaseExpense> {
        let ctx = self.context(actor);
        let expense_id = expense_id.to_string();

        let expense = self
            .run("update_purchase_expense", move |conn| {
                let ctx = ctx.clone();
                let expense_id = expense_id.clone();
                let request = request.clone();
                Box::pin(async move {
                    let expense = purchases::fetch_expense(&mut *conn, &expense_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Purchase expense", expense_id.as_str()))?;
                    let mut state = PurchaseState::load(conn, &expense.supplier_level_id).await?;
                    state
                        .update_existing(
                            conn,
                            &expense_id,
                            request.payment_status,
                            request.paid_amount_delta,
                            &request.lines,
                        )
                        .await?;

                    let written = state.flush_keeping(conn, &ctx, &expense_id).await?;
                    written.ok_or_else(|| DbError::not_found("Purchase expense", expense_id.as_str()))
                })
            })
            .await?;

        info!(
            id = %expense.id,
            total = %expense.total,
            payment_status = %expense.payment_status,
            "Purchase expense updated"
        );
        Ok(expense)
    }

    pub async fn get_purchase_supplier(&self, id: &str) -> DbResult<PurchaseSupplier> {
        self.db
            .purchases()
            .get_supplier(id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase supplier", id))
    }

    pub async fn get_purchase_expenses(&self, supplier_id: &str) -> DbResult<Vec<PurchaseExpense>> {
        self.db.purchases().get_expenses(supplier_id).await
    }

    pub async fn get_purchase_lines(&self, expense_id: &str) -> DbResult<Vec<PurchaseProduct>> {
        self.db.purchases().get_lines(expense_id).await
    }

    /// Payment history of an expense, newest first.
    pub async fn get_expense_payment_log(&self, expense_id: &str) -> DbResult<Vec<PaymentLogEntry>> {
        self.db.logs().payment_history(LogSubject::Expense, expense_id).await
    }

    /// Payment history of a supplier purchase, newest first.
    pub async fn get_supplier_payment_log(
        &self,
        supplier_id: &str,
    ) -> DbResult<Vec<PaymentLogEntry>> {
        self.db.logs().payment_history(LogSubject::Supplier, supplier_id).await
    }
}

// =============================================================================
// Staged State
// =============================================================================

/// A supplier purchase and its expenses as one transaction changes them.
struct PurchaseState {
    supplier: PurchaseSupplier,

    /// `None` when the supplier was created by this transaction.
    supplier_before: Option<PaymentSnapshot>,

    expenses: Vec<PurchaseExpense>,
    expense_before: HashMap<String, PaymentSnapshot>,

    /// Expenses to insert rather than update.
    created: HashSet<String>,

    /// Lines of created expenses, inserted after them.
    new_lines: Vec<PurchaseProduct>,

    dirty: DirtySet,
}

impl PurchaseState {
    fn fresh(supplier: PurchaseSupplier) -> Self {
        PurchaseState {
            supplier,
            supplier_before: None,
            expenses: Vec::new(),
            expense_before: HashMap::new(),
            created: HashSet::new(),
            new_lines: Vec::new(),
            dirty: DirtySet::new(),
        }
    }

    async fn load(conn: &mut SqliteConnection, supplier_id: &str) -> DbResult<Self> {
        let supplier = purchases::fetch_supplier(&mut *conn, supplier_id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase supplier", supplier_id))?;
        let expenses = purchases::fetch_expenses(&mut *conn, supplier_id).await?;
        let expense_before = expenses
            .iter()
            .map(|e| (e.id.clone(), PaymentSnapshot::of(e)))
            .collect();

        let mut state = PurchaseState::fresh(supplier);
        state.supplier_before = Some(PaymentSnapshot::of(&state.supplier));
        state.expenses = expenses;
        state.expense_before = expense_before;
        Ok(state)
    }

    /// Adds an expense. A Paid supplier that already existed goes back to
    /// Pending.
    fn add_expense(&mut self, actor: &Actor, request: &NewExpense) -> DbResult<()> {
        let (expense, lines) = new_expense(actor, &self.supplier, request)?;
        if self.supplier_before.is_some() {
            invalidate_paid(&mut self.supplier, None);
        }

        self.dirty.mark(ParentKind::PurchaseExpense, expense.id.clone());
        self.dirty.mark(ParentKind::PurchaseSupplier, self.supplier.id.clone());
        self.created.insert(expense.id.clone());
        self.new_lines.extend(lines);
        self.expenses.push(expense);
        Ok(())
    }

    /// Merges `lines` into an existing expense and applies its payment
    /// changes. Line rows are written immediately.
    async fn update_existing(
        &mut self,
        conn: &mut SqliteConnection,
        expense_id: &str,
        status: Option<PaymentStatus>,
        paid_delta: Option<Money>,
        lines: &[LineInput],
    ) -> DbResult<()> {
        let Some(expense) = self.expenses.iter_mut().find(|e| e.id == expense_id) else {
            return Err(CoreError::UnknownChild {
                entity: "Purchase expense".to_string(),
                id: expense_id.to_string(),
            }
            .into());
        };

        let mut current = purchases::fetch_lines(&mut *conn, expense_id).await?;
        let merge = merge_lines(expense_id, &mut current, lines)?;
        update_expense(expense, &current, status, paid_delta, merge.added_lines())?;

        for line in &current {
            if merge.created.contains(&line.id) {
                purchases::insert_line(&mut *conn, line).await?;
            } else if merge.updated.contains(&line.id) {
                purchases::update_line(&mut *conn, line).await?;
            }
        }
        if merge.added_lines() {
            invalidate_paid(&mut self.supplier, None);
        }
        debug!(
            id = %expense_id,
            created = merge.created.len(),
            updated = merge.updated.len(),
            "Expense lines merged"
        );

        self.dirty.mark(ParentKind::PurchaseExpense, expense_id);
        self.dirty.mark(ParentKind::PurchaseSupplier, self.supplier.id.clone());
        Ok(())
    }

    /// Reconciles the supplier and writes every dirty row.
    async fn flush(self, conn: &mut SqliteConnection, ctx: &TxContext) -> DbResult<PurchaseSupplier> {
        let (supplier, _) = self.write(conn, ctx, None).await?;
        Ok(supplier)
    }

    /// Like [`flush`](Self::flush), returning the written expense.
    async fn flush_keeping(
        self,
        conn: &mut SqliteConnection,
        ctx: &TxContext,
        expense_id: &str,
    ) -> DbResult<Option<PurchaseExpense>> {
        let (_, expense) = self.write(conn, ctx, Some(expense_id)).await?;
        Ok(expense)
    }

    async fn write(
        mut self,
        conn: &mut SqliteConnection,
        ctx: &TxContext,
        keep: Option<&str>,
    ) -> DbResult<(PurchaseSupplier, Option<PurchaseExpense>)> {
        let cascaded = reconcile_supplier(&mut self.supplier, &mut self.expenses);
        for id in &cascaded {
            self.dirty.mark(ParentKind::PurchaseExpense, id.clone());
        }
        self.dirty.mark(ParentKind::PurchaseSupplier, self.supplier.id.clone());
        let party = self.supplier.supplier_name.clone();

        // expenses before their supplier, in staging order
        for expense in &self.expenses {
            if !self.dirty.contains(ParentKind::PurchaseExpense, &expense.id) {
                continue;
            }
            let changes = if self.created.contains(&expense.id) {
                purchases::insert_expense(&mut *conn, expense).await?;
                PaymentSnapshot::of(expense).creation_changes()
            } else {
                purchases::update_expense(&mut *conn, expense).await?;
                match self.expense_before.get(&expense.id) {
                    Some(before) => before.diff(&PaymentSnapshot::of(expense)),
                    None => Vec::new(),
                }
            };
            append_payment_changes(
                conn,
                &ctx.actor,
                LogSubject::Expense,
                &expense.id,
                party.clone(),
                changes,
            )
            .await?;
        }

        if self.dirty.contains(ParentKind::PurchaseSupplier, &self.supplier.id) {
            purchases::update_supplier(&mut *conn, &self.supplier).await?;
            let after = PaymentSnapshot::of(&self.supplier);
            let changes = match &self.supplier_before {
                Some(before) => before.diff(&after),
                None => after.creation_changes(),
            };
            append_payment_changes(
                conn,
                &ctx.actor,
                LogSubject::Supplier,
                &self.supplier.id,
                party.clone(),
                changes,
            )
            .await?;
        }

        for line in &self.new_lines {
            purchases::insert_line(&mut *conn, line).await?;
        }
        debug!(
            id = %self.supplier.id,
            expenses = self.expenses.len(),
            cascaded = cascaded.len(),
            "Purchase supplier reconciled"
        );

        let kept = keep.and_then(|id| self.expenses.iter().find(|e| e.id == id).cloned());
        Ok((self.supplier, kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admin, ledger, supplier};
    use depot_core::request::ExpenseEntry;
    use depot_core::ChangeType;

    fn line(quantity: i64, unit_price_cents: i64) -> LineInput {
        LineInput {
            id: None,
            product: "Rebar 12mm".to_string(),
            unit: Some("Pcs".to_string()),
            description: None,
            quantity,
            unit_price: Money::from_cents(unit_price_cents),
        }
    }

    fn expense(status: PaymentStatus, paid_cents: i64, lines: Vec<LineInput>) -> NewExpense {
        NewExpense {
            payment_status: status,
            paid_amount: Money::from_cents(paid_cents),
            lines,
        }
    }

    #[tokio::test]
    async fn test_create_rolls_expenses_up() {
        let ledger = ledger().await;
        let dangote = supplier(&ledger, "Dangote Cement").await;

        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: Some(dangote.id.clone()),
                    payment_status: PaymentStatus::Pending,
                    expenses: vec![
                        expense(PaymentStatus::Paid, 0, vec![line(2, 2500)]),
                        expense(PaymentStatus::Pending, 1000, vec![line(1, 3000), line(1, 1000)]),
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(created.supplier_name.as_deref(), Some("Dangote Cement"));
        assert_eq!(created.total_amount, Money::from_cents(9000));
        assert_eq!(created.paid_amount, Money::from_cents(6000));
        assert_eq!(created.unpaid_amount, Money::from_cents(3000));
        assert_eq!(created.payment_status, PaymentStatus::Pending);

        let expenses = ledger.get_purchase_expenses(&created.id).await.unwrap();
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].payment_status, PaymentStatus::Paid);
        assert_eq!(ledger.get_purchase_lines(&expenses[1].id).await.unwrap().len(), 2);

        let log = ledger.get_supplier_payment_log(&created.id).await.unwrap();
        assert_eq!(log.len(), 3);
        assert!(log
            .iter()
            .all(|e| matches!(e.change_type, ChangeType::StatusCreate | ChangeType::PaymentCreate)));
        assert_eq!(log[0].party.as_deref(), Some("Dangote Cement"));
        assert_eq!(ledger.get_expense_payment_log(&expenses[0].id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_all_paid_expenses_settle_supplier() {
        let ledger = ledger().await;
        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Unpaid,
                    expenses: vec![
                        expense(PaymentStatus::Paid, 0, vec![line(1, 500)]),
                        expense(PaymentStatus::Paid, 0, vec![line(3, 200)]),
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(created.payment_status, PaymentStatus::Paid);
        assert_eq!(created.paid_amount, Money::from_cents(1100));
        assert!(created.unpaid_amount.is_zero());
    }

    #[tokio::test]
    async fn test_paid_supplier_cascades_to_expenses() {
        let ledger = ledger().await;
        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Pending,
                    expenses: vec![
                        expense(PaymentStatus::Unpaid, 0, vec![line(2, 1000)]),
                        expense(PaymentStatus::Pending, 500, vec![line(1, 1500)]),
                    ],
                },
            )
            .await
            .unwrap();

        let paid = ledger
            .update_purchase_supplier(
                &admin(),
                &created.id,
                UpdatePurchaseSupplier {
                    payment_status: Some(PaymentStatus::Paid),
                    expenses: Vec::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.paid_amount, Money::from_cents(3500));
        assert!(paid.unpaid_amount.is_zero());
        for expense in ledger.get_purchase_expenses(&created.id).await.unwrap() {
            assert_eq!(expense.payment_status, PaymentStatus::Paid);
            assert_eq!(expense.paid_amount, expense.total);
            assert!(expense.unpaid_amount.is_zero());
            let log = ledger.get_expense_payment_log(&expense.id).await.unwrap();
            assert_eq!(log[0].field_name, "unpaid_amount");
            assert_eq!(log[0].new_value.as_deref(), Some("0.00"));
        }

        let log = ledger.get_supplier_payment_log(&created.id).await.unwrap();
        assert!(log
            .iter()
            .any(|e| e.change_type == ChangeType::StatusChange && e.new_value.as_deref() == Some("Paid")));
    }

    #[tokio::test]
    async fn test_new_expense_invalidates_paid_supplier() {
        let ledger = ledger().await;
        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Paid,
                    expenses: vec![expense(PaymentStatus::Paid, 0, vec![line(1, 4000)])],
                },
            )
            .await
            .unwrap();
        assert_eq!(created.payment_status, PaymentStatus::Paid);

        let updated = ledger
            .update_purchase_supplier(
                &admin(),
                &created.id,
                UpdatePurchaseSupplier {
                    payment_status: None,
                    expenses: vec![ExpenseEntry {
                        lines: vec![line(2, 500)],
                        ..ExpenseEntry::default()
                    }],
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.payment_status, PaymentStatus::Pending);
        assert_eq!(updated.total_amount, Money::from_cents(5000));
        assert_eq!(updated.paid_amount, Money::from_cents(4000));
        assert_eq!(updated.unpaid_amount, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_new_lines_reopen_paid_expense() {
        let ledger = ledger().await;
        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Paid,
                    expenses: vec![expense(PaymentStatus::Paid, 0, vec![line(1, 2000)])],
                },
            )
            .await
            .unwrap();
        let expense = ledger.get_purchase_expenses(&created.id).await.unwrap().remove(0);

        let reopened = ledger
            .update_purchase_expense(
                &admin(),
                &expense.id,
                UpdatePurchaseExpense {
                    lines: vec![line(1, 600)],
                    ..UpdatePurchaseExpense::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(reopened.payment_status, PaymentStatus::Pending);
        assert_eq!(reopened.total, Money::from_cents(2600));
        assert_eq!(reopened.unpaid_amount, Money::from_cents(600));

        let supplier = ledger.get_purchase_supplier(&created.id).await.unwrap();
        assert_eq!(supplier.payment_status, PaymentStatus::Pending);
        assert_eq!(supplier.unpaid_amount, Money::from_cents(600));
        assert_eq!(ledger.get_purchase_lines(&expense.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expense_paid_delta() {
        let ledger = ledger().await;
        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Pending,
                    expenses: vec![expense(PaymentStatus::Pending, 0, vec![line(4, 2500)])],
                },
            )
            .await
            .unwrap();
        let expense = ledger.get_purchase_expenses(&created.id).await.unwrap().remove(0);

        let partial = ledger
            .update_purchase_expense(
                &admin(),
                &expense.id,
                UpdatePurchaseExpense {
                    paid_amount_delta: Some(Money::from_cents(4000)),
                    ..UpdatePurchaseExpense::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(partial.paid_amount, Money::from_cents(4000));
        assert_eq!(partial.unpaid_amount, Money::from_cents(6000));

        let err = ledger
            .update_purchase_expense(
                &admin(),
                &expense.id,
                UpdatePurchaseExpense {
                    paid_amount_delta: Some(Money::from_cents(7000)),
                    ..UpdatePurchaseExpense::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::PaidAmountOutOfRange { .. })));

        let supplier = ledger.get_purchase_supplier(&created.id).await.unwrap();
        assert_eq!(supplier.paid_amount, Money::from_cents(4000));
    }

    #[tokio::test]
    async fn test_overpaid_expense_is_rejected() {
        let ledger = ledger().await;
        let err = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Pending,
                    expenses: vec![expense(PaymentStatus::Pending, 9000, vec![line(1, 5000)])],
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Ledger(CoreError::PaidAmountOutOfRange { .. })));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_suppliers")
            .fetch_one(ledger.database().pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_unknown_expense_id_is_rejected() {
        let ledger = ledger().await;
        let created = ledger
            .create_purchase_supplier(
                &admin(),
                CreatePurchaseSupplier {
                    supplier_id: None,
                    payment_status: PaymentStatus::Unpaid,
                    expenses: vec![expense(PaymentStatus::Unpaid, 0, vec![line(1, 100)])],
                },
            )
            .await
            .unwrap();

        let err = ledger
            .update_purchase_supplier(
                &admin(),
                &created.id,
                UpdatePurchaseSupplier {
                    payment_status: None,
                    expenses: vec![ExpenseEntry {
                        id: Some("elsewhere".to_string()),
                        ..ExpenseEntry::default()
                    }],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Ledger(CoreError::UnknownChild { .. })));
    }
}
