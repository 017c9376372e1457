//! # Dirty Set
//!
//! Parents whose figures must be recomputed before commit. A transaction
//! marks a parent every time one of its children changes; the flush visits
//! each parent once, children-level kinds before the kinds that sum them.
//!
//! ```text
//! line edit ──► mark(PurchaseExpense, e1)
//! line add  ──► mark(PurchaseExpense, e1)      (coalesced)
//! expense   ──► mark(PurchaseSupplier, s1)
//!
//! drain() ──► [(PurchaseExpense, e1), (PurchaseSupplier, s1)]
//! ```

use std::collections::BTreeSet;

/// Recomputable parent kinds, in flush order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParentKind {
    Performa,
    PerformaCustomer,
    PurchaseExpense,
    PurchaseSupplier,
}

#[derive(Debug, Clone, Default)]
pub struct DirtySet {
    entries: BTreeSet<(ParentKind, String)>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a parent. Returns `false` if it was already queued.
    pub fn mark(&mut self, kind: ParentKind, id: impl Into<String>) -> bool {
        self.entries.insert((kind, id.into()))
    }

    pub fn contains(&self, kind: ParentKind, id: &str) -> bool {
        self.entries.iter().any(|(k, i)| *k == kind && i == id)
    }

    /// Empties the set in flush order.
    pub fn drain(&mut self) -> Vec<(ParentKind, String)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}
