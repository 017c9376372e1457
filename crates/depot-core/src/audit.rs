//! # Payment Audit
//!
//! Builds the immutable log records the storage layer appends.
//!
//! ## Watched Fields
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  snapshot before ──► mutation ──► snapshot after ──► diff               │
//! │                                                                         │
//! │  field            creation           update                             │
//! │  payment_status   "Status Create"    "Status Change"                    │
//! │  paid_amount      "Payment Create"   "Payment Update"                   │
//! │  unpaid_amount    "Payment Create"   "Payment Update"                   │
//! │                                                                         │
//! │  Creation entries carry old_value "0".                                  │
//! │  Item-level changes go to the order action log, never here.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde_json::Value;

use crate::money::Money;
use crate::settlement::Payable;
use crate::types::{
    new_id, Actor, ChangeType, LogSubject, OrderAction, OrderLogEntry, PaymentLogEntry,
    PaymentStatus,
};

pub const FIELD_PAYMENT_STATUS: &str = "payment_status";
pub const FIELD_PAID_AMOUNT: &str = "paid_amount";
pub const FIELD_UNPAID_AMOUNT: &str = "unpaid_amount";

/// Watched payment fields at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSnapshot {
    pub status: PaymentStatus,
    pub paid: Money,
    pub unpaid: Money,
}

/// One field-level change, not yet bound to a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChange {
    pub change_type: ChangeType,
    pub field_name: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl PaymentSnapshot {
    pub fn of<P: Payable + ?Sized>(payable: &P) -> Self {
        PaymentSnapshot {
            status: payable.payment_status(),
            paid: payable.paid_amount(),
            unpaid: payable.unpaid_amount(),
        }
    }

    /// Changes between `self` (before) and `after`, in field order.
    pub fn diff(&self, after: &PaymentSnapshot) -> Vec<PaymentChange> {
        let mut changes = Vec::new();

        if self.status != after.status {
            changes.push(PaymentChange {
                change_type: ChangeType::StatusChange,
                field_name: FIELD_PAYMENT_STATUS,
                old_value: Some(self.status.to_string()),
                new_value: Some(after.status.to_string()),
            });
        }
        if self.paid != after.paid {
            changes.push(PaymentChange {
                change_type: ChangeType::PaymentUpdate,
                field_name: FIELD_PAID_AMOUNT,
                old_value: Some(self.paid.to_string()),
                new_value: Some(after.paid.to_string()),
            });
        }
        if self.unpaid != after.unpaid {
            changes.push(PaymentChange {
                change_type: ChangeType::PaymentUpdate,
                field_name: FIELD_UNPAID_AMOUNT,
                old_value: Some(self.unpaid.to_string()),
                new_value: Some(after.unpaid.to_string()),
            });
        }

        changes
    }

    /// The three entries written when a payable is created.
    pub fn creation_changes(&self) -> Vec<PaymentChange> {
        let zero = || Some("0".to_string());
        vec![
            PaymentChange {
                change_type: ChangeType::StatusCreate,
                field_name: FIELD_PAYMENT_STATUS,
                old_value: zero(),
                new_value: Some(self.status.to_string()),
            },
            PaymentChange {
                change_type: ChangeType::PaymentCreate,
                field_name: FIELD_PAID_AMOUNT,
                old_value: zero(),
                new_value: Some(self.paid.to_string()),
            },
            PaymentChange {
                change_type: ChangeType::PaymentCreate,
                field_name: FIELD_UNPAID_AMOUNT,
                old_value: zero(),
                new_value: Some(self.unpaid.to_string()),
            },
        ]
    }
}

impl PaymentChange {
    /// Binds the change to its subject.
    pub fn into_entry(
        self,
        subject: LogSubject,
        subject_id: &str,
        party: Option<String>,
        actor: &Actor,
    ) -> PaymentLogEntry {
        PaymentLogEntry {
            id: new_id(),
            subject,
            subject_id: subject_id.to_string(),
            party,
            change_type: self.change_type,
            field_name: self.field_name.to_string(),
            old_value: self.old_value,
            new_value: self.new_value,
            user_name: Some(actor.name.clone()),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Order Action Log
// =============================================================================

/// Builder for order action log entries.
#[derive(Debug, Clone)]
pub struct OrderLog {
    entry: OrderLogEntry,
}

impl OrderLog {
    pub fn new(actor: &Actor, action: OrderAction, model_name: &str, object_id: &str) -> Self {
        OrderLog {
            entry: OrderLogEntry {
                id: new_id(),
                user_name: actor.name.clone(),
                action,
                model_name: model_name.to_string(),
                object_id: object_id.to_string(),
                customer_info: None,
                product_name: None,
                quantity: None,
                price: None,
                changes: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn customer(mut self, customer: Option<String>) -> Self {
        self.entry.customer_info = customer;
        self
    }

    pub fn product(mut self, name: &str, quantity: i64, price: Money) -> Self {
        self.entry.product_name = Some(name.to_string());
        self.entry.quantity = Some(quantity);
        self.entry.price = Some(price);
        self
    }

    /// Structured field changes, stored as JSON text.
    pub fn changes(mut self, changes: Value) -> Self {
        self.entry.changes = Some(changes.to_string());
        self
    }

    /// Free-text description ("Created Order Item").
    pub fn note(mut self, note: &str) -> Self {
        self.entry.changes = Some(note.to_string());
        self
    }

    pub fn build(self) -> OrderLogEntry {
        self.entry
    }
}
