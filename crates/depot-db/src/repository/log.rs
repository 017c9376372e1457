//! # Log Repository
//!
//! Append-only payment log and the order action log.
//!
//! ## Immutability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  payment_logs                                                           │
//! │    INSERT  ✓   append_payment()                                        │
//! │    UPDATE  ✗   trigger payment_logs_no_update → RAISE(ABORT)           │
//! │    DELETE  ✗   trigger payment_logs_no_delete → RAISE(ABORT)           │
//! │                                                                         │
//! │  Reads are newest first: created_at DESC, then insertion order DESC.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use depot_core::{LogSubject, OrderLogEntry, PaymentLogEntry, ValidationError};

/// Repository for log reads.
#[derive(Debug, Clone)]
pub struct LogRepository {
    pool: SqlitePool,
}

impl LogRepository {
    /// Creates a new LogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LogRepository { pool }
    }

    /// Payment history of one order, expense or supplier, newest first.
    pub async fn payment_history(
        &self,
        subject: LogSubject,
        subject_id: &str,
    ) -> DbResult<Vec<PaymentLogEntry>> {
        let entries = sqlx::query_as::<_, PaymentLogEntry>(
            r#"
            SELECT
                id, subject, subject_id, party, change_type, field_name,
                old_value, new_value, user_name, created_at
            FROM payment_logs
            WHERE subject = ?1 AND subject_id = ?2
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(subject)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Action history of an order or order item, newest first.
    pub async fn order_history(&self, object_id: &str) -> DbResult<Vec<OrderLogEntry>> {
        let entries = sqlx::query_as::<_, OrderLogEntry>(
            r#"
            SELECT
                id, user_name, action, model_name, object_id, customer_info,
                product_name, quantity, price, changes, created_at
            FROM order_logs
            WHERE object_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(object_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// Appends one payment log entry.
///
/// ## Errors
/// `Validation(Required("subject_id"))` for an empty subject reference.
pub async fn append_payment<'e, E: SqliteExecutor<'e>>(
    exec: E,
    entry: &PaymentLogEntry,
) -> DbResult<()> {
    if entry.subject_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "subject_id".to_string(),
        }
        .into());
    }

    debug!(
        subject = ?entry.subject,
        subject_id = %entry.subject_id,
        field = %entry.field_name,
        old = ?entry.old_value,
        new = ?entry.new_value,
        "Appending payment log"
    );

    sqlx::query(
        r#"
        INSERT INTO payment_logs (
            id, subject, subject_id, party, change_type, field_name,
            old_value, new_value, user_name, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&entry.id)
    .bind(entry.subject)
    .bind(&entry.subject_id)
    .bind(&entry.party)
    .bind(entry.change_type)
    .bind(&entry.field_name)
    .bind(&entry.old_value)
    .bind(&entry.new_value)
    .bind(&entry.user_name)
    .bind(entry.created_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn append_order<'e, E: SqliteExecutor<'e>>(exec: E, entry: &OrderLogEntry) -> DbResult<()> {
    debug!(
        action = ?entry.action,
        model = %entry.model_name,
        object_id = %entry.object_id,
        "Appending order log"
    );

    sqlx::query(
        r#"
        INSERT INTO order_logs (
            id, user_name, action, model_name, object_id, customer_info,
            product_name, quantity, price, changes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.user_name)
    .bind(entry.action)
    .bind(&entry.model_name)
    .bind(&entry.object_id)
    .bind(&entry.customer_info)
    .bind(&entry.product_name)
    .bind(entry.quantity)
    .bind(entry.price)
    .bind(&entry.changes)
    .bind(entry.created_at)
    .execute(exec)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use depot_core::{new_id, ChangeType, CoreError};

    fn entry(subject_id: &str, field: &str, offset_secs: i64) -> PaymentLogEntry {
        PaymentLogEntry {
            id: new_id(),
            subject: LogSubject::Order,
            subject_id: subject_id.to_string(),
            party: None,
            change_type: ChangeType::PaymentUpdate,
            field_name: field.to_string(),
            old_value: Some("0.00".to_string()),
            new_value: Some("10.00".to_string()),
            user_name: Some("Abebe".to_string()),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn test_payment_history_newest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        append_payment(db.pool(), &entry("o1", "first", 0)).await.unwrap();
        append_payment(db.pool(), &entry("o1", "second", 5)).await.unwrap();
        append_payment(db.pool(), &entry("o2", "other", 10)).await.unwrap();

        let history = db.logs().payment_history(LogSubject::Order, "o1").await.unwrap();
        let fields: Vec<_> = history.iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(fields, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_rejects_empty_subject() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = append_payment(db.pool(), &entry("  ", "paid_amount", 0)).await;
        assert!(matches!(
            result,
            Err(DbError::Ledger(CoreError::Validation(ValidationError::Required { .. })))
        ));
    }

    #[tokio::test]
    async fn test_entries_are_immutable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let e = entry("o1", "paid_amount", 0);
        append_payment(db.pool(), &e).await.unwrap();

        let update = sqlx::query("UPDATE payment_logs SET new_value = '99.00' WHERE id = ?1")
            .bind(&e.id)
            .execute(db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM payment_logs WHERE id = ?1")
            .bind(&e.id)
            .execute(db.pool())
            .await;
        assert!(delete.is_err());

        let history = db.logs().payment_history(LogSubject::Order, "o1").await.unwrap();
        assert_eq!(history[0].new_value.as_deref(), Some("10.00"));
    }
}
