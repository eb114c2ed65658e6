//! Collaborator contracts the recurrence engine is built against.
//!
//! The engine only ever sees these traits; [`crate::db::Database`] is the
//! SQLite implementation used by the binary.

use thiserror::Error;

use crate::models::Transaction;

#[derive(Error, Debug)]
pub(crate) enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("transaction {0} not found")]
    NotFound(i64),
}

pub(crate) trait TransactionStore {
    fn fetch_recurring_templates(&self) -> Result<Vec<Transaction>, StoreError>;

    fn fetch_installment_templates(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Every row generated from `template_id`, recurring or installment.
    fn fetch_instances(&self, template_id: i64) -> Result<Vec<Transaction>, StoreError>;

    /// Every recurring instance across all templates.
    fn fetch_all_instances(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Returns the new row id.
    fn insert(&self, txn: &Transaction) -> Result<i64, StoreError>;

    fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Stop the series of `template_id` before the month `end_anchor`, so
    /// nothing in or after that month is generated again.
    fn end_series(&self, template_id: i64, end_anchor: i64) -> Result<(), StoreError>;
}

/// Removes reminders scheduled against a transaction when that row goes away.
pub(crate) trait ReminderScheduler {
    fn cancel(&self, transaction_id: i64) -> Result<(), StoreError>;
}

