mod schema;

use anyhow::{Context, Result};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::calendar;
use crate::models::*;
use crate::store::{ReminderScheduler, StoreError, TransactionStore};

const TXN_COLUMNS: &str = "id, title, category, amount, txn_type, kind, parent_id,
    installment_count, installment_number, date_timestamp, budget_month_date, series_end, created_at";

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        // Check if schema_version table exists
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database - apply full schema
            self.conn.execute_batch(schema::SCHEMA)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            tracing::info!("created schema version {}", schema::CURRENT_VERSION);
            return Ok(());
        }

        // Existing database - check version and apply migrations
        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                tracing::info!("migrating schema from version {from_version}");
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })?)
    }

    // ── Transactions ──────────────────────────────────────────

    pub(crate) fn insert_transaction(&self, txn: &Transaction) -> Result<i64> {
        self.insert_row(txn)
            .with_context(|| format!("Failed to insert transaction '{}'", txn.title))
    }

    pub(crate) fn get_transaction_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        Ok(self.find_row(id)?)
    }

    /// Transactions, newest first. `month` is a month anchor.
    pub(crate) fn get_transactions(&self, month: Option<i64>) -> Result<Vec<Transaction>> {
        let txns = match month {
            Some(anchor) => self.query_transactions(
                &format!(
                    "SELECT {TXN_COLUMNS} FROM transactions WHERE budget_month_date = ?1
                     ORDER BY date_timestamp DESC, id DESC"
                ),
                &[&anchor as &dyn ToSql],
            )?,
            None => self.query_transactions(
                &format!(
                    "SELECT {TXN_COLUMNS} FROM transactions ORDER BY date_timestamp DESC, id DESC"
                ),
                &[],
            )?,
        };
        Ok(txns)
    }

    pub(crate) fn get_transaction_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?)
    }

    /// Deletes the row. Rows generated from it and its reminders go with it.
    pub(crate) fn delete_transaction_cascade(&self, id: i64) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        if n == 0 {
            anyhow::bail!("Transaction #{id} not found");
        }
        Ok(())
    }

    /// Income and expense totals (expenses negative) for a month anchor.
    /// Installment plan headers are excluded; their installments carry the money.
    pub(crate) fn get_monthly_totals(&self, month: i64) -> Result<(Decimal, Decimal)> {
        let mut income = Decimal::ZERO;
        let mut expenses = Decimal::ZERO;
        for txn in self.get_transactions(Some(month))? {
            if matches!(txn.kind, TransactionKind::InstallmentTemplate { .. }) {
                continue;
            }
            if txn.is_income() {
                income += txn.amount;
            } else if txn.is_expense() {
                expenses -= txn.amount;
            }
        }
        Ok((income, expenses))
    }

    pub(crate) fn export_to_csv(&self, path: &str, month: Option<i64>) -> Result<usize> {
        let txns = self.get_transactions(month)?;
        if txns.is_empty() {
            return Ok(0);
        }

        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create CSV file: {path}"))?;
        wtr.write_record(["Date", "Title", "Category", "Type", "Amount", "Kind"])?;
        for txn in &txns {
            let date = txn
                .date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            wtr.write_record([
                date,
                txn.title.clone(),
                txn.category.clone(),
                txn.txn_type.to_string(),
                txn.signed_amount().to_string(),
                txn.kind.to_string(),
            ])?;
        }
        wtr.flush().context("Failed to write CSV file")?;
        Ok(txns.len())
    }

    fn find_row(&self, id: i64) -> rusqlite::Result<Option<Transaction>> {
        self.conn
            .query_row(
                &format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?1"),
                params![id],
                row_to_transaction,
            )
            .optional()
    }

    fn insert_row(&self, txn: &Transaction) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO transactions (title, category, amount, txn_type, kind, parent_id,
                installment_count, installment_number, date_timestamp, budget_month_date,
                series_end, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                txn.title,
                txn.category,
                txn.amount.to_string(),
                txn.txn_type.as_str(),
                txn.kind.as_str(),
                txn.kind.parent_id(),
                txn.kind.installment_count(),
                txn.kind.installment_number(),
                txn.date_timestamp,
                txn.budget_month_date,
                txn.series_end,
                txn.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query_transactions(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> rusqlite::Result<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_transaction)?;
        rows.collect()
    }

    // ── Reminders ─────────────────────────────────────────────

    pub(crate) fn insert_reminder(&self, reminder: &Reminder) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO reminders (transaction_id, remind_at) VALUES (?1, ?2)",
                params![reminder.transaction_id, reminder.remind_at],
            )
            .with_context(|| {
                format!(
                    "Failed to schedule reminder for transaction #{}",
                    reminder.transaction_id
                )
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn get_reminders(&self, transaction_id: i64) -> Result<Vec<Reminder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, transaction_id, remind_at FROM reminders
             WHERE transaction_id = ?1 ORDER BY remind_at",
        )?;
        let rows = stmt.query_map(params![transaction_id], |row| {
            Ok(Reminder {
                id: Some(row.get(0)?),
                transaction_id: row.get(1)?,
                remind_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount_str: String = row.get(3)?;
    let amount = Decimal::from_str(&amount_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let kind_tag: String = row.get(5)?;
    Ok(Transaction {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        category: row.get(2)?,
        amount,
        txn_type: TransactionType::parse(&row.get::<_, String>(4)?),
        kind: TransactionKind::from_parts(&kind_tag, row.get(6)?, row.get(7)?, row.get(8)?),
        date_timestamp: row.get(9)?,
        budget_month_date: row.get(10)?,
        series_end: row.get(11)?,
        created_at: row.get(12)?,
    })
}

impl TransactionStore for Database {
    fn fetch_recurring_templates(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.query_transactions(
            &format!("SELECT {TXN_COLUMNS} FROM transactions WHERE kind = 'recurring_template' ORDER BY id"),
            &[],
        )?)
    }

    fn fetch_installment_templates(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.query_transactions(
            &format!(
                "SELECT {TXN_COLUMNS} FROM transactions WHERE kind = 'installment_template' ORDER BY id"
            ),
            &[],
        )?)
    }

    fn fetch_instances(&self, template_id: i64) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.query_transactions(
            &format!(
                "SELECT {TXN_COLUMNS} FROM transactions WHERE parent_id = ?1
                 ORDER BY budget_month_date"
            ),
            &[&template_id as &dyn ToSql],
        )?)
    }

    fn fetch_all_instances(&self) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.query_transactions(
            &format!(
                "SELECT {TXN_COLUMNS} FROM transactions
                 WHERE kind = 'recurring_instance' AND parent_id IS NOT NULL
                 ORDER BY parent_id, budget_month_date"
            ),
            &[],
        )?)
    }

    fn insert(&self, txn: &Transaction) -> Result<i64, StoreError> {
        Ok(self.insert_row(txn)?)
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn end_series(&self, template_id: i64, end_anchor: i64) -> Result<(), StoreError> {
        let template = self
            .find_row(template_id)?
            .ok_or(StoreError::NotFound(template_id))?;
        match template.kind {
            TransactionKind::RecurringTemplate => {
                self.conn.execute(
                    "UPDATE transactions SET series_end = MIN(COALESCE(series_end, ?2), ?2)
                     WHERE id = ?1",
                    params![template_id, end_anchor],
                )?;
            }
            TransactionKind::InstallmentTemplate { count } => {
                // Installments kept are the ones in months before `end_anchor`.
                let kept = calendar::months_between(template.budget_month_date, end_anchor)
                    .map_or(count, |n| u32::try_from(n.max(0)).map_or(0, |n| n.min(count)));
                self.conn.execute(
                    "UPDATE transactions SET installment_count = ?2 WHERE id = ?1",
                    params![template_id, kept],
                )?;
            }
            _ => return Ok(()),
        }
        tracing::info!(
            "series #{template_id} now ends before {}",
            calendar::month_label(end_anchor)
        );
        Ok(())
    }
}

impl ReminderScheduler for Database {
    fn cancel(&self, transaction_id: i64) -> Result<(), StoreError> {
        let n = self.conn.execute(
            "DELETE FROM reminders WHERE transaction_id = ?1",
            params![transaction_id],
        )?;
        if n > 0 {
            tracing::debug!("cancelled {n} reminder(s) for transaction #{transaction_id}");
        }
        Ok(())
    }
}
