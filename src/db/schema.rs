pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    title               TEXT NOT NULL,
    category            TEXT NOT NULL DEFAULT '',
    amount              TEXT NOT NULL,
    txn_type            TEXT NOT NULL DEFAULT 'expense',
    kind                TEXT NOT NULL DEFAULT 'simple',
    parent_id           INTEGER REFERENCES transactions(id) ON DELETE CASCADE,
    installment_count   INTEGER,
    installment_number  INTEGER,
    date_timestamp      INTEGER NOT NULL,
    budget_month_date   INTEGER NOT NULL,
    series_end          INTEGER,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_month ON transactions(budget_month_date);
CREATE INDEX IF NOT EXISTS idx_transactions_kind ON transactions(kind);
CREATE INDEX IF NOT EXISTS idx_transactions_parent ON transactions(parent_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_parent_month
    ON transactions(parent_id, budget_month_date) WHERE parent_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS reminders (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id  INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    remind_at       INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reminders_transaction ON reminders(transaction_id);
"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
